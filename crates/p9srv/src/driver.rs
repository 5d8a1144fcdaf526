//! The filesystem driver boundary.
//!
//! # Protocol
//! 9P2000

use crate::error::DriverResult;
use crate::fcall::{Qid, Stat};

/// A pluggable backing store for the tree a [`crate::session::Session`] exposes.
///
/// Implementors supply the actual hierarchy and content; the session engine
/// owns protocol bookkeeping (fids, tags, reset-on-`Tversion`) and never
/// reaches into a driver's internals beyond this trait.
///
/// Methods are synchronous: sessions process one request to completion
/// before reading the next, so there is no concurrent access to worry
/// about from the driver's side either.
///
/// # Minimum Implementation
///
/// [`get_root`](Self::get_root), [`has_entry`](Self::has_entry),
/// [`get_qid`](Self::get_qid), [`get_stat`](Self::get_stat),
/// [`open_file`](Self::open_file), [`read_file`](Self::read_file) and
/// [`write_file`](Self::write_file) must all be implemented. A read-only
/// driver can make `write_file` a no-op that accepts nothing.
/// [`close_file`](Self::close_file) defaults to doing nothing.
pub trait Driver {
    /// Per-fid opaque state, created with `Default` when a fid is born
    /// (via `Tattach` or `Twalk`) and dropped when the fid is clunked.
    type FidState: Default;

    /// Preferred I/O chunk size reported via `Ropen`/`Rcreate.iounit`.
    fn io_size(&self) -> u32 {
        crate::fcall::DEFAULT_IOUNIT
    }

    /// Called when a `Tversion` resets the session. Any driver-held state
    /// that is not per-fid (e.g. a counter used to mint fresh paths)
    /// should be reinitialized here.
    fn reset(&mut self) {}

    /// The qid of the exported tree's root, returned by `Rattach`.
    fn get_root(&mut self) -> Qid;

    /// Whether `parent` (a directory qid) contains a child named `name`.
    fn has_entry(&mut self, parent: Qid, name: &str) -> bool;

    /// The qid of the child `name` under directory `parent`.
    ///
    /// Only called after `has_entry` has returned `true` for the same pair.
    fn get_qid(&mut self, parent: Qid, name: &str) -> Qid;

    /// Metadata for `qid`, used to answer `Tstat` and to fill in
    /// `Rwalk`/`Rattach` bookkeeping.
    fn get_stat(&mut self, qid: Qid) -> DriverResult<Stat>;

    /// Called on `Topen`/`Tcreate`. `aux` is this fid's freshly-defaulted
    /// state slot, which the driver may populate (e.g. with a directory
    /// listing snapshot or an open file handle).
    fn open_file(&mut self, qid: Qid, mode: u8, aux: &mut Self::FidState) -> DriverResult<()>;

    /// Called on `Tclunk`/`Tremove` for a fid that was opened. The default
    /// does nothing; drivers holding real resources should override this.
    fn close_file(&mut self, _qid: Qid, _aux: &mut Self::FidState) {}

    /// Read up to `count` bytes starting at `offset`. Returning fewer bytes
    /// than requested (including zero) signals EOF to the client.
    fn read_file(
        &mut self,
        qid: Qid,
        offset: u64,
        count: u32,
        aux: &mut Self::FidState,
    ) -> DriverResult<Vec<u8>>;

    /// Write `data` at `offset`, returning the number of bytes accepted.
    fn write_file(
        &mut self,
        qid: Qid,
        offset: u64,
        data: &[u8],
        aux: &mut Self::FidState,
    ) -> DriverResult<u32>;
}
