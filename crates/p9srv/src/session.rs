//! The single-threaded 9P2000 protocol engine.
//!
//! A [`Session`] owns exactly one fid table and processes exactly one
//! request to completion before the next frame is read — there is no
//! `Arc`, no lock, and no spawned task anywhere in this module.

use std::collections::HashMap;
use std::io::{Read, Write};

use log::{debug, info, warn};

use crate::driver::Driver;
use crate::error::{estr, DriverError, Error, FatalKind, Result};
use crate::fcall::{FCall, Msg, Qid, QidType, NOFID, NOTAG, P9_2000};
use crate::frame::{FrameReader, FrameWriter};

struct Fid<T> {
    qid: Qid,
    opened: bool,
    uname: String,
    aux: T,
}

impl<T: Default> Fid<T> {
    fn new(qid: Qid, uname: String) -> Self {
        Fid { qid, opened: false, uname, aux: T::default() }
    }
}

/// Owns the fid table and protocol state for one client connection.
pub struct Session<D: Driver> {
    driver: D,
    fids: HashMap<u32, Fid<D::FidState>>,
    configured_msize: u32,
    msize: u32,
}

impl<D: Driver> Session<D> {
    /// `configured_msize` is the ceiling this server will ever negotiate
    /// down to, regardless of what a client offers in `Tversion`.
    pub fn new(driver: D, configured_msize: u32) -> Self {
        Session {
            driver,
            fids: HashMap::new(),
            configured_msize,
            msize: configured_msize,
        }
    }

    /// Drain `reader` until a fatal error or clean EOF, writing replies to
    /// `writer` as each request is serviced. One connection at a time, one
    /// request at a time — never called concurrently with itself.
    pub fn run<R: Read, W: Write>(&mut self, reader: R, writer: W) -> Result<()> {
        let mut reader = FrameReader::new(reader);
        let mut writer = FrameWriter::new(writer);

        info!("session started");
        loop {
            let msg = match reader.read_msg(self.msize) {
                Ok(Some(msg)) => msg,
                Ok(None) => {
                    info!("session closed by peer");
                    return Ok(());
                }
                Err(e) => {
                    warn!("fatal framing error: {e}");
                    return Err(e);
                }
            };

            if let Err(e) = self.dispatch(&msg, &mut writer) {
                warn!("fatal session error: {e}");
                return Err(e);
            }
        }
    }

    fn reset(&mut self) {
        for (_, fid) in self.fids.drain() {
            if fid.opened {
                let mut aux = fid.aux;
                self.driver.close_file(fid.qid, &mut aux);
            }
        }
        self.driver.reset();
        self.msize = self.configured_msize;
    }

    fn dispatch<W: Write>(&mut self, msg: &Msg, out: &mut FrameWriter<W>) -> Result<()> {
        if let FCall::Tversion { msize, ref version } = msg.body {
            return self.handle_version(msg.tag, msize, version, out);
        }

        match self.handle(&msg.body) {
            Ok(reply) => out.write_msg(&Msg { tag: msg.tag, body: reply }),
            Err(Error::Protocol(text)) => {
                debug!("protocol error: {text}");
                out.write_msg(&Msg { tag: msg.tag, body: FCall::Rerror { ename: text.to_string() } })
            }
            Err(e @ Error::Fatal(_)) => Err(e),
        }
    }

    /// `Tversion` resets session state *before* validating tag/version, so
    /// even a malformed `Tversion` clears the fid table.
    fn handle_version<W: Write>(
        &mut self,
        tag: u16,
        msize: u32,
        version: &str,
        out: &mut FrameWriter<W>,
    ) -> Result<()> {
        self.reset();

        if tag != NOTAG {
            out.write_msg(&Msg {
                tag,
                body: FCall::Rerror { ename: estr::NEED_NOTAG.to_string() },
            })?;
        }

        if version != P9_2000 {
            out.write_msg(&Msg {
                tag,
                body: FCall::Rerror { ename: estr::NEED_9P2000.to_string() },
            })?;
            return Err(Error::Fatal(FatalKind::VersionRejected(estr::NEED_9P2000)));
        }

        self.msize = self.configured_msize.min(msize);
        info!("negotiated msize={}", self.msize);
        out.write_msg(&Msg {
            tag,
            body: FCall::Rversion { msize: self.msize, version: P9_2000.to_owned() },
        })
    }

    fn handle(&mut self, body: &FCall) -> Result<FCall> {
        match *body {
            FCall::Tversion { .. } => unreachable!("handled in dispatch"),
            FCall::Tauth { .. } => Err(Error::Protocol(estr::NO_AUTH)),
            FCall::Tattach { fid, afid, ref uname, ref aname } => self.attach(fid, afid, uname, aname),
            FCall::Tflush { .. } => Ok(FCall::Rflush),
            FCall::Twalk { fid, newfid, ref wnames } => self.walk(fid, newfid, wnames),
            FCall::Topen { fid, mode } => self.open(fid, mode),
            FCall::Tcreate { fid, .. } => self.create(fid),
            FCall::Tread { fid, offset, count } => self.read(fid, offset, count),
            FCall::Twrite { fid, offset, ref data } => self.write(fid, offset, data),
            FCall::Tclunk { fid } => self.clunk(fid),
            FCall::Tremove { fid } => self.clunk(fid).map(|_| FCall::Rremove),
            FCall::Tstat { fid } => self.stat(fid),
            FCall::Twstat { fid, .. } => self.wstat(fid),
            ref other => Err(Error::Fatal(FatalKind::IllegalVerb(
                crate::fcall::MsgType::from(other) as u8,
            ))),
        }
    }

    fn attach(&mut self, fid: u32, afid: u32, uname: &str, aname: &str) -> Result<FCall> {
        if afid != NOFID {
            return Err(Error::Protocol(estr::NEED_NOFID));
        }
        if !aname.is_empty() {
            return Err(Error::Protocol(estr::NO_ALT_ROOT));
        }

        let uname = if uname.trim().is_empty() { "unset".to_owned() } else { uname.to_owned() };
        let qid = self.driver.get_root();
        self.fids.insert(fid, Fid::new(qid, uname));
        debug!("fid {fid} attached to root {qid:?}");
        Ok(FCall::Rattach { qid })
    }

    fn walk(&mut self, fid: u32, newfid: u32, wnames: &[String]) -> Result<FCall> {
        let (start, uname, opened) = {
            let entry = self.fids.get(&fid).ok_or(Error::Protocol(estr::INVALID_FID))?;
            (entry.qid, entry.uname.clone(), entry.opened)
        };
        if self.fids.contains_key(&newfid) {
            return Err(Error::Protocol(estr::DUPLICATE_FID));
        }
        if opened {
            return Err(Error::Protocol(estr::ALREADY_OPEN));
        }

        if wnames.is_empty() {
            self.fids.insert(newfid, Fid::new(start, uname));
            return Ok(FCall::Rwalk { wqids: Vec::new() });
        }

        if !start.typ.contains(QidType::DIR) {
            return Err(Error::Protocol(estr::NOT_DIR));
        }

        let mut cur = start;
        let mut wqids = Vec::with_capacity(wnames.len());
        for name in wnames {
            if !self.driver.has_entry(cur, name) {
                break;
            }
            cur = self.driver.get_qid(cur, name);
            wqids.push(cur);
        }

        if wqids.len() == wnames.len() {
            self.fids.insert(newfid, Fid::new(cur, uname));
        }
        Ok(FCall::Rwalk { wqids })
    }

    fn open(&mut self, fid: u32, mode: u8) -> Result<FCall> {
        let entry = self.fids.get_mut(&fid).ok_or(Error::Protocol(estr::INVALID_FID))?;
        if entry.opened {
            return Err(Error::Protocol(estr::ALREADY_OPEN));
        }
        self.driver.open_file(entry.qid, mode, &mut entry.aux).map_err(wrap_driver_err)?;
        entry.opened = true;
        Ok(FCall::Ropen { qid: entry.qid, iounit: self.driver.io_size() })
    }

    fn create(&mut self, fid: u32) -> Result<FCall> {
        let entry = self.fids.get(&fid).ok_or(Error::Protocol(estr::INVALID_FID))?;
        if !entry.qid.typ.contains(QidType::DIR) {
            return Err(Error::Protocol(estr::NOT_DIR));
        }
        Err(Error::Protocol(estr::NOT_FOUND))
    }

    fn read(&mut self, fid: u32, offset: u64, count: u32) -> Result<FCall> {
        let entry = self.fids.get_mut(&fid).ok_or(Error::Protocol(estr::INVALID_FID))?;
        if !entry.opened {
            return Err(Error::Protocol(estr::NOT_OPEN));
        }
        let data = self
            .driver
            .read_file(entry.qid, offset, count, &mut entry.aux)
            .map_err(wrap_driver_err)?;
        Ok(FCall::Rread { data })
    }

    fn write(&mut self, fid: u32, offset: u64, data: &[u8]) -> Result<FCall> {
        let entry = self.fids.get_mut(&fid).ok_or(Error::Protocol(estr::INVALID_FID))?;
        if !entry.opened {
            return Err(Error::Protocol(estr::NOT_OPEN));
        }
        let count = self
            .driver
            .write_file(entry.qid, offset, data, &mut entry.aux)
            .map_err(wrap_driver_err)?;
        Ok(FCall::Rwrite { count })
    }

    fn clunk(&mut self, fid: u32) -> Result<FCall> {
        let mut entry = self.fids.remove(&fid).ok_or(Error::Protocol(estr::INVALID_FID))?;
        if entry.opened {
            self.driver.close_file(entry.qid, &mut entry.aux);
        }
        Ok(FCall::Rclunk)
    }

    fn stat(&mut self, fid: u32) -> Result<FCall> {
        let qid = self.fids.get(&fid).ok_or(Error::Protocol(estr::INVALID_FID))?.qid;
        let stat = self.driver.get_stat(qid).map_err(wrap_driver_err)?;
        Ok(FCall::Rstat { stat })
    }

    fn wstat(&mut self, fid: u32) -> Result<FCall> {
        if !self.fids.contains_key(&fid) {
            return Err(Error::Protocol(estr::INVALID_FID));
        }
        Ok(FCall::Rwstat)
    }
}

fn wrap_driver_err(e: DriverError) -> Error {
    e.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DriverResult;
    use std::io::Cursor;

    #[derive(Default)]
    struct NoopFid;

    struct FixedDriver {
        root: Qid,
        child: Qid,
    }

    impl Driver for FixedDriver {
        type FidState = NoopFid;

        fn get_root(&mut self) -> Qid {
            self.root
        }

        fn has_entry(&mut self, parent: Qid, name: &str) -> bool {
            parent == self.root && name == "greeting"
        }

        fn get_qid(&mut self, _parent: Qid, _name: &str) -> Qid {
            self.child
        }

        fn get_stat(&mut self, qid: Qid) -> DriverResult<crate::fcall::Stat> {
            Ok(crate::fcall::Stat {
                typ: 0,
                dev: 0,
                qid,
                mode: 0,
                atime: 0,
                mtime: 0,
                length: 5,
                name: "greeting".into(),
                uid: "glenda".into(),
                gid: "glenda".into(),
                muid: "".into(),
            })
        }

        fn open_file(&mut self, _qid: Qid, _mode: u8, _aux: &mut NoopFid) -> DriverResult<()> {
            Ok(())
        }

        fn read_file(
            &mut self,
            _qid: Qid,
            offset: u64,
            count: u32,
            _aux: &mut NoopFid,
        ) -> DriverResult<Vec<u8>> {
            let full = b"hello";
            let start = offset.min(full.len() as u64) as usize;
            let end = (start + count as usize).min(full.len());
            Ok(full[start..end].to_vec())
        }

        fn write_file(
            &mut self,
            _qid: Qid,
            _offset: u64,
            _data: &[u8],
            _aux: &mut NoopFid,
        ) -> DriverResult<u32> {
            Ok(0)
        }
    }

    fn fresh_session() -> Session<FixedDriver> {
        let root = Qid { typ: QidType::DIR, version: 0, path: 0 };
        let child = Qid { typ: QidType::FILE, version: 0, path: 1 };
        Session::new(FixedDriver { root, child }, 8192)
    }

    fn roundtrip(session: &mut Session<FixedDriver>, req: FCall) -> FCall {
        let msg = Msg { tag: 1, body: req };
        let mut buf = Vec::new();
        crate::codec::write_msg(&mut buf, &msg).unwrap();

        let mut out = Vec::new();
        {
            let mut writer = FrameWriter::new(&mut out);
            session.dispatch(&msg, &mut writer).unwrap();
        }
        let mut reader = FrameReader::new(Cursor::new(out));
        reader.read_msg(8192).unwrap().unwrap().body
    }

    #[test]
    fn attach_walk_open_read_end_to_end() {
        let mut session = fresh_session();

        let attach = roundtrip(
            &mut session,
            FCall::Tattach { fid: 0, afid: NOFID, uname: "glenda".into(), aname: "".into() },
        );
        assert!(matches!(attach, FCall::Rattach { .. }));

        let walk = roundtrip(
            &mut session,
            FCall::Twalk { fid: 0, newfid: 1, wnames: vec!["greeting".into()] },
        );
        match walk {
            FCall::Rwalk { wqids } => assert_eq!(wqids.len(), 1),
            other => panic!("unexpected reply: {other:?}"),
        }

        let open = roundtrip(&mut session, FCall::Topen { fid: 1, mode: 0 });
        assert!(matches!(open, FCall::Ropen { .. }));

        let read = roundtrip(&mut session, FCall::Tread { fid: 1, offset: 0, count: 5 });
        match read {
            FCall::Rread { data } => assert_eq!(data, b"hello"),
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[test]
    fn read_before_open_is_a_protocol_error() {
        let mut session = fresh_session();
        roundtrip(
            &mut session,
            FCall::Tattach { fid: 0, afid: NOFID, uname: "glenda".into(), aname: "".into() },
        );
        let reply = roundtrip(&mut session, FCall::Tread { fid: 0, offset: 0, count: 1 });
        match reply {
            FCall::Rerror { ename } => assert_eq!(ename, estr::NOT_OPEN),
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[test]
    fn reattaching_an_already_bound_fid_overwrites_it() {
        let mut session = fresh_session();
        let req = FCall::Tattach { fid: 0, afid: NOFID, uname: "glenda".into(), aname: "".into() };
        roundtrip(&mut session, req.clone());
        let reply = roundtrip(&mut session, req);
        assert!(matches!(reply, FCall::Rattach { .. }));
    }

    #[test]
    fn walking_a_fid_onto_itself_is_a_duplicate_fid_error() {
        let mut session = fresh_session();
        roundtrip(
            &mut session,
            FCall::Tattach { fid: 0, afid: NOFID, uname: "glenda".into(), aname: "".into() },
        );
        let reply = roundtrip(
            &mut session,
            FCall::Twalk { fid: 0, newfid: 0, wnames: vec!["greeting".into()] },
        );
        match reply {
            FCall::Rerror { ename } => assert_eq!(ename, estr::DUPLICATE_FID),
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[test]
    fn walking_a_missing_name_returns_a_short_walk() {
        let mut session = fresh_session();
        roundtrip(
            &mut session,
            FCall::Tattach { fid: 0, afid: NOFID, uname: "glenda".into(), aname: "".into() },
        );
        let reply = roundtrip(
            &mut session,
            FCall::Twalk { fid: 0, newfid: 1, wnames: vec!["nonexistent".into()] },
        );
        match reply {
            FCall::Rwalk { wqids } => assert!(wqids.is_empty()),
            other => panic!("unexpected reply: {other:?}"),
        }
    }
}
