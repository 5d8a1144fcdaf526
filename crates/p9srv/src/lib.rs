//! A single-threaded 9P2000 file-service protocol server library.
//!
//! # Protocol
//! 9P2000
//!
//! Requests are read and answered one at a time, in the order they
//! arrive, on whatever transport the caller hands to [`session::Session`].
//! There is no concurrency anywhere in this crate: no threads are
//! spawned, no lock is ever taken.

pub mod codec;
pub mod driver;
pub mod error;
pub mod fcall;
pub mod frame;
pub mod hexframe;
pub mod session;
pub mod transport;

pub use crate::driver::Driver;
pub use crate::error::{estr, DriverError, DriverResult, Error, FatalKind, Result};
pub use crate::fcall::*;
pub use crate::session::Session;
