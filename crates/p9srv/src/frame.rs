//! Frame-level I/O: the 4-byte size prefix wrapping every message, msize
//! enforcement, and verb-role parity checking.
//!
//! # Protocol
//! 9P2000

use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::trace;
use num_traits::FromPrimitive;

use crate::codec::{self, Decodable, Encodable};
use crate::error::{Error, FatalKind, Result};
use crate::fcall::{Msg, MsgType};

/// Bytes consumed by `size[4]` + `verb[1]` + `tag[2]`, before any payload.
const HEADER_SIZE: u32 = 7;

fn io_to_fatal(e: io::Error) -> Error {
    Error::Fatal(FatalKind::Frame(e))
}

/// Reads whole frames off of a blocking [`Read`], enforcing the negotiated
/// `msize` ceiling and that every incoming verb is a legal client (`T`)
/// message.
pub struct FrameReader<R> {
    inner: R,
}

impl<R: Read> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        FrameReader { inner }
    }

    /// Read one frame. Returns `Ok(None)` on a clean EOF before any byte of
    /// the next frame's size prefix has been read.
    pub fn read_msg(&mut self, msize: u32) -> Result<Option<Msg>> {
        let mut size_buf = [0u8; 4];
        match self.inner.read(&mut size_buf[..1]) {
            Ok(0) => return Ok(None),
            Ok(_) => {}
            Err(e) => return Err(io_to_fatal(e)),
        }
        self.inner
            .read_exact(&mut size_buf[1..])
            .map_err(io_to_fatal)?;
        let size = u32::from_le_bytes(size_buf);

        if size > msize {
            return Err(Error::Fatal(FatalKind::Oversized { size, msize }));
        }
        if size < HEADER_SIZE {
            return Err(Error::Fatal(FatalKind::Frame(io::Error::new(
                io::ErrorKind::InvalidData,
                "frame shorter than the mandatory verb+tag header",
            ))));
        }

        let mut body = vec![0u8; (size - 4) as usize];
        self.inner.read_exact(&mut body).map_err(io_to_fatal)?;

        let verb = body[0];
        check_incoming_verb(verb)?;

        let msg = codec::read_msg(&mut &body[..]).map_err(|e| match e.kind() {
            io::ErrorKind::InvalidData => Error::Fatal(FatalKind::BadUtf8),
            io::ErrorKind::UnexpectedEof => Error::Fatal(FatalKind::ShortBuffer),
            _ => Error::Fatal(FatalKind::Frame(e)),
        })?;

        trace!("read {:?} tag={:#x}", MsgType::from_u8(verb), msg.tag);
        Ok(Some(msg))
    }
}

/// Rejects `Terror`/reserved verbs and any non-`T` (client) verb a
/// well-behaved client should never send to a server.
fn check_incoming_verb(verb: u8) -> Result<()> {
    match MsgType::from_u8(verb) {
        Some(t) if t.is_t() => Ok(()),
        Some(_) => Err(Error::Fatal(FatalKind::RoleMismatch)),
        None => Err(Error::Fatal(FatalKind::IllegalVerb(verb))),
    }
}

/// Writes whole frames to a blocking [`Write`], prefixing each with its
/// total size including the prefix itself.
pub struct FrameWriter<W> {
    inner: W,
}

impl<W: Write> FrameWriter<W> {
    pub fn new(inner: W) -> Self {
        FrameWriter { inner }
    }

    pub fn write_msg(&mut self, msg: &Msg) -> Result<()> {
        let mut body = Vec::new();
        codec::write_msg(&mut body, msg).map_err(|e| Error::Fatal(FatalKind::Frame(e)))?;

        let size = 4u32 + body.len() as u32;
        self.inner
            .write_u32::<LittleEndian>(size)
            .map_err(io_to_fatal)?;
        self.inner.write_all(&body).map_err(io_to_fatal)?;
        self.inner.flush().map_err(io_to_fatal)?;

        trace!("wrote {:?} tag={:#x}", MsgType::from(&msg.body), msg.tag);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fcall::{FCall, P9_2000};
    use std::io::Cursor;

    #[test]
    fn round_trips_a_message_through_the_frame_layer() {
        let msg = Msg {
            tag: 1,
            body: FCall::Tversion { msize: 8192, version: P9_2000.to_owned() },
        };
        let mut buf = Vec::new();
        FrameWriter::new(&mut buf).write_msg(&msg).unwrap();

        let mut reader = FrameReader::new(Cursor::new(buf));
        let got = reader.read_msg(8192).unwrap().unwrap();
        assert_eq!(got, msg);
    }

    #[test]
    fn rejects_frames_over_msize() {
        let msg = Msg {
            tag: 1,
            body: FCall::Tversion { msize: 8192, version: P9_2000.to_owned() },
        };
        let mut buf = Vec::new();
        FrameWriter::new(&mut buf).write_msg(&msg).unwrap();

        let mut reader = FrameReader::new(Cursor::new(buf));
        let err = reader.read_msg(4).unwrap_err();
        assert!(matches!(err, Error::Fatal(FatalKind::Oversized { .. })));
    }

    #[test]
    fn rejects_r_verbs_sent_by_a_client() {
        let msg = Msg { tag: 1, body: FCall::Rflush };
        let mut buf = Vec::new();
        FrameWriter::new(&mut buf).write_msg(&msg).unwrap();

        let mut reader = FrameReader::new(Cursor::new(buf));
        let err = reader.read_msg(8192).unwrap_err();
        assert!(matches!(err, Error::Fatal(FatalKind::RoleMismatch)));
    }

    #[test]
    fn clean_eof_before_a_frame_is_not_an_error() {
        let mut reader = FrameReader::new(Cursor::new(Vec::<u8>::new()));
        assert!(reader.read_msg(8192).unwrap().is_none());
    }
}
