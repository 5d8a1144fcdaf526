//! Optional hex-encoding transport wrapper.
//!
//! Wraps a byte stream so every frame travels as ASCII hex digits instead
//! of raw bytes, which is convenient over terminals and other channels
//! that mangle arbitrary binary data. The writer announces a sentinel once
//! before its first byte; the reader scans for that same sentinel before
//! treating anything as hex.
//!
//! Grounded on the hex-framing wrapper this server's wire behavior was
//! distilled from: a fixed sentinel, write-once announce, read-once sync,
//! then a one-to-one hex digit pair per byte for the rest of the stream.

use std::io::{self, Read, Write};

const SENTINEL: &[u8] = b"<HEXLIFY_FRAMING>";

fn hex_err(e: hex::FromHexError) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, e)
}

/// Reads hex-encoded bytes off of `inner`, first scanning for [`SENTINEL`].
pub struct HexFrameReader<R> {
    inner: R,
    synced: bool,
}

impl<R: Read> HexFrameReader<R> {
    pub fn new(inner: R) -> Self {
        HexFrameReader { inner, synced: false }
    }

    fn sync(&mut self) -> io::Result<()> {
        if self.synced {
            return Ok(());
        }
        let mut window = vec![0u8; SENTINEL.len()];
        let mut filled = 0usize;
        let mut byte = [0u8; 1];
        loop {
            self.inner.read_exact(&mut byte)?;
            if filled < window.len() {
                window[filled] = byte[0];
                filled += 1;
            } else {
                window.rotate_left(1);
                *window.last_mut().unwrap() = byte[0];
            }
            if filled == window.len() && window == SENTINEL {
                self.synced = true;
                return Ok(());
            }
        }
    }
}

impl<R: Read> Read for HexFrameReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.sync()?;

        if buf.len() == 1 {
            // A single-byte probe is how the frame layer detects a clean
            // EOF before the next frame; it must be allowed to see Ok(0).
            let mut hi = [0u8; 1];
            if self.inner.read(&mut hi)? == 0 {
                return Ok(0);
            }
            let mut lo = [0u8; 1];
            self.inner.read_exact(&mut lo)?;
            let decoded = hex::decode([hi[0], lo[0]]).map_err(hex_err)?;
            buf[0] = decoded[0];
            return Ok(1);
        }

        let mut hexbuf = vec![0u8; buf.len() * 2];
        self.inner.read_exact(&mut hexbuf)?;
        let decoded = hex::decode(&hexbuf).map_err(hex_err)?;
        buf[..decoded.len()].copy_from_slice(&decoded);
        Ok(decoded.len())
    }
}

/// Hex-encodes bytes written to `inner`, announcing [`SENTINEL`] once
/// before the first write.
pub struct HexFrameWriter<W> {
    inner: W,
    announced: bool,
}

impl<W: Write> HexFrameWriter<W> {
    pub fn new(inner: W) -> Self {
        HexFrameWriter { inner, announced: false }
    }
}

impl<W: Write> Write for HexFrameWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.announced {
            self.inner.write_all(SENTINEL)?;
            self.announced = true;
        }
        self.inner.write_all(hex::encode(buf).as_bytes())?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn write_announces_sentinel_once_then_hex_encodes() {
        let mut out = Vec::new();
        {
            let mut w = HexFrameWriter::new(&mut out);
            w.write_all(b"ab").unwrap();
            w.write_all(b"cd").unwrap();
        }
        let mut expected = SENTINEL.to_vec();
        expected.extend_from_slice(hex::encode(b"ab").as_bytes());
        expected.extend_from_slice(hex::encode(b"cd").as_bytes());
        assert_eq!(out, expected);
    }

    #[test]
    fn reader_scans_sentinel_split_across_many_short_reads() {
        let mut wire = Vec::new();
        wire.extend_from_slice(b"garbage-before-sync");
        wire.extend_from_slice(SENTINEL);
        wire.extend_from_slice(hex::encode(b"hello").as_bytes());

        let mut r = HexFrameReader::new(Cursor::new(wire));
        let mut got = [0u8; 5];
        r.read_exact(&mut got).unwrap();
        assert_eq!(&got, b"hello");
    }

    #[test]
    fn round_trips_through_writer_and_reader() {
        let mut wire = Vec::new();
        {
            let mut w = HexFrameWriter::new(&mut wire);
            w.write_all(b"round-trip-me").unwrap();
        }
        let mut r = HexFrameReader::new(Cursor::new(wire));
        let mut got = vec![0u8; b"round-trip-me".len()];
        r.read_exact(&mut got).unwrap();
        assert_eq!(&got, b"round-trip-me");
    }

    #[test]
    fn bad_hex_after_sync_is_a_decode_error() {
        let mut wire = SENTINEL.to_vec();
        wire.extend_from_slice(b"zz");
        let mut r = HexFrameReader::new(Cursor::new(wire));
        let mut got = [0u8; 1];
        assert!(r.read_exact(&mut got).is_err());
    }
}
