//! A fixed, in-memory sample driver: a tiny `/dev`-like tree used to
//! exercise every `p9srv::Driver` method end-to-end.
//!
//! The tree is static and read-mostly, grounded on the classic toy
//! filesystem 9P servers are traditionally demonstrated against: a root
//! directory, a `dev` subdirectory holding a handful of synthetic devices,
//! and a `ttys` subdirectory of placeholder terminal files.

use p9srv::codec::Encodable;
use p9srv::{DriverError, DriverResult, Qid, QidType, Stat};

const ROOT: u64 = 0;
const DEV: u64 = 1;
const TTYS: u64 = 2;
const RANDOM: u64 = 11;
const ZERO: u64 = 12;
const NULL: u64 = 13;
const TTY_FIRST: u64 = 21;
const TTY_LAST: u64 = 25;

const MODE_DIR: u32 = 0x8000_0000 | 0o755;
const MODE_FILE: u32 = 0o644;

#[derive(Default)]
pub enum DemoFidState {
    #[default]
    None,
    /// A directory's children, pre-serialized as back-to-back `Stat`
    /// records, sliced by `offset`/`count` on each subsequent read.
    Listing(Vec<u8>),
}

/// A minimal in-memory driver exercising every `p9srv::Driver` method.
pub struct DemoDriver {
    rng_state: u64,
}

impl Default for DemoDriver {
    fn default() -> Self {
        DemoDriver { rng_state: 0x2545_f491_4f6c_dd1d }
    }
}

impl DemoDriver {
    fn qid_for(path: u64) -> Qid {
        let typ = match path {
            ROOT | DEV | TTYS => QidType::DIR,
            _ => QidType::FILE,
        };
        Qid { typ, version: 0, path }
    }

    fn name_for(path: u64) -> &'static str {
        match path {
            ROOT => "/",
            DEV => "dev",
            TTYS => "ttys",
            RANDOM => "random",
            ZERO => "zero",
            NULL => "null",
            21 => "tty1",
            22 => "tty2",
            23 => "tty3",
            24 => "tty4",
            25 => "tty5",
            _ => "?",
        }
    }

    fn children_of(path: u64) -> &'static [u64] {
        match path {
            ROOT => &[DEV],
            DEV => &[TTYS, RANDOM, ZERO, NULL],
            TTYS => &[21, 22, 23, 24, 25],
            _ => &[],
        }
    }

    fn stat_for(path: u64) -> Stat {
        let qid = Self::qid_for(path);
        let is_dir = qid.typ.contains(QidType::DIR);
        Stat {
            typ: 0,
            dev: 0,
            qid,
            mode: if is_dir { MODE_DIR } else { MODE_FILE },
            atime: 0,
            mtime: 0,
            length: 0,
            name: Self::name_for(path).to_owned(),
            uid: "glenda".to_owned(),
            gid: "glenda".to_owned(),
            muid: "".to_owned(),
        }
    }

    /// A small, deterministic xorshift generator. Good enough to make
    /// `/dev/random` behave like a stream of incompressible bytes for
    /// protocol testing; not a cryptographic source.
    fn next_random_byte(&mut self) -> u8 {
        self.rng_state ^= self.rng_state << 13;
        self.rng_state ^= self.rng_state >> 7;
        self.rng_state ^= self.rng_state << 17;
        (self.rng_state & 0xff) as u8
    }
}

impl p9srv::Driver for DemoDriver {
    type FidState = DemoFidState;

    fn get_root(&mut self) -> Qid {
        Self::qid_for(ROOT)
    }

    fn has_entry(&mut self, parent: Qid, name: &str) -> bool {
        Self::children_of(parent.path)
            .iter()
            .any(|&child| Self::name_for(child) == name)
    }

    fn get_qid(&mut self, parent: Qid, name: &str) -> Qid {
        Self::children_of(parent.path)
            .iter()
            .find(|&&child| Self::name_for(child) == name)
            .map(|&child| Self::qid_for(child))
            .unwrap_or(parent)
    }

    fn get_stat(&mut self, qid: Qid) -> DriverResult<Stat> {
        Ok(Self::stat_for(qid.path))
    }

    fn open_file(&mut self, qid: Qid, _mode: u8, aux: &mut DemoFidState) -> DriverResult<()> {
        if qid.typ.contains(QidType::DIR) {
            let mut bytes = Vec::new();
            for &child in Self::children_of(qid.path) {
                Self::stat_for(child).encode(&mut bytes).map_err(DriverError::Io)?;
            }
            *aux = DemoFidState::Listing(bytes);
        }
        Ok(())
    }

    fn read_file(
        &mut self,
        qid: Qid,
        offset: u64,
        count: u32,
        aux: &mut DemoFidState,
    ) -> DriverResult<Vec<u8>> {
        match qid.path {
            RANDOM => Ok((0..count).map(|_| self.next_random_byte()).collect()),
            ZERO => Ok(vec![0u8; count as usize]),
            NULL => Ok(Vec::new()),
            p if (TTY_FIRST..=TTY_LAST).contains(&p) => Ok(Vec::new()),
            _ => match aux {
                DemoFidState::Listing(bytes) => {
                    let start = (offset as usize).min(bytes.len());
                    let end = (start + count as usize).min(bytes.len());
                    Ok(bytes[start..end].to_vec())
                }
                DemoFidState::None => Err(DriverError::NotFound),
            },
        }
    }

    fn write_file(
        &mut self,
        _qid: Qid,
        _offset: u64,
        data: &[u8],
        _aux: &mut DemoFidState,
    ) -> DriverResult<u32> {
        Ok(data.len() as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use p9srv::Driver;

    #[test]
    fn dev_zero_reads_back_nul_bytes() {
        let mut driver = DemoDriver::default();
        let qid = Qid { typ: QidType::FILE, version: 0, path: ZERO };
        let mut aux = DemoFidState::default();
        let data = driver.read_file(qid, 0, 4, &mut aux).unwrap();
        assert_eq!(data, vec![0, 0, 0, 0]);
    }

    #[test]
    fn dev_null_is_always_eof() {
        let mut driver = DemoDriver::default();
        let qid = Qid { typ: QidType::FILE, version: 0, path: NULL };
        let mut aux = DemoFidState::default();
        let data = driver.read_file(qid, 0, 16, &mut aux).unwrap();
        assert!(data.is_empty());
    }

    #[test]
    fn root_lists_dev_as_its_only_child() {
        let mut driver = DemoDriver::default();
        let root = Qid { typ: QidType::DIR, version: 0, path: ROOT };
        assert!(driver.has_entry(root, "dev"));
        assert!(!driver.has_entry(root, "nonexistent"));
    }
}
