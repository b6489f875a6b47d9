//! Instruction event sources: packed binary traces and a synthetic
//! trace builder.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use crate::branch::{InstFlags, InstRecord};

/// On-disk size of one packed record: pc (u64), tgt (u64), flags (u32),
/// and a reserved u32, all little-endian.
pub const RECORD_SIZE: usize = 24;

/// Default instruction length used by [`TraceBuilder`].
const DEFAULT_ILEN: usize = 4;

fn decode_record(bytes: &[u8]) -> InstRecord {
    let pc = u64::from_le_bytes(bytes[0..8].try_into().unwrap()) as usize;
    let tgt = u64::from_le_bytes(bytes[8..16].try_into().unwrap()) as usize;
    let flags = u32::from_le_bytes(bytes[16..20].try_into().unwrap());
    InstRecord::new(pc, tgt, InstFlags(flags))
}

fn encode_record(record: &InstRecord) -> [u8; RECORD_SIZE] {
    let mut bytes = [0u8; RECORD_SIZE];
    bytes[0..8].copy_from_slice(&(record.pc as u64).to_le_bytes());
    bytes[8..16].copy_from_slice(&(record.tgt as u64).to_le_bytes());
    bytes[16..20].copy_from_slice(&record.flags.0.to_le_bytes());
    bytes
}

/// An instruction trace loaded from a packed binary file.
#[derive(Debug)]
pub struct BinaryTrace {
    records: Vec<InstRecord>,
    name: String,
}
impl BinaryTrace {
    /// Load a trace, rejecting files that are not a whole number of
    /// records.
    pub fn from_file(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut data = Vec::new();
        let _ = File::open(path)?.read_to_end(&mut data)?;
        if data.len() % RECORD_SIZE != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "trace {} is {} bytes, not a multiple of the {}-byte record size",
                    name,
                    data.len(),
                    RECORD_SIZE
                ),
            ));
        }

        let records = data.chunks_exact(RECORD_SIZE).map(decode_record).collect();
        Ok(Self { records, name })
    }

    /// Write records out in the packed binary format.
    pub fn write(records: &[InstRecord], mut w: impl Write) -> io::Result<()> {
        for record in records {
            w.write_all(&encode_record(record))?;
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn num_entries(&self) -> usize {
        self.records.len()
    }

    pub fn records(&self) -> &[InstRecord] {
        &self.records
    }
}

/// Builds well-formed instruction event streams in memory.
///
/// Instructions are emitted with a fixed 4-byte length; call return
/// addresses are the usual `pc + ilen` fallthrough.
pub struct TraceBuilder {
    records: Vec<InstRecord>,
}
impl TraceBuilder {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    fn push(&mut self, pc: usize, tgt: usize, flags: InstFlags) -> &mut Self {
        self.records.push(InstRecord::new(pc, tgt, flags));
        self
    }

    /// A conditional branch.
    pub fn branch(&mut self, pc: usize, tgt: usize, taken: bool) -> &mut Self {
        self.push(pc, tgt, InstFlags::pack(DEFAULT_ILEN, false, false, true, taken))
    }

    /// An unconditional jump.
    pub fn jump(&mut self, pc: usize, tgt: usize) -> &mut Self {
        self.push(pc, tgt, InstFlags::pack(DEFAULT_ILEN, false, false, true, true))
    }

    /// A subroutine call.
    pub fn call(&mut self, pc: usize, tgt: usize) -> &mut Self {
        self.push(pc, tgt, InstFlags::pack(DEFAULT_ILEN, true, false, true, true))
    }

    /// A subroutine return. `tgt` is the address actually returned to.
    pub fn ret(&mut self, pc: usize, tgt: usize) -> &mut Self {
        self.push(pc, tgt, InstFlags::pack(DEFAULT_ILEN, false, true, true, true))
    }

    /// An ordinary instruction with no control-flow behavior.
    pub fn other(&mut self, pc: usize) -> &mut Self {
        self.push(pc, 0, InstFlags::pack(DEFAULT_ILEN, false, false, false, false))
    }

    pub fn records(&self) -> &[InstRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<InstRecord> {
        self.records
    }
}

impl Default for TraceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn record_encoding_round_trips() {
        let record = InstRecord::new(
            0xdead_beef,
            0x1234_5678,
            InstFlags::pack(2, true, false, true, true),
        );
        let bytes = encode_record(&record);
        assert_eq!(decode_record(&bytes), record);
    }

    #[test]
    fn trace_file_round_trips() {
        let mut t = TraceBuilder::new();
        t.call(0x100, 0x400).branch(0x404, 0x100, false).ret(0x408, 0x104);
        let records = t.into_records();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        BinaryTrace::write(&records, &mut file).unwrap();
        file.flush().unwrap();

        let trace = BinaryTrace::from_file(file.path()).unwrap();
        assert_eq!(trace.num_entries(), 3);
        assert_eq!(trace.records(), records.as_slice());
    }

    #[test]
    fn truncated_trace_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0u8; RECORD_SIZE + 1]).unwrap();
        file.flush().unwrap();

        let err = BinaryTrace::from_file(file.path()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
