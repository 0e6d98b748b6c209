use std::collections::HashMap;
use std::fmt;

use anyhow::{bail, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Byte,
    Word,
    Dword,
    Qword,
    Float,
    Double,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoryEntry {
    pub address: u64,
    pub kind: ValueKind,
}

impl MemoryEntry {
    pub fn new(address: u64, kind: ValueKind) -> Self {
        Self { address, kind }
    }
}

impl fmt::Display for MemoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:X}:{:?}", self.address, self.kind)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MemoryValue {
    Byte(u8),
    Word(u16),
    Dword(u32),
    Qword(u64),
    Float(f32),
    Double(f64),
}

impl MemoryValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Byte(_) => ValueKind::Byte,
            Self::Word(_) => ValueKind::Word,
            Self::Dword(_) => ValueKind::Dword,
            Self::Qword(_) => ValueKind::Qword,
            Self::Float(_) => ValueKind::Float,
            Self::Double(_) => ValueKind::Double,
        }
    }
}

/// Read/write access to typed values inside the host process.
pub trait HostMemory {
    fn read(&self, entries: &[MemoryEntry]) -> Result<Vec<MemoryValue>>;
    fn write(&mut self, writes: &[(MemoryEntry, MemoryValue)]) -> Result<()>;
}

/// Host memory simulated with a map, used when no real host is attached.
#[derive(Debug, Clone, Default)]
pub struct InMemoryHost {
    cells: HashMap<u64, MemoryValue>,
    writes: usize,
}

impl InMemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values(values: impl IntoIterator<Item = (u64, MemoryValue)>) -> Self {
        Self {
            cells: values.into_iter().collect(),
            writes: 0,
        }
    }

    pub fn value_at(&self, address: u64) -> Option<MemoryValue> {
        self.cells.get(&address).copied()
    }

    pub fn write_count(&self) -> usize {
        self.writes
    }
}

impl HostMemory for InMemoryHost {
    fn read(&self, entries: &[MemoryEntry]) -> Result<Vec<MemoryValue>> {
        let mut out = Vec::with_capacity(entries.len());
        for entry in entries {
            let Some(value) = self.cells.get(&entry.address) else {
                bail!("address {} is not mapped", entry);
            };
            if value.kind() != entry.kind {
                bail!(
                    "address {} holds {:?}, not {:?}",
                    entry,
                    value.kind(),
                    entry.kind
                );
            }
            out.push(*value);
        }
        Ok(out)
    }

    fn write(&mut self, writes: &[(MemoryEntry, MemoryValue)]) -> Result<()> {
        for (entry, value) in writes {
            if value.kind() != entry.kind {
                bail!(
                    "cannot write {:?} into {} declared as {:?}",
                    value.kind(),
                    entry,
                    entry.kind
                );
            }
        }
        for (entry, value) in writes {
            self.cells.insert(entry.address, *value);
            self.writes += 1;
        }
        Ok(())
    }
}
