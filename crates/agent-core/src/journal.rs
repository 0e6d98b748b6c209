use std::collections::BTreeMap;

use anyhow::{Context, Result};
use tracing::debug;

use self_protect::StateRestorer;
use shroud_host::{HostMemory, MemoryEntry, MemoryValue};

/// Host memory that remembers the original value of every entry before the
/// first write to it, so the session can be rolled back.
#[derive(Debug)]
pub struct JournaledMemory<M> {
    inner: M,
    originals: BTreeMap<u64, (MemoryEntry, MemoryValue)>,
}

impl<M: HostMemory> JournaledMemory<M> {
    pub fn new(inner: M) -> Self {
        Self {
            inner,
            originals: BTreeMap::new(),
        }
    }

    pub fn journaled(&self) -> usize {
        self.originals.len()
    }

    #[cfg(test)]
    pub fn inner(&self) -> &M {
        &self.inner
    }

    fn record_originals(&mut self, writes: &[(MemoryEntry, MemoryValue)]) -> Result<()> {
        let fresh: Vec<MemoryEntry> = writes
            .iter()
            .map(|(entry, _)| *entry)
            .filter(|entry| !self.originals.contains_key(&entry.address))
            .collect();
        if fresh.is_empty() {
            return Ok(());
        }
        let values = self
            .inner
            .read(&fresh)
            .context("failed capturing original values before write")?;
        for (entry, value) in fresh.into_iter().zip(values) {
            self.originals.entry(entry.address).or_insert((entry, value));
        }
        Ok(())
    }
}

impl<M: HostMemory> HostMemory for JournaledMemory<M> {
    fn read(&self, entries: &[MemoryEntry]) -> Result<Vec<MemoryValue>> {
        self.inner.read(entries)
    }

    fn write(&mut self, writes: &[(MemoryEntry, MemoryValue)]) -> Result<()> {
        self.record_originals(writes)?;
        self.inner.write(writes)
    }
}

impl<M: HostMemory> StateRestorer for JournaledMemory<M> {
    fn restore_state(&mut self) -> Result<usize> {
        if self.originals.is_empty() {
            return Ok(0);
        }
        let originals: Vec<(MemoryEntry, MemoryValue)> =
            self.originals.values().copied().collect();
        self.inner
            .write(&originals)
            .context("failed writing original values back")?;
        self.originals.clear();
        debug!(restored = originals.len(), "journaled entries restored");
        Ok(originals.len())
    }
}

#[cfg(test)]
mod tests {
    use shroud_host::{InMemoryHost, ValueKind};

    use super::*;

    fn dword(address: u64) -> MemoryEntry {
        MemoryEntry::new(address, ValueKind::Dword)
    }

    #[test]
    fn restore_puts_back_first_seen_values() {
        let host = InMemoryHost::with_values([
            (0x10, MemoryValue::Dword(5)),
            (0x20, MemoryValue::Dword(9)),
        ]);
        let mut memory = JournaledMemory::new(host);

        memory
            .write(&[(dword(0x10), MemoryValue::Dword(50))])
            .expect("first write");
        memory
            .write(&[
                (dword(0x10), MemoryValue::Dword(500)),
                (dword(0x20), MemoryValue::Dword(90)),
            ])
            .expect("second write");
        assert_eq!(memory.journaled(), 2);

        assert_eq!(memory.restore_state().expect("restore"), 2);
        assert_eq!(memory.inner().value_at(0x10), Some(MemoryValue::Dword(5)));
        assert_eq!(memory.inner().value_at(0x20), Some(MemoryValue::Dword(9)));
        assert_eq!(memory.restore_state().expect("second restore"), 0);
    }

    #[test]
    fn write_to_unmapped_entry_is_refused_untouched() {
        let host = InMemoryHost::with_values([(0x10, MemoryValue::Dword(5))]);
        let mut memory = JournaledMemory::new(host);

        let err = memory
            .write(&[
                (dword(0x10), MemoryValue::Dword(1)),
                (dword(0x99), MemoryValue::Dword(2)),
            ])
            .expect_err("unmapped address");
        assert!(format!("{:#}", err).contains("not mapped"));
        assert_eq!(memory.journaled(), 0);
        assert_eq!(memory.inner().value_at(0x10), Some(MemoryValue::Dword(5)));
    }
}
