use std::collections::HashMap;
use std::path::{Path, PathBuf};

use strata_common::{InFilePosition, Result, StrataError};

use crate::container::RegionContainer;

/// A region container held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryRegion {
    path: PathBuf,
    slots: HashMap<InFilePosition, Vec<u8>>,
}

impl MemoryRegion {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        MemoryRegion {
            path: path.into(),
            slots: HashMap::new(),
        }
    }

    pub fn with_slot(mut self, slot: InFilePosition, data: Vec<u8>) -> Self {
        self.slots.insert(slot, data);
        self
    }
}

impl RegionContainer for MemoryRegion {
    fn path(&self) -> &Path {
        &self.path
    }

    fn has_slot(&self, slot: InFilePosition) -> bool {
        self.slots.contains_key(&slot)
    }

    fn read_slot(&mut self, slot: InFilePosition) -> Result<Option<Vec<u8>>> {
        Ok(self.slots.get(&slot).cloned())
    }

    fn write_slot(&mut self, slot: InFilePosition, data: &[u8]) -> Result<()> {
        if !slot.is_valid() {
            return Err(StrataError::ContractViolation(format!(
                "slot {} outside the region grid",
                slot
            )));
        }
        self.slots.insert(slot, data.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_slots_in_grid_order() {
        let mut region = MemoryRegion::new("mem")
            .with_slot(InFilePosition::new(1, 0), vec![1])
            .with_slot(InFilePosition::new(0, 5), vec![2]);
        assert_eq!(
            region.occupied_slots(),
            vec![InFilePosition::new(0, 5), InFilePosition::new(1, 0)]
        );
        region.write_slot(InFilePosition::new(0, 0), &[3]).unwrap();
        assert_eq!(
            region.read_slot(InFilePosition::new(0, 0)).unwrap(),
            Some(vec![3])
        );
        assert_matches!(
            region.write_slot(InFilePosition::new(32, 0), &[]),
            Err(StrataError::ContractViolation(_))
        );
    }
}
