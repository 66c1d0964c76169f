use std::path::Path;

use strata_common::{InFilePosition, Result};

/// Storage for the chunk payloads of one 32×32 region.
///
/// Payloads handed in and out are plain NBT bytes; any compression is the
/// container's own business.
pub trait RegionContainer: Send {
    /// Where the container lives, for diagnostics.
    fn path(&self) -> &Path;

    fn has_slot(&self, slot: InFilePosition) -> bool;

    /// The payload stored in `slot`, or `None` if the slot is empty.
    fn read_slot(&mut self, slot: InFilePosition) -> Result<Option<Vec<u8>>>;

    fn write_slot(&mut self, slot: InFilePosition, data: &[u8]) -> Result<()>;

    /// Occupied slots in grid order (`x` major).
    fn occupied_slots(&self) -> Vec<InFilePosition> {
        InFilePosition::grid()
            .filter(|slot| self.has_slot(*slot))
            .collect()
    }
}
