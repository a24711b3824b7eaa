use crate::domain::counters::Presentation;
use crate::error::{PollError, Result};
use log::debug;
use std::collections::HashMap;
use std::sync::Arc;

/// Virtual disk index to LUN number mapping.
///
/// The mapping is immutable once built; `rebuild` swaps in a complete new
/// generation, so a reader holding a [`RegistryView`] only ever sees one.
#[derive(Clone, Debug, Default)]
pub struct DeviceRegistry {
    current: Arc<RegistryView>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RegistryView {
    pub generation: u64,
    vd_to_lun: HashMap<u32, u32>,
}

impl RegistryView {
    pub fn resolve(&self, virtual_disk_index: u32) -> Result<u32> {
        self.vd_to_lun
            .get(&virtual_disk_index)
            .copied()
            .ok_or(PollError::MappingNotFound {
                index: virtual_disk_index,
            })
    }

    /// LUN numbers in ascending order.
    pub fn lun_numbers(&self) -> Vec<u32> {
        let mut luns: Vec<u32> = self.vd_to_lun.values().copied().collect();
        luns.sort_unstable();
        luns.dedup();
        luns
    }

    pub fn len(&self) -> usize {
        self.vd_to_lun.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vd_to_lun.is_empty()
    }
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole mapping with one built from `presentations`.
    pub fn rebuild(&mut self, presentations: &[Presentation]) {
        let vd_to_lun: HashMap<u32, u32> = presentations
            .iter()
            .map(|p| (p.virtual_disk_index, p.logical_unit_number))
            .collect();

        let generation = self.current.generation + 1;
        debug!(
            "Mapped {} virtual disks to LUNs (generation {})",
            vd_to_lun.len(),
            generation
        );

        self.current = Arc::new(RegistryView {
            generation,
            vd_to_lun,
        });
    }

    pub fn resolve(&self, virtual_disk_index: u32) -> Result<u32> {
        self.current.resolve(virtual_disk_index)
    }

    /// A handle on the current generation that later rebuilds cannot alter.
    pub fn view(&self) -> Arc<RegistryView> {
        Arc::clone(&self.current)
    }

    pub fn generation(&self) -> u64 {
        self.current.generation
    }

    pub fn lun_numbers(&self) -> Vec<u32> {
        self.current.lun_numbers()
    }
}
