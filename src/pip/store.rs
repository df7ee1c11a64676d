//! Immutable id → region mapping.

use hashbrown::hash_map::Entry;
use hashbrown::HashMap;

use crate::error::BuildError;
use crate::models::{Region, RegionId};

/// Read-only collection of regions keyed by id.
#[derive(Debug, Clone, Default)]
pub struct RegionStore {
    regions: HashMap<RegionId, Region>,
}

impl RegionStore {
    /// Build the store, failing on the first repeated id.
    pub fn build(regions: impl IntoIterator<Item = Region>) -> Result<Self, BuildError> {
        let mut map = HashMap::new();
        for region in regions {
            match map.entry(region.id()) {
                Entry::Occupied(_) => return Err(BuildError::DuplicateId(region.id())),
                Entry::Vacant(slot) => {
                    slot.insert(region);
                }
            }
        }
        Ok(Self { regions: map })
    }

    pub fn get(&self, id: RegionId) -> Option<&Region> {
        self.regions.get(&id)
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Iterate over all regions in unspecified order.
    pub fn regions(&self) -> impl Iterator<Item = &Region> {
        self.regions.values()
    }
}
