//! VM profile catalog
//!
//! Read-only lookup of VM type to capacity and price, built once per
//! planning cycle from the fetched profiles.

use crate::models::VmProfile;
use std::collections::HashMap;

/// Lookup table of VM profiles keyed by VM type
#[derive(Debug, Clone, Default)]
pub struct VmCatalog {
    profiles: HashMap<String, VmProfile>,
}

impl VmCatalog {
    pub fn new(profiles: Vec<VmProfile>) -> Self {
        profiles.into_iter().collect()
    }

    /// Get the profile of a VM type
    pub fn get(&self, vm_type: &str) -> Option<&VmProfile> {
        self.profiles.get(vm_type)
    }

    pub fn contains(&self, vm_type: &str) -> bool {
        self.profiles.contains_key(vm_type)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Profiles sorted by VM type
    pub fn profiles(&self) -> Vec<&VmProfile> {
        let mut profiles: Vec<_> = self.profiles.values().collect();
        profiles.sort_by(|a, b| a.vm_type.cmp(&b.vm_type));
        profiles
    }
}

impl FromIterator<VmProfile> for VmCatalog {
    fn from_iter<I: IntoIterator<Item = VmProfile>>(iter: I) -> Self {
        Self {
            profiles: iter
                .into_iter()
                .map(|p| (p.vm_type.clone(), p))
                .collect(),
        }
    }
}
