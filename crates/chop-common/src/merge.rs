//! Label/annotation map merging
//!
//! Pod templates and Service templates merge computed labels with opposite
//! precedence. Both go through [`merge_maps`] so the policy is always named
//! at the call site.

use std::collections::BTreeMap;

/// Which side wins when both maps set the same key
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MergePolicy {
    /// Keys already present in the base map are kept; incoming only fills gaps
    KeepExisting,
    /// Incoming values replace base values for the same key
    Overwrite,
}

/// Merge `incoming` into `base` according to `policy`.
pub fn merge_maps(
    base: &mut BTreeMap<String, String>,
    incoming: &BTreeMap<String, String>,
    policy: MergePolicy,
) {
    for (key, value) in incoming {
        match policy {
            MergePolicy::KeepExisting => {
                base.entry(key.clone()).or_insert_with(|| value.clone());
            }
            MergePolicy::Overwrite => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}
