//! Output of whole-installation synthesis

use chop_common::k8s::{ConfigMap, Service, StatefulSet};
use chop_common::Error;

/// Every object synthesized for one installation in one pass
#[derive(Clone, Debug, Default)]
pub struct InstallationResources {
    /// Common, common-users and per-host ConfigMaps
    pub config_maps: Vec<ConfigMap>,
    /// Services for every scope that resolved to one
    pub services: Vec<Service>,
    /// One StatefulSet per host
    pub stateful_sets: Vec<StatefulSet>,
    /// Services that were rejected; the rest of the pass is unaffected
    pub errors: Vec<Error>,
}

impl InstallationResources {
    /// Whether any Service was rejected
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}
