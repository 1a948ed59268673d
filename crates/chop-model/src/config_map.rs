//! ConfigMaps carrying ClickHouse configuration files
//!
//! The file contents come from a [`ConfigFilesGenerator`]; this module only
//! names and labels the ConfigMaps that carry them.

use std::collections::BTreeMap;

use chop_common::k8s::ConfigMap;
use chop_common::kube_utils::ObjectMeta;
use chop_common::LABEL_CONFIG_MAP;

use crate::labels::{labels, Readiness, Scope};
use crate::naming;
use crate::normalize::{Host, NormalizedInstallation};

/// Which set of configuration files a ConfigMap carries
#[derive(Clone, Copy, Debug)]
pub enum ConfigGroup<'a> {
    /// Server settings shared by every host (config.d)
    Common,
    /// Users, profiles and quotas shared by every host (users.d)
    CommonUsers,
    /// Settings specific to one host (conf.d)
    Host(&'a Host),
}

impl ConfigGroup<'_> {
    /// Value of the `chop.dev/ConfigMap` label
    pub fn label_value(&self) -> &'static str {
        match self {
            ConfigGroup::Common => "Common",
            ConfigGroup::CommonUsers => "CommonUsers",
            ConfigGroup::Host(_) => "Host",
        }
    }
}

/// Produces configuration file contents.
///
/// Called once per group and pass. Must be deterministic for a given
/// installation so ConfigMaps do not churn between passes.
pub trait ConfigFilesGenerator: Send + Sync {
    /// File name to file content for `group`
    fn generate(&self, group: ConfigGroup<'_>) -> BTreeMap<String, String>;
}

pub(crate) fn create_config_map(
    chi: &NormalizedInstallation,
    group: ConfigGroup<'_>,
    generator: &dyn ConfigFilesGenerator,
) -> ConfigMap {
    let (name, scope) = match group {
        ConfigGroup::Common => (naming::common_config_map_name(&chi.name), Scope::Installation),
        ConfigGroup::CommonUsers => (
            naming::common_users_config_map_name(&chi.name),
            Scope::Installation,
        ),
        ConfigGroup::Host(host) => (
            naming::host_config_map_name(&chi.name, &host.address),
            Scope::Host(host),
        ),
    };

    let mut labels = labels(chi, scope, Readiness::Any);
    labels.insert(LABEL_CONFIG_MAP.to_string(), group.label_value().to_string());

    ConfigMap::new(
        ObjectMeta::new(name, chi.namespace.clone()).with_labels(labels),
        generator.generate(group),
    )
}
