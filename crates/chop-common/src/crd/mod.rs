//! Custom Resource Definitions for the ClickHouse operator
//!
//! The `ClickHouseInstallation` descriptor and the reusable templates it owns.

mod installation;
mod templates;

pub use installation::{
    ClickHouseInstallation, ClickHouseInstallationSpec, ClusterLayout, ClusterSpec, Configuration,
    Defaults, ReplicaSpec, ShardSpec,
};
pub use templates::{
    PodDistribution, PodDistributionType, PodTemplate, ServiceTemplate, TemplateRefs, Templates,
    VolumeClaimTemplate,
};
