//! Synthesis of Kubernetes objects from a ClickHouseInstallation
//!
//! Turns the layered installation descriptor (clusters, shards, hosts and
//! shared templates) into the StatefulSets, Services and ConfigMaps the
//! operator submits. Synthesis is pure and synchronous; the descriptor is
//! normalized once per pass and then read concurrently by per-host builds.
//!
//! # Usage
//!
//! ```rust,ignore
//! let chi = normalize(&installation, &TracingWarningSink)?;
//! let creator = Creator::new(&chi, &generator).with_config(&config);
//!
//! for host in chi.hosts() {
//!     let sts = creator.create_stateful_set(host);
//!     let svc = creator.create_service(Scope::Host(host))?;
//! }
//! ```

#![deny(missing_docs)]

mod compiled;
pub mod config;
mod config_map;
mod creator;
pub mod fingerprint;
pub mod labels;
pub mod naming;
pub mod normalize;
mod pipeline;
pub mod status;
pub mod warning;

pub use compiled::InstallationResources;
pub use config::SynthesisConfig;
pub use config_map::{ConfigFilesGenerator, ConfigGroup};
pub use creator::Creator;
pub use labels::{Readiness, Scope};
pub use normalize::{
    normalize, Cluster, Host, HostAddress, HostPorts, NormalizedInstallation, Shard,
};
pub use pipeline::containers::{
    lookup_container, ContainerLookup, CLICKHOUSE_CONTAINER_NAME, LOG_CONTAINER_NAME,
};
pub use pipeline::volumes::{
    COMMON_CONFIG_PATH, CONFIG_FILE_MODE, DATA_PATH, HOST_CONFIG_PATH, LOG_PATH, USERS_CONFIG_PATH,
};
pub use warning::{RecordingWarningSink, SynthesisWarning, TracingWarningSink, WarningSink};
