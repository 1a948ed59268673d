//! Descriptor normalization
//!
//! Runs once per reconciliation pass, before any per-host synthesis. The
//! result is an immutable snapshot in which every cluster, shard and host
//! has a name, every host has port numbers, and every level carries its
//! effective template references. Per-host synthesis only ever reads it.

use std::collections::{BTreeMap, HashSet};

use chop_common::crd::{ClickHouseInstallation, TemplateRefs, Templates};
use chop_common::{
    Error, Result, DEFAULT_HTTP_PORT, DEFAULT_INTERSERVER_PORT, DEFAULT_TCP_PORT,
};
use tracing::debug;

use crate::naming;
use crate::warning::{SynthesisWarning, WarningSink};

// =============================================================================
// Snapshot types
// =============================================================================

/// Position of a host within the installation
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct HostAddress {
    /// Cluster name
    pub cluster: String,
    /// Shard name
    pub shard: String,
    /// Replica name
    pub replica: String,
    /// Index of the cluster in the installation
    pub cluster_index: usize,
    /// Index of the shard in its cluster
    pub shard_index: usize,
    /// Index of the replica in its shard
    pub replica_index: usize,
}

/// Port numbers assigned to a host
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HostPorts {
    /// Native protocol port
    pub tcp: i32,
    /// HTTP port
    pub http: i32,
    /// Inter-server replication port
    pub interserver: i32,
}

impl Default for HostPorts {
    fn default() -> Self {
        Self {
            tcp: DEFAULT_TCP_PORT,
            http: DEFAULT_HTTP_PORT,
            interserver: DEFAULT_INTERSERVER_PORT,
        }
    }
}

/// One ClickHouse host, run as its own single-replica StatefulSet
#[derive(Clone, Debug, PartialEq)]
pub struct Host {
    /// Position in the installation
    pub address: HostAddress,
    /// Assigned ports
    pub ports: HostPorts,
    /// Effective template references
    pub templates: TemplateRefs,
}

/// Normalized shard
#[derive(Clone, Debug, PartialEq)]
pub struct Shard {
    /// Name of the owning cluster
    pub cluster: String,
    /// Shard name
    pub name: String,
    /// Index in the cluster
    pub index: usize,
    /// Effective template references
    pub templates: TemplateRefs,
    /// Hosts of this shard
    pub hosts: Vec<Host>,
}

/// Normalized cluster
#[derive(Clone, Debug, PartialEq)]
pub struct Cluster {
    /// Cluster name
    pub name: String,
    /// Index in the installation
    pub index: usize,
    /// Effective template references
    pub templates: TemplateRefs,
    /// Shards of this cluster
    pub shards: Vec<Shard>,
}

/// Immutable snapshot of an installation for one synthesis pass
#[derive(Clone, Debug, PartialEq)]
pub struct NormalizedInstallation {
    /// Installation name
    pub name: String,
    /// Installation namespace
    pub namespace: String,
    /// The installation's own labels
    pub labels: BTreeMap<String, String>,
    /// The installation's own annotations
    pub annotations: BTreeMap<String, String>,
    /// Whether every host is scaled to zero
    pub stop: bool,
    /// Installation-level template references
    pub templates: TemplateRefs,
    /// Shared templates
    pub catalog: Templates,
    /// Clusters in declaration order
    pub clusters: Vec<Cluster>,
}

impl NormalizedInstallation {
    /// Every host of every cluster, in declaration order
    pub fn hosts(&self) -> impl Iterator<Item = &Host> {
        self.shards().flat_map(|shard| shard.hosts.iter())
    }

    /// Every shard of every cluster, in declaration order
    pub fn shards(&self) -> impl Iterator<Item = &Shard> {
        self.clusters.iter().flat_map(|cluster| cluster.shards.iter())
    }

    /// Find a host by cluster, shard and replica name
    pub fn host(&self, cluster: &str, shard: &str, replica: &str) -> Option<&Host> {
        self.hosts().find(|h| {
            h.address.cluster == cluster && h.address.shard == shard && h.address.replica == replica
        })
    }
}

// =============================================================================
// Normalization
// =============================================================================

fn name_or_index(name: Option<&str>, index: usize) -> String {
    match name {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => index.to_string(),
    }
}

/// Build the per-pass snapshot of `chi`.
///
/// Fails only when the installation has no name; every other irregularity
/// is defaulted or reported to `sink`. A cluster, shard or host whose object
/// names repeat an earlier one is dropped, as is a shard or cluster left
/// without hosts, so every synthesized object name is unique.
pub fn normalize(
    chi: &ClickHouseInstallation,
    sink: &dyn WarningSink,
) -> Result<NormalizedInstallation> {
    let name = chi
        .metadata
        .name
        .clone()
        .filter(|n| !n.is_empty())
        .ok_or_else(|| {
            Error::validation_for_field(
                "ClickHouseInstallation",
                "metadata.name",
                "installation has no name",
            )
        })?;
    let namespace = chi.metadata.namespace.clone().unwrap_or_default();
    let spec = &chi.spec;
    let defaults = spec.defaults.templates.inherit(&TemplateRefs::default());

    let mut seen_clusters = HashSet::new();
    let mut seen_shards = HashSet::new();
    let mut seen = HashSet::new();
    let mut clusters = Vec::with_capacity(spec.configuration.clusters.len());

    for (cluster_index, cluster_spec) in spec.configuration.clusters.iter().enumerate() {
        let cluster_name = name_or_index(Some(cluster_spec.name.as_str()), cluster_index);
        if !seen_clusters.insert(cluster_name.clone()) {
            sink.warn(SynthesisWarning::conflict("cluster name", cluster_name, &name));
            continue;
        }
        let cluster_templates = cluster_spec.templates.inherit(&defaults);

        let shard_specs = if cluster_spec.layout.shards.is_empty() {
            vec![Default::default()]
        } else {
            cluster_spec.layout.shards.clone()
        };

        let mut shards = Vec::with_capacity(shard_specs.len());
        for (shard_index, shard_spec) in shard_specs.iter().enumerate() {
            let shard_name = name_or_index(shard_spec.name.as_deref(), shard_index);
            let service_name = naming::shard_service_name(&name, &cluster_name, &shard_name);
            if !seen_shards.insert(service_name.clone()) {
                sink.warn(SynthesisWarning::conflict("shard name", service_name, &cluster_name));
                continue;
            }
            let shard_templates = shard_spec.templates.inherit(&cluster_templates);

            let replica_specs = if shard_spec.replicas.is_empty() {
                vec![Default::default()]
            } else {
                shard_spec.replicas.clone()
            };

            let mut hosts = Vec::with_capacity(replica_specs.len());
            for (replica_index, replica_spec) in replica_specs.iter().enumerate() {
                let address = HostAddress {
                    cluster: cluster_name.clone(),
                    shard: shard_name.clone(),
                    replica: name_or_index(replica_spec.name.as_deref(), replica_index),
                    cluster_index,
                    shard_index,
                    replica_index,
                };

                let sts_name = naming::stateful_set_name(&name, &address);
                if !seen.insert(sts_name.clone()) {
                    sink.warn(SynthesisWarning::conflict("host name", sts_name, &name));
                    continue;
                }

                let defaults = HostPorts::default();
                hosts.push(Host {
                    address,
                    ports: HostPorts {
                        tcp: replica_spec.tcp_port.unwrap_or(defaults.tcp),
                        http: replica_spec.http_port.unwrap_or(defaults.http),
                        interserver: replica_spec
                            .interserver_http_port
                            .unwrap_or(defaults.interserver),
                    },
                    templates: replica_spec.templates.inherit(&shard_templates),
                });
            }

            if hosts.is_empty() {
                debug!(cluster = %cluster_name, shard = %shard_name, "Dropping shard without hosts");
                continue;
            }

            shards.push(Shard {
                cluster: cluster_name.clone(),
                name: shard_name,
                index: shard_index,
                templates: shard_templates,
                hosts,
            });
        }

        if shards.is_empty() {
            debug!(cluster = %cluster_name, "Dropping cluster without shards");
            continue;
        }

        clusters.push(Cluster {
            name: cluster_name,
            index: cluster_index,
            templates: cluster_templates,
            shards,
        });
    }

    debug!(chi = %name, hosts = seen.len(), "Normalized installation");

    Ok(NormalizedInstallation {
        name,
        namespace,
        labels: chi.metadata.labels.clone().unwrap_or_default(),
        annotations: chi.metadata.annotations.clone().unwrap_or_default(),
        stop: spec.stop,
        templates: defaults,
        catalog: spec.templates.clone(),
        clusters,
    })
}
