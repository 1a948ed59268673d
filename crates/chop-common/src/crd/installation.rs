//! ClickHouseInstallation CRD
//!
//! The desired-state descriptor: clusters of shards of replicas (hosts) plus
//! the templates they reference. The operator treats it as read-only.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::templates::{TemplateRefs, Templates};

/// ClickHouseInstallation describes one or more ClickHouse clusters.
///
/// Example:
/// ```yaml
/// apiVersion: chop.dev/v1
/// kind: ClickHouseInstallation
/// metadata:
///   name: demo
///   namespace: olap
/// spec:
///   defaults:
///     templates:
///       dataVolumeClaimTemplate: data
///   configuration:
///     clusters:
///       - name: events
///         layout:
///           shards:
///             - replicas: [{}, {}]
///   templates:
///     volumeClaimTemplates:
///       - name: data
///         spec:
///           accessModes: [ReadWriteOnce]
///           resources:
///             requests:
///               storage: 100Gi
/// ```
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "chop.dev",
    version = "v1",
    kind = "ClickHouseInstallation",
    plural = "clickhouseinstallations",
    shortname = "chi",
    namespaced,
    printcolumn = r#"{"name":"Stopped","type":"boolean","jsonPath":".spec.stop"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ClickHouseInstallationSpec {
    /// Scale every host to zero replicas while keeping its storage
    #[serde(default)]
    pub stop: bool,

    /// Installation-wide defaults
    #[serde(default)]
    pub defaults: Defaults,

    /// Cluster layout
    #[serde(default)]
    pub configuration: Configuration,

    /// Reusable templates
    #[serde(default)]
    pub templates: Templates,
}

/// Installation-wide defaults
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Defaults {
    /// Template references inherited by every cluster
    #[serde(default)]
    pub templates: TemplateRefs,
}

/// Cluster configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    /// Clusters in declaration order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clusters: Vec<ClusterSpec>,
}

/// One ClickHouse cluster
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    /// Cluster name; the cluster index is used when empty
    #[serde(default)]
    pub name: String,

    /// Template references inherited by the cluster's shards
    #[serde(default)]
    pub templates: TemplateRefs,

    /// Shard layout
    #[serde(default)]
    pub layout: ClusterLayout,
}

/// Shard layout of a cluster
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterLayout {
    /// Shards in declaration order; an empty list means one shard
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub shards: Vec<ShardSpec>,
}

/// One shard
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ShardSpec {
    /// Shard name; the shard index is used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Template references inherited by the shard's replicas
    #[serde(default)]
    pub templates: TemplateRefs,

    /// Replicas in declaration order; an empty list means one replica
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub replicas: Vec<ReplicaSpec>,
}

/// One replica of a shard, run as a single ClickHouse host
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReplicaSpec {
    /// Replica name; the replica index is used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Host-level template references
    #[serde(default)]
    pub templates: TemplateRefs,

    /// Native protocol port
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tcp_port: Option<i32>,

    /// HTTP port
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_port: Option<i32>,

    /// Inter-server replication port
    #[serde(
        rename = "interserverHTTPPort",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub interserver_http_port: Option<i32>,
}
