//! Reusable templates owned by a ClickHouseInstallation
//!
//! Templates are shared by every host that references them. Lookups hand out
//! borrows; anything that mutates a template must clone it first.

use schemars::gen::SchemaGenerator;
use schemars::schema::{InstanceType, Schema, SchemaObject};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::k8s::{PersistentVolumeClaimSpec, PodSpec, ServiceSpec};
use crate::kube_utils::ObjectMeta;

/// Schema for embedded Kubernetes specs.
///
/// Only a subset of each spec is modelled; the API server must keep every
/// other field the user writes so it reaches the synthesized objects.
fn preserve_unknown_fields(_gen: &mut SchemaGenerator) -> Schema {
    let mut schema = SchemaObject {
        instance_type: Some(InstanceType::Object.into()),
        ..Default::default()
    };
    schema.extensions.insert(
        "x-kubernetes-preserve-unknown-fields".to_string(),
        serde_json::Value::Bool(true),
    );
    Schema::Object(schema)
}

// =============================================================================
// Template references
// =============================================================================

/// Named template references declared at any level of the layout.
///
/// References are inherited downward (installation defaults, cluster, shard,
/// host); the most specific level that declares a reference wins.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TemplateRefs {
    /// Pod template for ClickHouse hosts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_template: Option<String>,
    /// Volume claim template mounted at the data path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_volume_claim_template: Option<String>,
    /// Volume claim template mounted at the log path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_volume_claim_template: Option<String>,
    /// Service template for the installation-wide endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_template: Option<String>,
    /// Service template for per-cluster endpoints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_service_template: Option<String>,
    /// Service template for per-shard endpoints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shard_service_template: Option<String>,
    /// Service template for per-host endpoints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replica_service_template: Option<String>,
}

impl TemplateRefs {
    /// Fill every reference this level leaves undeclared from `parent`.
    ///
    /// Empty names count as undeclared.
    pub fn inherit(&self, parent: &TemplateRefs) -> TemplateRefs {
        fn pick(own: &Option<String>, parent: &Option<String>) -> Option<String> {
            own.as_ref()
                .filter(|name| !name.is_empty())
                .or(parent.as_ref().filter(|name| !name.is_empty()))
                .cloned()
        }

        TemplateRefs {
            pod_template: pick(&self.pod_template, &parent.pod_template),
            data_volume_claim_template: pick(
                &self.data_volume_claim_template,
                &parent.data_volume_claim_template,
            ),
            log_volume_claim_template: pick(
                &self.log_volume_claim_template,
                &parent.log_volume_claim_template,
            ),
            service_template: pick(&self.service_template, &parent.service_template),
            cluster_service_template: pick(
                &self.cluster_service_template,
                &parent.cluster_service_template,
            ),
            shard_service_template: pick(
                &self.shard_service_template,
                &parent.shard_service_template,
            ),
            replica_service_template: pick(
                &self.replica_service_template,
                &parent.replica_service_template,
            ),
        }
    }
}

// =============================================================================
// Pod templates
// =============================================================================

/// Kind of spreading rule applied to pods built from a template
#[derive(Clone, Copy, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum PodDistributionType {
    /// At most one ClickHouse pod of the installation per topology domain
    ClickHouseAntiAffinity,
    /// At most one pod of the same shard per topology domain
    ShardAntiAffinity,
    /// At most one pod with the same replica position per topology domain
    ReplicaAntiAffinity,
}

/// One spreading rule
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PodDistribution {
    /// Rule kind
    #[serde(rename = "type")]
    pub type_: PodDistributionType,
    /// Topology key; defaults to the node hostname
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topology_key: Option<String>,
}

/// Named pod template for ClickHouse hosts
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PodTemplate {
    /// Template name referenced by `podTemplate`
    pub name: String,
    /// Labels and annotations for pods built from this template
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Spreading rules translated into pod anti-affinity
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pod_distribution: Vec<PodDistribution>,
    /// Pod spec
    #[serde(default)]
    #[schemars(schema_with = "preserve_unknown_fields")]
    pub spec: PodSpec,
}

// =============================================================================
// Volume claim templates
// =============================================================================

/// Named persistent volume claim template
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VolumeClaimTemplate {
    /// Template name; also the claim and volume name inside the StatefulSet
    pub name: String,
    /// Extra labels and annotations for the claim
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Claim spec
    #[serde(default)]
    #[schemars(schema_with = "preserve_unknown_fields")]
    pub spec: PersistentVolumeClaimSpec,
}

// =============================================================================
// Service templates
// =============================================================================

/// Named Service template
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceTemplate {
    /// Template name
    pub name: String,
    /// Labels and annotations; name and namespace are always replaced
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Service spec
    #[serde(default)]
    #[schemars(schema_with = "preserve_unknown_fields")]
    pub spec: ServiceSpec,
}

// =============================================================================
// Template collection
// =============================================================================

/// All templates declared by an installation
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Templates {
    /// Pod templates
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pod_templates: Vec<PodTemplate>,
    /// Volume claim templates
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volume_claim_templates: Vec<VolumeClaimTemplate>,
    /// Service templates
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service_templates: Vec<ServiceTemplate>,
}

impl Templates {
    /// Find a pod template by name
    pub fn pod_template(&self, name: &str) -> Option<&PodTemplate> {
        self.pod_templates.iter().find(|t| t.name == name)
    }

    /// Find a volume claim template by name
    pub fn volume_claim_template(&self, name: &str) -> Option<&VolumeClaimTemplate> {
        self.volume_claim_templates.iter().find(|t| t.name == name)
    }

    /// Find a Service template by name
    pub fn service_template(&self, name: &str) -> Option<&ServiceTemplate> {
        self.service_templates.iter().find(|t| t.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refs(pod: Option<&str>, data: Option<&str>) -> TemplateRefs {
        TemplateRefs {
            pod_template: pod.map(String::from),
            data_volume_claim_template: data.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn most_specific_reference_wins() {
        let parent = refs(Some("default-pod"), Some("default-data"));
        let own = refs(Some("custom-pod"), None);
        let effective = own.inherit(&parent);
        assert_eq!(effective.pod_template.as_deref(), Some("custom-pod"));
        assert_eq!(
            effective.data_volume_claim_template.as_deref(),
            Some("default-data")
        );
    }

    #[test]
    fn empty_reference_counts_as_undeclared() {
        let parent = refs(Some("default-pod"), None);
        let own = refs(Some(""), None);
        assert_eq!(
            own.inherit(&parent).pod_template.as_deref(),
            Some("default-pod")
        );
        assert_eq!(refs(Some(""), None).inherit(&refs(None, None)).pod_template, None);
    }

    #[test]
    fn lookup_by_name() {
        let templates = Templates {
            volume_claim_templates: vec![VolumeClaimTemplate {
                name: "data".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };
        assert!(templates.volume_claim_template("data").is_some());
        assert!(templates.volume_claim_template("log").is_none());
        assert!(templates.pod_template("data").is_none());
    }

    #[test]
    fn pod_distribution_deserializes() {
        let template: PodTemplate = serde_json::from_str(
            r#"{
                "name": "spread",
                "podDistribution": [
                    {"type": "ShardAntiAffinity"},
                    {"type": "ClickHouseAntiAffinity", "topologyKey": "topology.kubernetes.io/zone"}
                ],
                "spec": {"containers": [{"name": "clickhouse", "image": "clickhouse/clickhouse-server:24.3"}]}
            }"#,
        )
        .unwrap();
        assert_eq!(template.pod_distribution.len(), 2);
        assert_eq!(
            template.pod_distribution[0].type_,
            PodDistributionType::ShardAntiAffinity
        );
        assert_eq!(
            template.pod_distribution[1].topology_key.as_deref(),
            Some("topology.kubernetes.io/zone")
        );
        assert_eq!(template.spec.containers[0].name, "clickhouse");
    }

    #[test]
    fn unmodelled_pod_fields_survive_round_trip() {
        let source = serde_json::json!({
            "name": "secure",
            "spec": {
                "securityContext": {"fsGroup": 101, "runAsUser": 101},
                "priorityClassName": "olap-critical",
                "containers": [{
                    "name": "clickhouse",
                    "image": "clickhouse/clickhouse-server:24.3",
                    "env": [{
                        "name": "CLICKHOUSE_PASSWORD",
                        "valueFrom": {"secretKeyRef": {"name": "ch-auth", "key": "password"}}
                    }],
                    "startupProbe": {"httpGet": {"path": "/ping", "port": "http"}},
                    "volumeMounts": [{"name": "certs", "mountPath": "/etc/certs", "mountPropagation": "None"}]
                }],
                "volumes": [{"name": "certs", "secret": {"secretName": "ch-tls"}}],
                "affinity": {
                    "nodeAffinity": {"requiredDuringSchedulingIgnoredDuringExecution": {
                        "nodeSelectorTerms": [{"matchExpressions": [
                            {"key": "pool", "operator": "In", "values": ["olap"]}
                        ]}]
                    }}
                }
            }
        });
        let template: PodTemplate = serde_json::from_value(source.clone()).unwrap();
        let container = &template.spec.containers[0];
        assert_eq!(container.env[0].value, None);
        assert!(container.extra.contains_key("startupProbe"));
        assert!(template.spec.volumes[0].extra.contains_key("secret"));

        let out = serde_json::to_value(&template).unwrap();
        assert_eq!(out["spec"], source["spec"]);
    }

    #[test]
    fn unmodelled_claim_and_service_fields_survive_round_trip() {
        let claim = serde_json::json!({
            "accessModes": ["ReadWriteOnce"],
            "resources": {"requests": {"storage": "100Gi"}},
            "selector": {"matchLabels": {"disk": "nvme"}},
            "dataSource": {"kind": "VolumeSnapshot", "name": "nightly"}
        });
        let parsed: PersistentVolumeClaimSpec = serde_json::from_value(claim.clone()).unwrap();
        assert_eq!(serde_json::to_value(&parsed).unwrap(), claim);

        let service = serde_json::json!({
            "type": "LoadBalancer",
            "sessionAffinity": "ClientIP",
            "loadBalancerSourceRanges": ["10.0.0.0/8"],
            "ports": [{"name": "http", "port": 8123, "appProtocol": "http"}]
        });
        let parsed: ServiceSpec = serde_json::from_value(service.clone()).unwrap();
        assert_eq!(serde_json::to_value(&parsed).unwrap(), service);
    }
}
