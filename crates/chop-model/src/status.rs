//! Rollout and readiness checks over live objects
//!
//! The caller fetches live StatefulSets and Pods and passes them in. An
//! absent object is never settled and never ready, and it is not "not
//! ready" either: the caller has to decide what a missing object means.

use std::collections::BTreeMap;

use chop_common::{merge_maps, MergePolicy, LABEL_OBJECT_VERSION};
use k8s_openapi::api::apps::v1::{StatefulSet, StatefulSetStatus};
use k8s_openapi::api::core::v1::{ContainerStatus, PersistentVolume, Pod};

use crate::labels::{operator_labels, Scope};
use crate::normalize::{Host, NormalizedInstallation};
use crate::pipeline::containers::lookup_container;

fn desired_replicas(sts: &StatefulSet) -> Option<i32> {
    sts.spec.as_ref().and_then(|spec| spec.replicas)
}

/// Whether `sts` carries spec generation `generation` and has fully rolled
/// it out: observed, every replica current and updated, and the current
/// revision equal to the update revision.
pub fn is_generation_settled(sts: Option<&StatefulSet>, generation: i64) -> bool {
    let Some(sts) = sts else {
        return false;
    };
    let Some(desired) = desired_replicas(sts) else {
        return false;
    };
    let default = StatefulSetStatus::default();
    let status = sts.status.as_ref().unwrap_or(&default);
    let object_generation = sts.metadata.generation.unwrap_or_default();

    object_generation == generation
        && status.observed_generation.unwrap_or_default() == object_generation
        && status.current_replicas.unwrap_or_default() == desired
        && status.updated_replicas.unwrap_or_default() == desired
        && status.current_revision.as_deref().unwrap_or_default()
            == status.update_revision.as_deref().unwrap_or_default()
}

/// Whether every desired replica of `sts` is ready
pub fn is_ready(sts: Option<&StatefulSet>) -> bool {
    let Some(sts) = sts else {
        return false;
    };
    let Some(desired) = desired_replicas(sts) else {
        return false;
    };
    let ready = sts
        .status
        .as_ref()
        .and_then(|s| s.ready_replicas)
        .unwrap_or_default();
    ready == desired
}

/// Whether `sts` exists and is not ready
pub fn is_not_ready(sts: Option<&StatefulSet>) -> bool {
    match sts {
        Some(_) => !is_ready(sts),
        None => false,
    }
}

/// One-line rendering of a StatefulSet status for logs and events
pub fn status_summary(status: &StatefulSetStatus) -> String {
    format!(
        "ObservedGeneration:{} Replicas:{} ReadyReplicas:{} CurrentReplicas:{} UpdatedReplicas:{} CurrentRevision:{} UpdateRevision:{}",
        status.observed_generation.unwrap_or_default(),
        status.replicas,
        status.ready_replicas.unwrap_or_default(),
        status.current_replicas.unwrap_or_default(),
        status.updated_replicas.unwrap_or_default(),
        status.current_revision.as_deref().unwrap_or_default(),
        status.update_revision.as_deref().unwrap_or_default(),
    )
}

/// Fingerprint stamped on a synthesized StatefulSet
pub fn object_version(sts: Option<&chop_common::k8s::StatefulSet>) -> Option<&str> {
    sts?.metadata
        .labels
        .get(LABEL_OBJECT_VERSION)
        .map(String::as_str)
}

/// Fingerprint carried by a live StatefulSet
pub fn live_object_version(sts: Option<&StatefulSet>) -> Option<&str> {
    sts?.metadata
        .labels
        .as_ref()?
        .get(LABEL_OBJECT_VERSION)
        .map(String::as_str)
}

/// Live status of the pod's ClickHouse container
pub fn primary_container_status(pod: &Pod) -> Option<&ContainerStatus> {
    let statuses = pod.status.as_ref()?.container_statuses.as_ref()?;
    let index = lookup_container(statuses.iter().map(|s| s.name.as_str())).index()?;
    statuses.get(index)
}

/// Label a live PersistentVolume as belonging to `host`.
///
/// Host labels overwrite labels of the same key already on the volume.
pub fn prepare_persistent_volume(
    pv: &mut PersistentVolume,
    chi: &NormalizedInstallation,
    host: &Host,
) {
    let labels = pv.metadata.labels.get_or_insert_with(BTreeMap::new);
    merge_maps(
        labels,
        &operator_labels(chi, Scope::Host(host)),
        MergePolicy::Overwrite,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::apps::v1::StatefulSetSpec;
    use k8s_openapi::api::core::v1::PodStatus;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    struct Rollout {
        desired: Option<i32>,
        generation: i64,
        observed: i64,
        current: i32,
        updated: i32,
        ready: i32,
        current_revision: &'static str,
        update_revision: &'static str,
    }

    impl Default for Rollout {
        fn default() -> Self {
            Self {
                desired: Some(3),
                generation: 4,
                observed: 4,
                current: 3,
                updated: 3,
                ready: 3,
                current_revision: "rev-2",
                update_revision: "rev-2",
            }
        }
    }

    fn live(r: Rollout) -> StatefulSet {
        StatefulSet {
            metadata: ObjectMeta {
                name: Some("chi-demo-events-0-0".to_string()),
                generation: Some(r.generation),
                ..Default::default()
            },
            spec: Some(StatefulSetSpec {
                replicas: r.desired,
                ..Default::default()
            }),
            status: Some(StatefulSetStatus {
                observed_generation: Some(r.observed),
                replicas: r.current,
                ready_replicas: Some(r.ready),
                current_replicas: Some(r.current),
                updated_replicas: Some(r.updated),
                current_revision: Some(r.current_revision.to_string()),
                update_revision: Some(r.update_revision.to_string()),
                ..Default::default()
            }),
        }
    }

    // =========================================================================
    // Generation
    // =========================================================================

    #[test]
    fn test_settled_when_fully_rolled_out() {
        assert!(is_generation_settled(Some(&live(Rollout::default())), 4));
    }

    #[test]
    fn test_not_settled_while_updating() {
        let sts = live(Rollout {
            updated: 2,
            ..Default::default()
        });
        assert!(!is_generation_settled(Some(&sts), 4));

        let sts = live(Rollout {
            update_revision: "rev-3",
            ..Default::default()
        });
        assert!(!is_generation_settled(Some(&sts), 4));

        let sts = live(Rollout {
            observed: 3,
            ..Default::default()
        });
        assert!(!is_generation_settled(Some(&sts), 4));
    }

    #[test]
    fn test_not_settled_for_other_generation() {
        assert!(!is_generation_settled(Some(&live(Rollout::default())), 5));
    }

    #[test]
    fn test_absent_object_not_settled() {
        assert!(!is_generation_settled(None, 4));
        let sts = live(Rollout {
            desired: None,
            ..Default::default()
        });
        assert!(!is_generation_settled(Some(&sts), 4));
    }

    // =========================================================================
    // Readiness
    // =========================================================================

    #[test]
    fn test_ready_and_not_ready() {
        let ready = live(Rollout::default());
        assert!(is_ready(Some(&ready)));
        assert!(!is_not_ready(Some(&ready)));

        let starting = live(Rollout {
            ready: 1,
            ..Default::default()
        });
        assert!(!is_ready(Some(&starting)));
        assert!(is_not_ready(Some(&starting)));
    }

    #[test]
    fn test_absent_object_neither_ready_nor_not_ready() {
        assert!(!is_ready(None));
        assert!(!is_not_ready(None));
    }

    #[test]
    fn test_missing_desired_replicas_is_not_ready() {
        let sts = live(Rollout {
            desired: None,
            ..Default::default()
        });
        assert!(!is_ready(Some(&sts)));
        assert!(is_not_ready(Some(&sts)));
    }

    #[test]
    fn test_status_summary() {
        let sts = live(Rollout::default());
        let summary = status_summary(sts.status.as_ref().unwrap());
        assert_eq!(
            summary,
            "ObservedGeneration:4 Replicas:3 ReadyReplicas:3 CurrentReplicas:3 UpdatedReplicas:3 CurrentRevision:rev-2 UpdateRevision:rev-2"
        );
    }

    // =========================================================================
    // Versions, pods and volumes
    // =========================================================================

    #[test]
    fn test_live_object_version() {
        let mut sts = live(Rollout::default());
        assert_eq!(live_object_version(Some(&sts)), None);
        sts.metadata.labels = Some(BTreeMap::from([(
            LABEL_OBJECT_VERSION.to_string(),
            "abc".to_string(),
        )]));
        assert_eq!(live_object_version(Some(&sts)), Some("abc"));
        assert_eq!(live_object_version(None), None);
    }

    fn pod(names: &[&str]) -> Pod {
        Pod {
            status: Some(PodStatus {
                container_statuses: Some(
                    names
                        .iter()
                        .map(|n| ContainerStatus {
                            name: n.to_string(),
                            ..Default::default()
                        })
                        .collect(),
                ),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_primary_container_status_lookup() {
        let p = pod(&["clickhouse-log", "clickhouse"]);
        assert_eq!(primary_container_status(&p).map(|s| s.name.as_str()), Some("clickhouse"));

        let p = pod(&["server"]);
        assert_eq!(primary_container_status(&p).map(|s| s.name.as_str()), Some("server"));

        assert!(primary_container_status(&pod(&[])).is_none());
        assert!(primary_container_status(&Pod::default()).is_none());
    }

    #[test]
    fn test_prepare_persistent_volume_overwrites_host_labels() {
        use crate::normalize::{HostAddress, HostPorts};
        use chop_common::crd::{TemplateRefs, Templates};
        use chop_common::LABEL_REPLICA;

        let chi = NormalizedInstallation {
            name: "demo".to_string(),
            namespace: "olap".to_string(),
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
            stop: false,
            templates: TemplateRefs::default(),
            catalog: Templates::default(),
            clusters: vec![],
        };
        let host = Host {
            address: HostAddress {
                cluster: "events".to_string(),
                shard: "0".to_string(),
                replica: "1".to_string(),
                cluster_index: 0,
                shard_index: 0,
                replica_index: 1,
            },
            ports: HostPorts::default(),
            templates: TemplateRefs::default(),
        };

        let mut pv = PersistentVolume::default();
        pv.metadata.labels = Some(BTreeMap::from([
            (LABEL_REPLICA.to_string(), "stale".to_string()),
            ("disk".to_string(), "ssd".to_string()),
        ]));
        prepare_persistent_volume(&mut pv, &chi, &host);

        let labels = pv.metadata.labels.unwrap();
        assert_eq!(labels[LABEL_REPLICA], "1");
        assert_eq!(labels["disk"], "ssd");
    }
}
