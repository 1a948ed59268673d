//! StatefulSet content fingerprint
//!
//! The fingerprint is the reconciler's only drift signal, so it must not
//! depend on the order in which volumes, mounts, ports or claims were
//! added. It is computed over a canonical copy with those lists sorted and
//! the fingerprint label itself removed.

use chop_common::k8s::{Container, StatefulSet};
use chop_common::kube_utils::sha256_hex;
use chop_common::{Result, LABEL_OBJECT_VERSION};

/// Hex characters kept from the digest; fits a label value
pub const FINGERPRINT_LEN: usize = 40;

fn canonical_container(container: &mut Container) {
    container
        .volume_mounts
        .sort_by(|a, b| a.mount_path.cmp(&b.mount_path).then_with(|| a.name.cmp(&b.name)));
    container.ports.sort_by(|a, b| {
        a.name
            .cmp(&b.name)
            .then_with(|| a.container_port.cmp(&b.container_port))
    });
}

fn canonical(sts: &StatefulSet) -> StatefulSet {
    let mut sts = sts.clone();
    sts.metadata.labels.remove(LABEL_OBJECT_VERSION);

    let pod = &mut sts.spec.template.spec;
    pod.volumes.sort_by(|a, b| a.name.cmp(&b.name));
    pod.containers.iter_mut().for_each(canonical_container);
    pod.init_containers.iter_mut().for_each(canonical_container);

    sts.spec
        .volume_claim_templates
        .sort_by(|a, b| a.metadata.name.cmp(&b.metadata.name));
    sts
}

/// Content digest of `sts`, ignoring any fingerprint it already carries
pub fn fingerprint(sts: &StatefulSet) -> Result<String> {
    let bytes = serde_json::to_vec(&canonical(sts))?;
    Ok(sha256_hex(&bytes, FINGERPRINT_LEN))
}

/// Set the fingerprint label on `sts`
pub fn stamp(sts: &mut StatefulSet) -> Result<()> {
    let version = fingerprint(sts)?;
    sts.metadata
        .labels
        .insert(LABEL_OBJECT_VERSION.to_string(), version);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chop_common::k8s::{
        ContainerPort, LabelSelector, PodSpec, PodTemplateSpec, StatefulSetSpec,
        StatefulSetUpdateStrategy, Volume, VolumeMount,
    };
    use chop_common::kube_utils::{HasApiResource, ObjectMeta};

    fn sts(volumes: &[&str], mounts: &[(&str, &str)]) -> StatefulSet {
        StatefulSet {
            api_version: StatefulSet::API_VERSION.to_string(),
            kind: StatefulSet::KIND.to_string(),
            metadata: ObjectMeta::new("chi-demo-events-0-0", "olap"),
            spec: StatefulSetSpec {
                replicas: 1,
                service_name: "chi-demo-events-0-0".to_string(),
                selector: LabelSelector::default(),
                template: PodTemplateSpec {
                    spec: PodSpec {
                        containers: vec![Container {
                            name: "clickhouse".to_string(),
                            volume_mounts: mounts
                                .iter()
                                .map(|(n, p)| VolumeMount::new(*n, *p))
                                .collect(),
                            ports: vec![
                                ContainerPort::named("tcp", 9000),
                                ContainerPort::named("http", 8123),
                            ],
                            ..Default::default()
                        }],
                        volumes: volumes
                            .iter()
                            .map(|n| Volume::from_config_map(*n, None))
                            .collect(),
                        ..Default::default()
                    },
                    ..Default::default()
                },
                volume_claim_templates: vec![],
                pod_management_policy: "OrderedReady".to_string(),
                update_strategy: StatefulSetUpdateStrategy {
                    type_: "RollingUpdate".to_string(),
                },
                revision_history_limit: 10,
            },
        }
    }

    #[test]
    fn test_order_independent() {
        let a = sts(&["a", "b"], &[("a", "/a"), ("b", "/b")]);
        let mut b = sts(&["b", "a"], &[("b", "/b"), ("a", "/a")]);
        b.spec.template.spec.containers[0].ports.reverse();
        assert_eq!(fingerprint(&a).unwrap(), fingerprint(&b).unwrap());
    }

    #[test]
    fn test_content_sensitive() {
        let a = sts(&["a"], &[("a", "/a")]);
        let b = sts(&["a"], &[("a", "/other")]);
        assert_ne!(fingerprint(&a).unwrap(), fingerprint(&b).unwrap());
    }

    #[test]
    fn test_stamp_is_idempotent() {
        let mut s = sts(&["a"], &[]);
        stamp(&mut s).unwrap();
        let first = s.clone();
        stamp(&mut s).unwrap();
        assert_eq!(s, first);
        assert_eq!(s.metadata.labels[LABEL_OBJECT_VERSION].len(), FINGERPRINT_LEN);
    }
}
