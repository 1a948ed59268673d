//! Label and selector computation
//!
//! Labels identify what an object belongs to; selectors are the narrower
//! subset used to match pods. Both are pure functions of the installation
//! snapshot and a [`Scope`].

use std::collections::BTreeMap;

use chop_common::{
    LABEL_APP, LABEL_APP_VALUE, LABEL_CHI, LABEL_CLUSTER, LABEL_NAMESPACE, LABEL_READY,
    LABEL_READY_VALUE, LABEL_REPLICA, LABEL_SERVICE, LABEL_SHARD,
};

use crate::normalize::{Cluster, Host, NormalizedInstallation, Shard};

/// Part of the installation an object belongs to
#[derive(Clone, Copy, Debug)]
pub enum Scope<'a> {
    /// The whole installation
    Installation,
    /// One cluster
    Cluster(&'a Cluster),
    /// One shard
    Shard(&'a Shard),
    /// One host
    Host(&'a Host),
}

impl Scope<'_> {
    /// Value of the `chop.dev/Service` label for Services of this scope
    pub fn service_kind(&self) -> &'static str {
        match self {
            Scope::Installation => "chi",
            Scope::Cluster(_) => "cluster",
            Scope::Shard(_) => "shard",
            Scope::Host(_) => "host",
        }
    }

    fn position(&self) -> Vec<(&'static str, &str)> {
        match self {
            Scope::Installation => vec![],
            Scope::Cluster(cluster) => vec![(LABEL_CLUSTER, cluster.name.as_str())],
            Scope::Shard(shard) => vec![
                (LABEL_CLUSTER, shard.cluster.as_str()),
                (LABEL_SHARD, shard.name.as_str()),
            ],
            Scope::Host(host) => vec![
                (LABEL_CLUSTER, host.address.cluster.as_str()),
                (LABEL_SHARD, host.address.shard.as_str()),
                (LABEL_REPLICA, host.address.replica.as_str()),
            ],
        }
    }
}

/// Whether only ready pods should match
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Readiness {
    /// Every pod of the scope
    Any,
    /// Only pods carrying the ready label
    Ready,
}

fn insert_all(
    map: &mut BTreeMap<String, String>,
    pairs: impl IntoIterator<Item = (&'static str, impl Into<String>)>,
) {
    for (key, value) in pairs {
        map.insert(key.to_string(), value.into());
    }
}

/// Operator-owned labels of `scope`, without the installation's own labels
pub fn operator_labels(chi: &NormalizedInstallation, scope: Scope<'_>) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    insert_all(
        &mut labels,
        [
            (LABEL_APP, LABEL_APP_VALUE),
            (LABEL_NAMESPACE, chi.namespace.as_str()),
            (LABEL_CHI, chi.name.as_str()),
        ],
    );
    insert_all(&mut labels, scope.position());
    labels
}

/// Full label set of `scope`.
///
/// The installation's own labels are carried over; operator labels take
/// precedence over them on key collisions.
pub fn labels(
    chi: &NormalizedInstallation,
    scope: Scope<'_>,
    readiness: Readiness,
) -> BTreeMap<String, String> {
    let mut labels = chi.labels.clone();
    labels.extend(operator_labels(chi, scope));
    if readiness == Readiness::Ready {
        insert_all(&mut labels, [(LABEL_READY, LABEL_READY_VALUE)]);
    }
    labels
}

/// Labels of a Service exposing `scope`
pub fn service_labels(chi: &NormalizedInstallation, scope: Scope<'_>) -> BTreeMap<String, String> {
    let mut labels = labels(chi, scope, Readiness::Any);
    insert_all(&mut labels, [(LABEL_SERVICE, scope.service_kind())]);
    labels
}

/// Selector matching pods of `scope`.
///
/// Narrower than [`labels`]: no namespace and no installation labels, so
/// it keeps matching when those change.
pub fn selector(
    chi: &NormalizedInstallation,
    scope: Scope<'_>,
    readiness: Readiness,
) -> BTreeMap<String, String> {
    let mut selector = BTreeMap::new();
    insert_all(
        &mut selector,
        [(LABEL_APP, LABEL_APP_VALUE), (LABEL_CHI, chi.name.as_str())],
    );
    insert_all(&mut selector, scope.position());
    if readiness == Readiness::Ready {
        insert_all(&mut selector, [(LABEL_READY, LABEL_READY_VALUE)]);
    }
    selector
}

/// Annotations of `scope`
pub fn annotations(chi: &NormalizedInstallation, _scope: Scope<'_>) -> BTreeMap<String, String> {
    chi.annotations.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::{HostAddress, HostPorts};
    use chop_common::crd::{TemplateRefs, Templates};

    fn host() -> Host {
        Host {
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
        }
    }

    fn chi() -> NormalizedInstallation {
        NormalizedInstallation {
            name: "demo".to_string(),
            namespace: "olap".to_string(),
            labels: BTreeMap::from([
                ("team".to_string(), "analytics".to_string()),
                (LABEL_APP.to_string(), "spoofed".to_string()),
            ]),
            annotations: BTreeMap::from([("owner".to_string(), "data".to_string())]),
            stop: false,
            templates: TemplateRefs::default(),
            catalog: Templates::default(),
            clusters: vec![],
        }
    }

    #[test]
    fn test_host_labels_carry_position_and_installation_labels() {
        let chi = chi();
        let host = host();
        let labels = labels(&chi, Scope::Host(&host), Readiness::Any);
        assert_eq!(labels[LABEL_APP], LABEL_APP_VALUE);
        assert_eq!(labels[LABEL_NAMESPACE], "olap");
        assert_eq!(labels[LABEL_CHI], "demo");
        assert_eq!(labels[LABEL_CLUSTER], "events");
        assert_eq!(labels[LABEL_SHARD], "0");
        assert_eq!(labels[LABEL_REPLICA], "1");
        assert_eq!(labels["team"], "analytics");
        assert!(!labels.contains_key(LABEL_READY));
    }

    #[test]
    fn test_ready_scope_adds_ready_label() {
        let chi = chi();
        let ready = labels(&chi, Scope::Installation, Readiness::Ready);
        assert_eq!(ready[LABEL_READY], LABEL_READY_VALUE);
        let sel = selector(&chi, Scope::Installation, Readiness::Ready);
        assert_eq!(sel[LABEL_READY], LABEL_READY_VALUE);
    }

    #[test]
    fn test_selector_is_narrower_than_labels() {
        let chi = chi();
        let host = host();
        let sel = selector(&chi, Scope::Host(&host), Readiness::Any);
        assert_eq!(sel.len(), 5);
        assert!(!sel.contains_key(LABEL_NAMESPACE));
        assert!(!sel.contains_key("team"));

        let labels = labels(&chi, Scope::Host(&host), Readiness::Any);
        assert!(sel.iter().all(|(k, v)| labels.get(k) == Some(v)));
    }

    #[test]
    fn test_service_labels_name_the_scope() {
        let chi = chi();
        let shard = Shard {
            cluster: "events".to_string(),
            name: "2".to_string(),
            index: 2,
            templates: TemplateRefs::default(),
            hosts: vec![],
        };
        let labels = service_labels(&chi, Scope::Shard(&shard));
        assert_eq!(labels[LABEL_SERVICE], "shard");
        assert_eq!(labels[LABEL_SHARD], "2");
        assert!(!labels.contains_key(LABEL_REPLICA));
    }

    #[test]
    fn test_operator_labels_skip_installation_labels() {
        let chi = chi();
        let labels = operator_labels(&chi, Scope::Installation);
        assert!(!labels.contains_key("team"));
        assert_eq!(labels.len(), 3);
    }
}
