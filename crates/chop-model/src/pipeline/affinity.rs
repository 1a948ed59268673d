//! Pod spreading
//!
//! Translates a pod template's `podDistribution` rules into required pod
//! anti-affinity terms for one host. Operates on the host's own copy of the
//! template.

use std::collections::BTreeMap;

use chop_common::crd::{PodDistributionType, PodTemplate};
use chop_common::k8s::{Affinity, LabelSelector, PodAffinity, PodAffinityTerm};
use chop_common::{LABEL_CLUSTER, LABEL_REPLICA};

use crate::labels::{selector, Readiness, Scope};
use crate::normalize::{Host, NormalizedInstallation};

/// Topology key used when a rule does not name one
pub const DEFAULT_TOPOLOGY_KEY: &str = "kubernetes.io/hostname";

fn match_labels(
    chi: &NormalizedInstallation,
    host: &Host,
    kind: PodDistributionType,
) -> BTreeMap<String, String> {
    match kind {
        PodDistributionType::ClickHouseAntiAffinity => {
            selector(chi, Scope::Installation, Readiness::Any)
        }
        PodDistributionType::ShardAntiAffinity => {
            let mut labels = selector(chi, Scope::Host(host), Readiness::Any);
            labels.remove(LABEL_REPLICA);
            labels
        }
        PodDistributionType::ReplicaAntiAffinity => {
            let mut labels = selector(chi, Scope::Installation, Readiness::Any);
            labels.insert(LABEL_CLUSTER.to_string(), host.address.cluster.clone());
            labels.insert(LABEL_REPLICA.to_string(), host.address.replica.clone());
            labels
        }
    }
}

/// Add one anti-affinity term per distribution rule. Identical terms are
/// added once, so applying twice is the same as applying once.
pub(crate) fn apply_pod_distribution(
    template: &mut PodTemplate,
    chi: &NormalizedInstallation,
    host: &Host,
) {
    if template.pod_distribution.is_empty() {
        return;
    }

    let terms: Vec<PodAffinityTerm> = template
        .pod_distribution
        .iter()
        .map(|rule| PodAffinityTerm {
            label_selector: LabelSelector {
                match_labels: match_labels(chi, host, rule.type_),
                ..Default::default()
            },
            topology_key: rule
                .topology_key
                .clone()
                .filter(|k| !k.is_empty())
                .unwrap_or_else(|| DEFAULT_TOPOLOGY_KEY.to_string()),
            ..Default::default()
        })
        .collect();

    let anti = template
        .spec
        .affinity
        .get_or_insert_with(Affinity::default)
        .pod_anti_affinity
        .get_or_insert_with(PodAffinity::default);

    for term in terms {
        if !anti
            .required_during_scheduling_ignored_during_execution
            .contains(&term)
        {
            anti.required_during_scheduling_ignored_during_execution
                .push(term);
        }
    }
}
