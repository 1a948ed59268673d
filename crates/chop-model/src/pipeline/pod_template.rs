//! Pod template resolution
//!
//! Each host gets its own copy of either the pod template it references or
//! a generated default. Nothing done to the copy can reach the shared
//! template in the descriptor.

use chop_common::crd::PodTemplate;
use chop_common::k8s::{PodMeta, PodSpec, PodTemplateSpec};
use chop_common::{merge_maps, MergePolicy};
use tracing::debug;

use crate::config::SynthesisConfig;
use crate::labels::{annotations, labels, Readiness, Scope};
use crate::naming;
use crate::normalize::{Host, NormalizedInstallation};
use crate::pipeline::affinity::apply_pod_distribution;
use crate::pipeline::containers::default_clickhouse_container;
use crate::warning::{SynthesisWarning, WarningSink};

/// Generated template with a single ClickHouse container
pub(crate) fn default_pod_template(
    name: &str,
    config: &SynthesisConfig,
    host: &Host,
) -> PodTemplate {
    PodTemplate {
        name: name.to_string(),
        spec: PodSpec {
            containers: vec![default_clickhouse_container(config, &host.ports)],
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Owned pod template for `host`, with pod distribution applied.
///
/// An unknown template name is reported and replaced by the default.
pub(crate) fn resolve_pod_template(
    chi: &NormalizedInstallation,
    host: &Host,
    config: &SynthesisConfig,
    sink: &dyn WarningSink,
) -> PodTemplate {
    let sts_name = naming::stateful_set_name(&chi.name, &host.address);

    let mut template = match host.templates.pod_template.as_deref() {
        Some(name) => match chi.catalog.pod_template(name) {
            Some(shared) => {
                debug!(stateful_set = %sts_name, template = %name, "Using custom pod template");
                shared.clone()
            }
            None => {
                sink.warn(SynthesisWarning::unresolved("pod template", name, &sts_name));
                default_pod_template(&sts_name, config, host)
            }
        },
        None => {
            debug!(stateful_set = %sts_name, "Using default generated pod template");
            default_pod_template(&sts_name, config, host)
        }
    };

    apply_pod_distribution(&mut template, chi, host);
    template
}

/// Pod template spec for the StatefulSet.
///
/// Labels and annotations declared by the template win over computed ones;
/// computed values only fill keys the template leaves unset.
pub(crate) fn apply_pod_template(
    template: PodTemplate,
    chi: &NormalizedInstallation,
    host: &Host,
) -> PodTemplateSpec {
    let mut pod_labels = template.metadata.labels;
    merge_maps(
        &mut pod_labels,
        &labels(chi, Scope::Host(host), Readiness::Ready),
        MergePolicy::KeepExisting,
    );

    let mut pod_annotations = template.metadata.annotations;
    merge_maps(
        &mut pod_annotations,
        &annotations(chi, Scope::Host(host)),
        MergePolicy::KeepExisting,
    );

    PodTemplateSpec {
        metadata: PodMeta {
            name: Some(template.name),
            labels: pod_labels,
            annotations: pod_annotations,
        },
        spec: template.spec,
    }
}
