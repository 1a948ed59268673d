//! Creator: synthesizes StatefulSets, Services and ConfigMaps
//!
//! Holds only shared references to the normalized snapshot and its
//! collaborators, so one `Creator` can be used from several threads, each
//! synthesizing different hosts.

use chop_common::k8s::{
    ConfigMap, HostAlias, LabelSelector, PodTemplateSpec, Service, StatefulSet, StatefulSetSpec,
    StatefulSetUpdateStrategy,
};
use chop_common::kube_utils::{HasApiResource, ObjectMeta};
use chop_common::Result;
use k8s_openapi::api::core::v1::PersistentVolume;
use tracing::{debug, info, warn};

use crate::compiled::InstallationResources;
use crate::config::SynthesisConfig;
use crate::config_map::{create_config_map, ConfigFilesGenerator, ConfigGroup};
use crate::fingerprint;
use crate::labels::{labels, selector, service_labels, Readiness, Scope};
use crate::naming;
use crate::normalize::{Host, NormalizedInstallation};
use crate::pipeline::containers::{default_log_container, ensure_integrity, LOG_CONTAINER_NAME};
use crate::pipeline::pod_template::{apply_pod_template, resolve_pod_template};
use crate::pipeline::service::{
    default_host_service, default_installation_service, service_from_template,
};
use crate::pipeline::volumes::{mount_config_volumes, ClaimBinder};
use crate::status;
use crate::warning::{SynthesisWarning, TracingWarningSink, WarningSink};

const LOOPBACK_IP: &str = "127.0.0.1";
const POD_MANAGEMENT_ORDERED_READY: &str = "OrderedReady";
const UPDATE_STRATEGY_ROLLING: &str = "RollingUpdate";

static TRACING_SINK: TracingWarningSink = TracingWarningSink;

/// Synthesizes Kubernetes objects for a normalized installation.
///
/// ```rust,ignore
/// let creator = Creator::new(&chi, &generator)
///     .with_config(&config)
///     .with_warning_sink(&sink);
///
/// let resources = creator.synthesize();
/// ```
pub struct Creator<'a> {
    chi: &'a NormalizedInstallation,
    generator: &'a dyn ConfigFilesGenerator,
    config: SynthesisConfig,
    sink: &'a dyn WarningSink,
}

impl<'a> Creator<'a> {
    /// Create a Creator with default configuration, logging warnings
    pub fn new(chi: &'a NormalizedInstallation, generator: &'a dyn ConfigFilesGenerator) -> Self {
        Self {
            chi,
            generator,
            config: SynthesisConfig::default(),
            sink: &TRACING_SINK,
        }
    }

    /// Set the synthesis configuration.
    pub fn with_config(mut self, config: &SynthesisConfig) -> Self {
        self.config = config.clone();
        self
    }

    /// Set where warnings are reported.
    pub fn with_warning_sink(mut self, sink: &'a dyn WarningSink) -> Self {
        self.sink = sink;
        self
    }

    // =========================================================================
    // StatefulSet
    // =========================================================================

    /// StatefulSet running `host`, stamped with its content fingerprint.
    ///
    /// Never fails: unresolvable templates and conflicting mounts are
    /// reported to the warning sink and skipped.
    pub fn create_stateful_set(&self, host: &Host) -> StatefulSet {
        let chi = self.chi;
        let name = naming::stateful_set_name(&chi.name, &host.address);

        let mut sts = StatefulSet {
            api_version: StatefulSet::API_VERSION.to_string(),
            kind: StatefulSet::KIND.to_string(),
            metadata: ObjectMeta::new(name.clone(), chi.namespace.clone())
                .with_labels(labels(chi, Scope::Host(host), Readiness::Any)),
            spec: StatefulSetSpec {
                replicas: if chi.stop { 0 } else { 1 },
                service_name: naming::host_service_name(&chi.name, &host.address),
                selector: LabelSelector {
                    match_labels: selector(chi, Scope::Host(host), Readiness::Any),
                    ..Default::default()
                },
                template: PodTemplateSpec::default(),
                volume_claim_templates: Vec::new(),
                pod_management_policy: POD_MANAGEMENT_ORDERED_READY.to_string(),
                update_strategy: StatefulSetUpdateStrategy {
                    type_: UPDATE_STRATEGY_ROLLING.to_string(),
                },
                revision_history_limit: self.config.revision_history_limit,
            },
        };

        self.setup_pod_template(&mut sts.spec, host, &name);
        self.setup_volume_claim_templates(&mut sts.spec, host, &name);

        if let Err(e) = fingerprint::stamp(&mut sts) {
            warn!(stateful_set = %name, error = %e, "Failed to fingerprint StatefulSet");
        }
        sts
    }

    fn setup_pod_template(&self, spec: &mut StatefulSetSpec, host: &Host, name: &str) {
        let template = resolve_pod_template(self.chi, host, &self.config, self.sink);
        spec.template = apply_pod_template(template, self.chi, host);
        ensure_integrity(&mut spec.template.spec, &self.config, &host.ports);
        self.personalize(&mut spec.template, host, name);
    }

    fn personalize(&self, template: &mut PodTemplateSpec, host: &Host, name: &str) {
        let pod = &mut template.spec;

        let alias = HostAlias {
            ip: LOOPBACK_IP.to_string(),
            hostnames: vec![naming::pod_hostname(&self.chi.name, &host.address)],
            ..Default::default()
        };
        if !pod.host_aliases.contains(&alias) {
            pod.host_aliases.push(alias);
        }

        if host.templates.log_volume_claim_template.is_some()
            && !pod.containers.iter().any(|c| c.name == LOG_CONTAINER_NAME)
        {
            pod.containers.push(default_log_container(&self.config));
            debug!(stateful_set = %name, "Added log container");
        }

        mount_config_volumes(pod, self.chi, host, self.sink);
    }

    fn setup_volume_claim_templates(&self, spec: &mut StatefulSetSpec, host: &Host, name: &str) {
        let binder = ClaimBinder::new(self.chi, host, name, self.sink);
        binder.bind_mounted(spec);
        binder.mount_data_and_log(spec);
    }

    // =========================================================================
    // Services
    // =========================================================================

    /// Service exposing `scope`.
    ///
    /// Returns `Ok(None)` for cluster and shard scopes without a Service
    /// template. Fails only when the Service template declares a port
    /// outside 1..=65535.
    pub fn create_service(&self, scope: Scope<'_>) -> Result<Option<Service>> {
        let chi = self.chi;
        let (name, template_name, select) = match scope {
            Scope::Installation => (
                naming::installation_service_name(&chi.name),
                chi.templates.service_template.as_deref(),
                selector(chi, scope, Readiness::Ready),
            ),
            Scope::Cluster(cluster) => (
                naming::cluster_service_name(&chi.name, &cluster.name),
                cluster.templates.cluster_service_template.as_deref(),
                selector(chi, scope, Readiness::Ready),
            ),
            Scope::Shard(shard) => (
                naming::shard_service_name(&chi.name, &shard.cluster, &shard.name),
                shard.templates.shard_service_template.as_deref(),
                selector(chi, scope, Readiness::Ready),
            ),
            Scope::Host(host) => (
                naming::host_service_name(&chi.name, &host.address),
                host.templates.replica_service_template.as_deref(),
                selector(chi, scope, Readiness::Any),
            ),
        };
        let labels = service_labels(chi, scope);

        let template = template_name.and_then(|t| {
            let found = chi.catalog.service_template(t);
            if found.is_none() {
                self.sink
                    .warn(SynthesisWarning::unresolved("service template", t, &name));
            }
            found
        });

        if let Some(template) = template {
            debug!(service = %name, template = %template.name, "Using service template");
            return service_from_template(template, name, &chi.namespace, &labels, &select)
                .map(Some);
        }

        Ok(match scope {
            Scope::Installation => Some(default_installation_service(
                name,
                &chi.namespace,
                labels,
                select,
            )),
            Scope::Host(host) => Some(default_host_service(
                name,
                &chi.namespace,
                host,
                labels,
                select,
            )),
            Scope::Cluster(_) | Scope::Shard(_) => None,
        })
    }

    // =========================================================================
    // ConfigMaps and volumes
    // =========================================================================

    /// ConfigMap carrying the configuration files of `group`
    pub fn create_config_map(&self, group: ConfigGroup<'_>) -> ConfigMap {
        create_config_map(self.chi, group, self.generator)
    }

    /// Label a live PersistentVolume as belonging to `host`
    pub fn prepare_persistent_volume(&self, pv: &mut PersistentVolume, host: &Host) {
        status::prepare_persistent_volume(pv, self.chi, host);
    }

    // =========================================================================
    // Whole installation
    // =========================================================================

    /// Every object of the installation.
    ///
    /// Rejected Services are collected in `errors`; everything else is
    /// still produced.
    pub fn synthesize(&self) -> InstallationResources {
        let chi = self.chi;
        let mut out = InstallationResources::default();

        out.config_maps.push(self.create_config_map(ConfigGroup::Common));
        out.config_maps.push(self.create_config_map(ConfigGroup::CommonUsers));
        for host in chi.hosts() {
            out.config_maps.push(self.create_config_map(ConfigGroup::Host(host)));
        }

        let mut scopes = vec![Scope::Installation];
        for cluster in &chi.clusters {
            scopes.push(Scope::Cluster(cluster));
            for shard in &cluster.shards {
                scopes.push(Scope::Shard(shard));
                scopes.extend(shard.hosts.iter().map(Scope::Host));
            }
        }
        for scope in scopes {
            match self.create_service(scope) {
                Ok(Some(service)) => out.services.push(service),
                Ok(None) => {}
                Err(e) => out.errors.push(e),
            }
        }

        out.stateful_sets = chi.hosts().map(|h| self.create_stateful_set(h)).collect();

        info!(
            chi = %chi.name,
            config_maps = out.config_maps.len(),
            services = out.services.len(),
            stateful_sets = out.stateful_sets.len(),
            errors = out.errors.len(),
            "Synthesized installation"
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::warning::MockWarningSink;
    use chop_common::crd::{
        ClickHouseInstallation, ClickHouseInstallationSpec, ClusterSpec, Configuration,
        TemplateRefs,
    };
    use std::collections::BTreeMap;

    struct NoFiles;

    impl ConfigFilesGenerator for NoFiles {
        fn generate(&self, _group: ConfigGroup<'_>) -> BTreeMap<String, String> {
            BTreeMap::new()
        }
    }

    fn normalized(spec: ClickHouseInstallationSpec) -> NormalizedInstallation {
        let mut chi = ClickHouseInstallation::new("demo", spec);
        chi.metadata.namespace = Some("olap".to_string());
        crate::normalize::normalize(&chi, &TracingWarningSink).unwrap()
    }

    fn one_cluster(templates: TemplateRefs) -> ClickHouseInstallationSpec {
        ClickHouseInstallationSpec {
            configuration: Configuration {
                clusters: vec![ClusterSpec {
                    name: "events".to_string(),
                    templates,
                    ..Default::default()
                }],
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_stateful_set_shell() {
        let chi = normalized(one_cluster(TemplateRefs::default()));
        let creator = Creator::new(&chi, &NoFiles);
        let host = chi.hosts().next().unwrap();
        let sts = creator.create_stateful_set(host);

        assert_eq!(sts.metadata.name, "chi-demo-events-0-0");
        assert_eq!(sts.metadata.namespace, "olap");
        assert_eq!(sts.spec.replicas, 1);
        assert_eq!(sts.spec.service_name, "chi-demo-events-0-0");
        assert_eq!(sts.spec.pod_management_policy, "OrderedReady");
        assert_eq!(sts.spec.update_strategy.type_, "RollingUpdate");
        assert_eq!(sts.spec.revision_history_limit, 10);
        assert_eq!(
            sts.spec.template.spec.host_aliases,
            vec![HostAlias {
                ip: "127.0.0.1".to_string(),
                hostnames: vec!["chi-demo-events-0-0".to_string()],
                ..Default::default()
            }]
        );
        assert!(status::object_version(Some(&sts)).is_some());
    }

    #[test]
    fn test_stopped_installation_has_no_replicas() {
        let mut spec = one_cluster(TemplateRefs::default());
        spec.stop = true;
        let chi = normalized(spec);
        let creator = Creator::new(&chi, &NoFiles);
        let sts = creator.create_stateful_set(chi.hosts().next().unwrap());
        assert_eq!(sts.spec.replicas, 0);
    }

    #[test]
    fn test_config_overrides_images_and_history() {
        let chi = normalized(one_cluster(TemplateRefs {
            log_volume_claim_template: Some("logs".to_string()),
            ..Default::default()
        }));
        let config = SynthesisConfig {
            clickhouse_image: "registry.local/clickhouse:24.8".to_string(),
            log_image: "registry.local/busybox:1.36".to_string(),
            revision_history_limit: 3,
        };
        let creator = Creator::new(&chi, &NoFiles).with_config(&config);
        let sts = creator.create_stateful_set(chi.hosts().next().unwrap());

        let images: Vec<_> = sts
            .spec
            .template
            .spec
            .containers
            .iter()
            .map(|c| c.image.as_str())
            .collect();
        assert_eq!(
            images,
            vec!["registry.local/clickhouse:24.8", "registry.local/busybox:1.36"]
        );
        assert_eq!(sts.spec.revision_history_limit, 3);
    }

    #[test]
    fn test_unknown_service_template_falls_back() {
        let chi = normalized(one_cluster(TemplateRefs {
            cluster_service_template: Some("missing-cluster".to_string()),
            replica_service_template: Some("missing-host".to_string()),
            ..Default::default()
        }));

        let mut sink = MockWarningSink::new();
        sink.expect_warn()
            .withf(|w| matches!(w, SynthesisWarning::UnresolvedReference { kind, .. } if kind == "service template"))
            .times(2)
            .return_const(());
        let creator = Creator::new(&chi, &NoFiles).with_warning_sink(&sink);

        let cluster = &chi.clusters[0];
        assert_eq!(creator.create_service(Scope::Cluster(cluster)).unwrap(), None);

        let host = chi.hosts().next().unwrap();
        let svc = creator
            .create_service(Scope::Host(host))
            .unwrap()
            .expect("default host service");
        assert_eq!(svc.spec.cluster_ip.as_deref(), Some("None"));
    }

    #[test]
    fn test_shard_service_absent_without_template() {
        let chi = normalized(one_cluster(TemplateRefs::default()));
        let creator = Creator::new(&chi, &NoFiles);
        let shard = chi.shards().next().unwrap();
        assert_eq!(creator.create_service(Scope::Shard(shard)).unwrap(), None);

        let svc = creator.create_service(Scope::Installation).unwrap().unwrap();
        assert_eq!(svc.metadata.name, "clickhouse-demo");
        assert_eq!(svc.spec.type_.as_deref(), Some("LoadBalancer"));
        assert_eq!(svc.spec.external_traffic_policy.as_deref(), Some("Local"));
    }
}
