//! Volumes, mounts and volume claim templates
//!
//! Config volumes are mounted read-only into every container. Volume claim
//! templates are registered on the StatefulSet once per name, either because
//! a container already mounts them or because the host names them as its
//! data or log template.

use chop_common::crd::VolumeClaimTemplate;
use chop_common::k8s::{
    Container, PersistentVolumeClaim, PodSpec, StatefulSetSpec, Volume, VolumeMount,
};
use chop_common::kube_utils::{HasApiResource, ObjectMeta};
use chop_common::{merge_maps, MergePolicy};
use tracing::debug;

use crate::labels::{operator_labels, Scope};
use crate::naming;
use crate::normalize::{Host, NormalizedInstallation};
use crate::warning::{SynthesisWarning, WarningSink};

/// Mount point of the common config.d ConfigMap
pub const COMMON_CONFIG_PATH: &str = "/etc/clickhouse-server/config.d/";

/// Mount point of the common users.d ConfigMap
pub const USERS_CONFIG_PATH: &str = "/etc/clickhouse-server/users.d/";

/// Mount point of the host conf.d ConfigMap
pub const HOST_CONFIG_PATH: &str = "/etc/clickhouse-server/conf.d/";

/// Mount point of the data volume claim
pub const DATA_PATH: &str = "/var/lib/clickhouse";

/// Mount point of the log volume claim
pub const LOG_PATH: &str = "/var/log/clickhouse-server";

/// File mode of projected config files (0644)
pub const CONFIG_FILE_MODE: i32 = 0o644;

const VOLUME_MODE_FILESYSTEM: &str = "Filesystem";

// =============================================================================
// Mount checks
// =============================================================================

/// How a proposed mount relates to a container's existing mounts
#[derive(Debug, PartialEq, Eq)]
enum MountCheck {
    /// Neither the volume nor the path is mounted yet
    Free,
    /// The exact same mount is already there
    Present,
    /// The volume is mounted elsewhere
    NameTaken,
    /// Another volume is mounted at the path
    PathTaken,
}

fn check_mount(container: &Container, mount: &VolumeMount) -> MountCheck {
    for existing in &container.volume_mounts {
        let same_name = existing.name == mount.name;
        let same_path = existing.mount_path == mount.mount_path;
        match (same_name, same_path) {
            (true, true) => return MountCheck::Present,
            (true, false) => return MountCheck::NameTaken,
            (false, true) => return MountCheck::PathTaken,
            (false, false) => {}
        }
    }
    MountCheck::Free
}

// =============================================================================
// Config volumes
// =============================================================================

fn add_volume(spec: &mut PodSpec, volume: Volume) {
    if !spec.volumes.iter().any(|v| v.name == volume.name) {
        spec.volumes.push(volume);
    }
}

/// Mount the common, users and host ConfigMaps into every container.
///
/// A container that already uses one of the paths for something else keeps
/// it and the config mount is skipped with a conflict warning.
pub(crate) fn mount_config_volumes(
    spec: &mut PodSpec,
    chi: &NormalizedInstallation,
    host: &Host,
    sink: &dyn WarningSink,
) {
    let mounts = [
        (naming::common_config_map_name(&chi.name), COMMON_CONFIG_PATH),
        (naming::common_users_config_map_name(&chi.name), USERS_CONFIG_PATH),
        (naming::host_config_map_name(&chi.name, &host.address), HOST_CONFIG_PATH),
    ];

    for (name, _) in &mounts {
        add_volume(spec, Volume::from_config_map(name.clone(), Some(CONFIG_FILE_MODE)));
    }

    for container in spec.containers.iter_mut() {
        for (name, path) in &mounts {
            let mount = VolumeMount::read_only(name.clone(), *path);
            match check_mount(container, &mount) {
                MountCheck::Free => container.volume_mounts.push(mount),
                MountCheck::Present => {}
                MountCheck::NameTaken => sink.warn(SynthesisWarning::conflict(
                    "config volume",
                    name.clone(),
                    &container.name,
                )),
                MountCheck::PathTaken => sink.warn(SynthesisWarning::conflict(
                    "mount path",
                    *path,
                    &container.name,
                )),
            }
        }
    }
}

// =============================================================================
// Volume claim templates
// =============================================================================

/// Registers and mounts volume claim templates for one host's StatefulSet
pub(crate) struct ClaimBinder<'a> {
    chi: &'a NormalizedInstallation,
    host: &'a Host,
    stateful_set: &'a str,
    sink: &'a dyn WarningSink,
}

impl<'a> ClaimBinder<'a> {
    pub(crate) fn new(
        chi: &'a NormalizedInstallation,
        host: &'a Host,
        stateful_set: &'a str,
        sink: &'a dyn WarningSink,
    ) -> Self {
        Self {
            chi,
            host,
            stateful_set,
            sink,
        }
    }

    fn claim(&self, template: &VolumeClaimTemplate) -> PersistentVolumeClaim {
        let mut labels = template.metadata.labels.clone();
        merge_maps(
            &mut labels,
            &operator_labels(self.chi, Scope::Host(self.host)),
            MergePolicy::Overwrite,
        );
        let mut metadata = ObjectMeta::new(template.name.clone(), "").with_labels(labels);
        metadata.annotations = template.metadata.annotations.clone();

        let mut spec = template.spec.clone();
        spec.volume_mode = Some(VOLUME_MODE_FILESYSTEM.to_string());

        PersistentVolumeClaim {
            api_version: PersistentVolumeClaim::API_VERSION.to_string(),
            kind: PersistentVolumeClaim::KIND.to_string(),
            metadata,
            spec,
        }
    }

    /// Register `template` unless a claim of that name is already present
    pub(crate) fn append_claim(&self, claims: &mut Vec<PersistentVolumeClaim>, template: &VolumeClaimTemplate) {
        if claims.iter().any(|c| c.metadata.name == template.name) {
            return;
        }
        claims.push(self.claim(template));
    }

    /// Register every claim template that a container already mounts by name
    pub(crate) fn bind_mounted(&self, spec: &mut StatefulSetSpec) {
        for container in &spec.template.spec.containers {
            for mount in &container.volume_mounts {
                if let Some(template) = self.chi.catalog.volume_claim_template(&mount.name) {
                    self.append_claim(&mut spec.volume_claim_templates, template);
                }
            }
        }
    }

    /// Mount the claim template `template_name` at `path` in `container_name`.
    ///
    /// Skipped silently when either is empty. Skipped with a warning when the
    /// template or container is unknown, or when the container already uses
    /// the template or the path.
    pub(crate) fn mount(
        &self,
        spec: &mut StatefulSetSpec,
        container_name: &str,
        template_name: &str,
        path: &str,
    ) {
        if path.is_empty() || template_name.is_empty() {
            return;
        }

        let Some(template) = self.chi.catalog.volume_claim_template(template_name) else {
            self.sink.warn(SynthesisWarning::unresolved(
                "volume claim template",
                template_name,
                self.stateful_set,
            ));
            return;
        };

        let Some(container) = spec
            .template
            .spec
            .containers
            .iter_mut()
            .find(|c| c.name == container_name)
        else {
            self.sink.warn(SynthesisWarning::unresolved(
                "container",
                container_name,
                self.stateful_set,
            ));
            return;
        };

        let mount = VolumeMount::new(template_name, path);
        match check_mount(container, &mount) {
            MountCheck::Free => {}
            MountCheck::Present | MountCheck::NameTaken => {
                self.sink.warn(SynthesisWarning::conflict(
                    "volume claim template",
                    template_name,
                    format!("{}/{}", self.stateful_set, container_name),
                ));
                return;
            }
            MountCheck::PathTaken => {
                self.sink.warn(SynthesisWarning::conflict(
                    "mount path",
                    path,
                    format!("{}/{}", self.stateful_set, container_name),
                ));
                return;
            }
        }

        container.volume_mounts.push(mount);
        self.append_claim(&mut spec.volume_claim_templates, template);
        debug!(
            stateful_set = %self.stateful_set,
            container = %container_name,
            claim = %template_name,
            path = %path,
            "Mounted volume claim template"
        );
    }

    /// Mount the host's data and log templates into every container
    pub(crate) fn mount_data_and_log(&self, spec: &mut StatefulSetSpec) {
        let names: Vec<String> = spec
            .template
            .spec
            .containers
            .iter()
            .map(|c| c.name.clone())
            .collect();
        let data = self.host.templates.data_volume_claim_template.as_deref();
        let log = self.host.templates.log_volume_claim_template.as_deref();

        for name in &names {
            if let Some(data) = data {
                self.mount(spec, name, data, DATA_PATH);
            }
            if let Some(log) = log {
                self.mount(spec, name, log, LOG_PATH);
            }
        }
    }
}
