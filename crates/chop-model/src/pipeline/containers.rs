//! Containers of a ClickHouse pod
//!
//! The primary container is found by name, else by position, else a
//! default one is added. The same lookup is used for live container
//! statuses.

use chop_common::k8s::{
    Container, ContainerPort, HttpGetAction, PodSpec, PortRef, ProbeSpec, UnknownFields,
};
use chop_common::{HTTP_PORT_NAME, INTERSERVER_PORT_NAME, TCP_PORT_NAME};
use tracing::debug;

use crate::config::SynthesisConfig;
use crate::normalize::HostPorts;

/// Name of the ClickHouse server container
pub const CLICKHOUSE_CONTAINER_NAME: &str = "clickhouse";

/// Name of the log sidecar container
pub const LOG_CONTAINER_NAME: &str = "clickhouse-log";

const LIVENESS_PATH: &str = "/ping";

/// Where the primary container was found
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContainerLookup {
    /// A container carries the primary name
    ByName(usize),
    /// No name match; the first container is used
    ByIndex(usize),
    /// There are no containers
    NotFound,
}

impl ContainerLookup {
    /// Index of the found container
    pub fn index(self) -> Option<usize> {
        match self {
            ContainerLookup::ByName(i) | ContainerLookup::ByIndex(i) => Some(i),
            ContainerLookup::NotFound => None,
        }
    }
}

/// Find the primary ClickHouse entry among named items
pub fn lookup_container<'a, I>(names: I) -> ContainerLookup
where
    I: IntoIterator<Item = &'a str>,
{
    let mut any = false;
    for (i, name) in names.into_iter().enumerate() {
        if name == CLICKHOUSE_CONTAINER_NAME {
            return ContainerLookup::ByName(i);
        }
        any = true;
    }
    if any {
        ContainerLookup::ByIndex(0)
    } else {
        ContainerLookup::NotFound
    }
}

pub(crate) fn primary_lookup(spec: &PodSpec) -> ContainerLookup {
    lookup_container(spec.containers.iter().map(|c| c.name.as_str()))
}

// =============================================================================
// Defaults
// =============================================================================

/// HTTP GET /ping on the named http port
pub(crate) fn default_liveness_probe() -> ProbeSpec {
    ProbeSpec {
        http_get: Some(HttpGetAction {
            path: LIVENESS_PATH.to_string(),
            port: PortRef::name(HTTP_PORT_NAME),
            scheme: None,
            extra: UnknownFields::new(),
        }),
        initial_delay_seconds: Some(60),
        period_seconds: Some(3),
        failure_threshold: Some(10),
        ..Default::default()
    }
}

/// Readiness is left to the pod's own status; no probe is generated.
pub(crate) fn default_readiness_probe() -> Option<ProbeSpec> {
    None
}

pub(crate) fn default_clickhouse_container(config: &SynthesisConfig, ports: &HostPorts) -> Container {
    Container {
        name: CLICKHOUSE_CONTAINER_NAME.to_string(),
        image: config.clickhouse_image.clone(),
        ports: vec![
            ContainerPort::named(HTTP_PORT_NAME, ports.http),
            ContainerPort::named(TCP_PORT_NAME, ports.tcp),
            ContainerPort::named(INTERSERVER_PORT_NAME, ports.interserver),
        ],
        liveness_probe: Some(default_liveness_probe()),
        readiness_probe: default_readiness_probe(),
        ..Default::default()
    }
}

pub(crate) fn default_log_container(config: &SynthesisConfig) -> Container {
    Container {
        name: LOG_CONTAINER_NAME.to_string(),
        image: config.log_image.clone(),
        command: Some(vec!["/bin/sh".to_string(), "-c".to_string(), "--".to_string()]),
        args: Some(vec!["while true; do sleep 30; done;".to_string()]),
        ..Default::default()
    }
}

// =============================================================================
// Integrity
// =============================================================================

/// Make sure a primary container exists and return its index
pub(crate) fn ensure_primary(spec: &mut PodSpec, config: &SynthesisConfig, ports: &HostPorts) -> usize {
    match primary_lookup(spec) {
        ContainerLookup::ByName(i) | ContainerLookup::ByIndex(i) => i,
        ContainerLookup::NotFound => {
            debug!("Pod template has no containers, adding default ClickHouse container");
            spec.containers.push(default_clickhouse_container(config, ports));
            spec.containers.len() - 1
        }
    }
}

/// Fill in probes the container does not declare. Declared probes are kept.
pub(crate) fn ensure_probes(container: &mut Container) {
    if container.liveness_probe.is_none() {
        container.liveness_probe = Some(default_liveness_probe());
    }
    if container.readiness_probe.is_none() {
        container.readiness_probe = default_readiness_probe();
    }
}

/// Bind the named port to `port`, appending it when missing
pub(crate) fn ensure_port_by_name(container: &mut Container, name: &str, port: i32) {
    match container
        .ports
        .iter_mut()
        .find(|p| p.name.as_deref() == Some(name))
    {
        Some(existing) => {
            existing.container_port = port;
            existing.host_port = None;
        }
        None => container.ports.push(ContainerPort::named(name, port)),
    }
}

/// Bind all three ClickHouse ports on the primary container
pub(crate) fn ensure_named_ports(container: &mut Container, ports: &HostPorts) {
    ensure_port_by_name(container, TCP_PORT_NAME, ports.tcp);
    ensure_port_by_name(container, HTTP_PORT_NAME, ports.http);
    ensure_port_by_name(container, INTERSERVER_PORT_NAME, ports.interserver);
}

/// Primary container, probes and ports
pub(crate) fn ensure_integrity(spec: &mut PodSpec, config: &SynthesisConfig, ports: &HostPorts) {
    let primary = ensure_primary(spec, config, ports);
    let container = &mut spec.containers[primary];
    ensure_probes(container);
    ensure_named_ports(container, ports);
}
