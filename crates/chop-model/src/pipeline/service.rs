//! Service synthesis
//!
//! With a Service template the template is copied and the computed identity
//! is forced onto it: name and namespace are replaced, and computed labels
//! and selector entries overwrite whatever the template declares. Without
//! one, only the installation and host scopes get a generated Service.

use std::collections::BTreeMap;

use chop_common::crd::ServiceTemplate;
use chop_common::k8s::{PortRef, Service, ServicePort, ServiceSpec};
use chop_common::kube_utils::ObjectMeta;
use chop_common::{
    merge_maps, Error, MergePolicy, Result, DEFAULT_HTTP_PORT, DEFAULT_TCP_PORT, HTTP_PORT_NAME,
    INTERSERVER_PORT_NAME, TCP_PORT_NAME,
};
use tracing::warn;

use crate::normalize::Host;

/// Lowest valid Service port
pub const MIN_PORT: i32 = 1;

/// Highest valid Service port
pub const MAX_PORT: i32 = 65535;

/// Reject a template declaring any port outside 1..=65535
pub(crate) fn verify_template_ports(template: &ServiceTemplate) -> Result<()> {
    for (i, port) in template.spec.ports.iter().enumerate() {
        if !(MIN_PORT..=MAX_PORT).contains(&port.port) {
            warn!(template = %template.name, port = port.port, "Service template port out of range");
            return Err(Error::validation_for_field(
                template.name.clone(),
                format!("spec.ports[{}].port", i),
                format!("port {} out of range {}-{}", port.port, MIN_PORT, MAX_PORT),
            ));
        }
    }
    Ok(())
}

/// Service built from `template` with the computed identity applied
pub(crate) fn service_from_template(
    template: &ServiceTemplate,
    name: String,
    namespace: &str,
    labels: &BTreeMap<String, String>,
    selector: &BTreeMap<String, String>,
) -> Result<Service> {
    verify_template_ports(template)?;

    let mut metadata = template.metadata.clone();
    metadata.name = name;
    metadata.namespace = namespace.to_string();
    merge_maps(&mut metadata.labels, labels, MergePolicy::Overwrite);

    let mut spec = template.spec.clone();
    merge_maps(&mut spec.selector, selector, MergePolicy::Overwrite);

    Ok(Service::new(metadata, spec))
}

/// Generated installation-wide Service: a LoadBalancer for http and tcp
pub(crate) fn default_installation_service(
    name: String,
    namespace: &str,
    labels: BTreeMap<String, String>,
    selector: BTreeMap<String, String>,
) -> Service {
    Service::new(
        ObjectMeta::new(name, namespace).with_labels(labels),
        ServiceSpec {
            selector,
            ports: vec![
                ServicePort::tcp(HTTP_PORT_NAME, DEFAULT_HTTP_PORT, PortRef::name(HTTP_PORT_NAME)),
                ServicePort::tcp(TCP_PORT_NAME, DEFAULT_TCP_PORT, PortRef::name(TCP_PORT_NAME)),
            ],
            type_: Some("LoadBalancer".to_string()),
            external_traffic_policy: Some("Local".to_string()),
            ..Default::default()
        },
    )
}

/// Generated per-host Service: headless, publishing not-ready addresses
pub(crate) fn default_host_service(
    name: String,
    namespace: &str,
    host: &Host,
    labels: BTreeMap<String, String>,
    selector: BTreeMap<String, String>,
) -> Service {
    let port = |name: &str, number: i32| ServicePort::tcp(name, number, PortRef::Number(number));
    Service::new(
        ObjectMeta::new(name, namespace).with_labels(labels),
        ServiceSpec {
            selector,
            ports: vec![
                port(HTTP_PORT_NAME, host.ports.http),
                port(TCP_PORT_NAME, host.ports.tcp),
                port(INTERSERVER_PORT_NAME, host.ports.interserver),
            ],
            type_: Some("ClusterIP".to_string()),
            cluster_ip: Some("None".to_string()),
            publish_not_ready_addresses: Some(true),
            ..Default::default()
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(ports: &[i32]) -> ServiceTemplate {
        let mut template = ServiceTemplate {
            name: "lb".to_string(),
            spec: ServiceSpec {
                ports: ports
                    .iter()
                    .map(|p| ServicePort::tcp("p", *p, PortRef::Number(*p)))
                    .collect(),
                ..Default::default()
            },
            ..Default::default()
        };
        template.metadata.name = "from-template".to_string();
        template.metadata.namespace = "elsewhere".to_string();
        template
            .metadata
            .labels
            .insert("app".to_string(), "stale".to_string());
        template
            .metadata
            .labels
            .insert("team".to_string(), "olap".to_string());
        template
            .spec
            .selector
            .insert("app".to_string(), "stale".to_string());
        template
    }

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_port_boundaries() {
        assert!(verify_template_ports(&template(&[1, 65535])).is_ok());
        for bad in [0, 65536, -1] {
            let err = verify_template_ports(&template(&[8123, bad])).unwrap_err();
            assert_eq!(err.subject(), Some("lb"));
            assert_eq!(err.field(), Some("spec.ports[1].port"));
        }
    }

    #[test]
    fn test_template_identity_is_overwritten() {
        let svc = service_from_template(
            &template(&[8123]),
            "clickhouse-demo".to_string(),
            "olap",
            &map(&[("app", "chop")]),
            &map(&[("app", "chop"), ("chi", "demo")]),
        )
        .unwrap();

        assert_eq!(svc.metadata.name, "clickhouse-demo");
        assert_eq!(svc.metadata.namespace, "olap");
        assert_eq!(svc.metadata.labels, map(&[("app", "chop"), ("team", "olap")]));
        assert_eq!(svc.spec.selector, map(&[("app", "chop"), ("chi", "demo")]));
        assert_eq!(svc.kind, "Service");
    }

    #[test]
    fn test_template_not_modified() {
        let t = template(&[8123]);
        let before = t.clone();
        let _ = service_from_template(&t, "x".to_string(), "olap", &map(&[]), &map(&[("a", "b")]));
        assert_eq!(t, before);
    }
}
