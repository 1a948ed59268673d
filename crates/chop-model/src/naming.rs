//! Object names
//!
//! Every name is a pure function of the installation name and the position
//! of the cluster, shard or host, so unchanged input always produces the
//! same names.

use crate::normalize::HostAddress;

/// StatefulSet of a host: `chi-{chi}-{cluster}-{shard}-{replica}`
pub fn stateful_set_name(chi: &str, host: &HostAddress) -> String {
    format!("chi-{}-{}-{}-{}", chi, host.cluster, host.shard, host.replica)
}

/// Headless Service governing a host's StatefulSet
pub fn host_service_name(chi: &str, host: &HostAddress) -> String {
    stateful_set_name(chi, host)
}

/// Hostname of the host's pod, resolvable through the host Service
pub fn pod_hostname(chi: &str, host: &HostAddress) -> String {
    host_service_name(chi, host)
}

/// Installation-wide Service
pub fn installation_service_name(chi: &str) -> String {
    format!("clickhouse-{}", chi)
}

/// Per-cluster Service
pub fn cluster_service_name(chi: &str, cluster: &str) -> String {
    format!("cluster-{}-{}", chi, cluster)
}

/// Per-shard Service
pub fn shard_service_name(chi: &str, cluster: &str, shard: &str) -> String {
    format!("shard-{}-{}-{}", chi, cluster, shard)
}

/// ConfigMap shared by all hosts (config.d)
pub fn common_config_map_name(chi: &str) -> String {
    format!("chi-{}-common-configd", chi)
}

/// ConfigMap with user definitions shared by all hosts (users.d)
pub fn common_users_config_map_name(chi: &str) -> String {
    format!("chi-{}-common-usersd", chi)
}

/// Host-specific ConfigMap (conf.d)
pub fn host_config_map_name(chi: &str, host: &HostAddress) -> String {
    format!(
        "chi-{}-deploy-confd-{}-{}-{}",
        chi, host.cluster, host.shard, host.replica
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address() -> HostAddress {
        HostAddress {
            cluster: "events".to_string(),
            shard: "0".to_string(),
            replica: "1".to_string(),
            cluster_index: 0,
            shard_index: 0,
            replica_index: 1,
        }
    }

    #[test]
    fn test_host_scoped_names() {
        let host = address();
        assert_eq!(stateful_set_name("demo", &host), "chi-demo-events-0-1");
        assert_eq!(host_service_name("demo", &host), "chi-demo-events-0-1");
        assert_eq!(pod_hostname("demo", &host), "chi-demo-events-0-1");
        assert_eq!(
            host_config_map_name("demo", &host),
            "chi-demo-deploy-confd-events-0-1"
        );
    }

    #[test]
    fn test_shared_names() {
        assert_eq!(installation_service_name("demo"), "clickhouse-demo");
        assert_eq!(cluster_service_name("demo", "events"), "cluster-demo-events");
        assert_eq!(shard_service_name("demo", "events", "0"), "shard-demo-events-0");
        assert_eq!(common_config_map_name("demo"), "chi-demo-common-configd");
        assert_eq!(common_users_config_map_name("demo"), "chi-demo-common-usersd");
    }
}
