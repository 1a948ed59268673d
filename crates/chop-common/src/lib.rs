//! Common types for the ClickHouse operator: the installation CRD, Kubernetes
//! object types produced by synthesis, errors, and small shared utilities.

#![deny(missing_docs)]

pub mod crd;
pub mod error;
pub mod k8s;
pub mod kube_utils;
pub mod merge;

pub use error::Error;
pub use merge::{merge_maps, MergePolicy};

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// Label keys
// =============================================================================

/// Label key identifying the application that owns an object
pub const LABEL_APP: &str = "chop.dev/app";

/// Value of [`LABEL_APP`] on every object the operator creates
pub const LABEL_APP_VALUE: &str = "chop";

/// Label key carrying the namespace of the owning installation
pub const LABEL_NAMESPACE: &str = "chop.dev/namespace";

/// Label key carrying the installation name
pub const LABEL_CHI: &str = "chop.dev/chi";

/// Label key carrying the cluster name
pub const LABEL_CLUSTER: &str = "chop.dev/cluster";

/// Label key carrying the shard name
pub const LABEL_SHARD: &str = "chop.dev/shard";

/// Label key carrying the replica (host) name
pub const LABEL_REPLICA: &str = "chop.dev/replica";

/// Label key marking pods as eligible for ready-scoped selectors
pub const LABEL_READY: &str = "chop.dev/ready";

/// Value of [`LABEL_READY`]
pub const LABEL_READY_VALUE: &str = "yes";

/// Label key for the content fingerprint of a generated StatefulSet
pub const LABEL_OBJECT_VERSION: &str = "chop.dev/object-version";

/// Label key naming which scope a Service exposes
pub const LABEL_SERVICE: &str = "chop.dev/Service";

/// Label key naming which group a ConfigMap carries
pub const LABEL_CONFIG_MAP: &str = "chop.dev/ConfigMap";

// =============================================================================
// Port defaults
// =============================================================================

/// Name of the ClickHouse native protocol port
pub const TCP_PORT_NAME: &str = "tcp";

/// Default ClickHouse native protocol port
pub const DEFAULT_TCP_PORT: i32 = 9000;

/// Name of the ClickHouse HTTP port
pub const HTTP_PORT_NAME: &str = "http";

/// Default ClickHouse HTTP port
pub const DEFAULT_HTTP_PORT: i32 = 8123;

/// Name of the ClickHouse inter-node replication port
pub const INTERSERVER_PORT_NAME: &str = "interserver";

/// Default ClickHouse inter-node replication port
pub const DEFAULT_INTERSERVER_PORT: i32 = 9009;
