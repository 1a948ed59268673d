//! Synthesis configuration
//!
//! Operator-level settings that are not part of any installation descriptor.
//! The embedding operator deserializes this from its own config file.

use serde::{Deserialize, Serialize};

/// Default ClickHouse server image
pub const DEFAULT_CLICKHOUSE_IMAGE: &str = "clickhouse/clickhouse-server:latest";

/// Default image for the log sidecar
pub const DEFAULT_LOG_IMAGE: &str = "busybox";

/// Default number of old StatefulSet revisions kept
pub const DEFAULT_REVISION_HISTORY_LIMIT: i32 = 10;

/// Settings applied to every synthesized object
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SynthesisConfig {
    /// Image of the generated default ClickHouse container
    pub clickhouse_image: String,
    /// Image of the log sidecar container
    pub log_image: String,
    /// `revisionHistoryLimit` of every StatefulSet
    pub revision_history_limit: i32,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            clickhouse_image: DEFAULT_CLICKHOUSE_IMAGE.to_string(),
            log_image: DEFAULT_LOG_IMAGE.to_string(),
            revision_history_limit: DEFAULT_REVISION_HISTORY_LIMIT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: SynthesisConfig =
            serde_json::from_str(r#"{"clickhouseImage": "clickhouse/clickhouse-server:24.8"}"#)
                .unwrap();
        assert_eq!(config.clickhouse_image, "clickhouse/clickhouse-server:24.8");
        assert_eq!(config.log_image, DEFAULT_LOG_IMAGE);
        assert_eq!(config.revision_history_limit, 10);
    }

    #[test]
    fn test_serializes_camel_case() {
        let json = serde_json::to_value(SynthesisConfig::default()).unwrap();
        assert_eq!(json["revisionHistoryLimit"], 10);
        assert_eq!(json["logImage"], "busybox");
    }
}
