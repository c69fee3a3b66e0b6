//! Startup-time target loading.
//!
//! Turns the raw `<target>` CLI string into a [`TargetSpec`], reading and
//! parsing the routing-table JSON file when the string names one.  This runs
//! exactly once, before the listener starts; any failure here is fatal.

use anyhow::Context;

use crate::domain::error::BridgeError;
use crate::domain::target::{RoutingTable, TargetArg, TargetSpec};

/// Builds the process-wide [`TargetSpec`] from the raw target string.
///
/// `host` is the backend host used for bare-port and routing-table targets
/// (an explicit `host:port` target carries its own host).
///
/// # Errors
///
/// Returns an error when the target string is malformed, the routing-table
/// file cannot be read, or its contents are not a JSON object of string →
/// port.  All of these are startup-only configuration errors.
pub fn load_target(raw: &str, host: &str) -> anyhow::Result<TargetSpec> {
    match TargetArg::classify(raw)? {
        TargetArg::Port(port) => Ok(TargetSpec::Fixed {
            host: host.to_string(),
            port,
        }),

        TargetArg::HostPort { host, port } => Ok(TargetSpec::Fixed { host, port }),

        TargetArg::RoutingFile(path) => {
            let contents = std::fs::read_to_string(&path).with_context(|| {
                format!("failed to read routing-table file {}", path.display())
            })?;
            let table = parse_routing_table(&contents)?;
            Ok(TargetSpec::RoutingTable {
                host: host.to_string(),
                table,
            })
        }
    }
}

/// Parses routing-table JSON (`{"a": 9001, "b": 9002}`) into a [`RoutingTable`].
///
/// Split out from [`load_target`] so the parsing rules can be unit tested
/// without touching the filesystem.
pub fn parse_routing_table(json: &str) -> Result<RoutingTable, BridgeError> {
    serde_json::from_str(json)
        .map_err(|e| BridgeError::Configuration(format!("malformed routing table: {e}")))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_routing_table() {
        let table = parse_routing_table(r#"{"a": 9001, "b": 9002}"#).unwrap();
        assert_eq!(table.get("a"), Some(9001));
        assert_eq!(table.get("b"), Some(9002));
    }

    #[test]
    fn test_parse_rejects_non_object_json() {
        // A JSON array is syntactically valid JSON but not a routing table.
        let result = parse_routing_table(r#"[9001, 9002]"#);
        assert!(matches!(result, Err(BridgeError::Configuration(_))));
    }

    #[test]
    fn test_parse_rejects_string_ports() {
        let result = parse_routing_table(r#"{"a": "9001"}"#);
        assert!(matches!(result, Err(BridgeError::Configuration(_))));
    }

    #[test]
    fn test_parse_rejects_out_of_range_port() {
        // 70000 does not fit in a u16.
        let result = parse_routing_table(r#"{"a": 70000}"#);
        assert!(matches!(result, Err(BridgeError::Configuration(_))));
    }

    #[test]
    fn test_parse_rejects_malformed_json() {
        let result = parse_routing_table("{not json");
        assert!(matches!(result, Err(BridgeError::Configuration(_))));
    }

    #[test]
    fn test_load_target_bare_port_uses_default_host() {
        let spec = load_target("9000", "127.0.0.1").unwrap();
        assert_eq!(
            spec,
            TargetSpec::Fixed {
                host: "127.0.0.1".to_string(),
                port: 9000,
            }
        );
    }

    #[test]
    fn test_load_target_host_port_overrides_default_host() {
        let spec = load_target("10.0.0.5:9000", "127.0.0.1").unwrap();
        assert_eq!(
            spec,
            TargetSpec::Fixed {
                host: "10.0.0.5".to_string(),
                port: 9000,
            }
        );
    }

    #[test]
    fn test_load_target_missing_routing_file_is_fatal() {
        let result = load_target("/nonexistent/routes.json", "127.0.0.1");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_target_reads_routing_file() {
        // Write a table to a unique temp path, load it, then clean up.
        let path = std::env::temp_dir().join(format!(
            "ws-tcp-bridge-routes-{}.json",
            std::process::id()
        ));
        std::fs::write(&path, r#"{"a": 9001, "b": 9002}"#).unwrap();

        let spec = load_target(path.to_str().unwrap(), "127.0.0.1").unwrap();
        std::fs::remove_file(&path).ok();

        match spec {
            TargetSpec::RoutingTable { host, table } => {
                assert_eq!(host, "127.0.0.1");
                assert_eq!(table.get("a"), Some(9001));
                assert_eq!(table.get("b"), Some(9002));
            }
            other => panic!("expected routing-table spec, got {other:?}"),
        }
    }
}
