//! Target specification and resolution.
//!
//! A bridge process runs in exactly one of two modes, decided once at startup
//! and never re-inferred per connection:
//!
//! - **Fixed mode** — every connection bridges to the same `(host, port)`.
//! - **Routing-table mode** — the first segment of the request path is an
//!   opaque ID that is looked up in an immutable ID → port table, so one
//!   listener can multiplex many backends behind a single host.
//!
//! Resolution is a pure lookup with no side effects.  [`TargetSpec`] is
//! shared read-only (inside an `Arc<BridgeConfig>`) across all connection
//! tasks, which is safe precisely because `resolve` takes `&self` and the
//! table is never mutated after load.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::domain::error::BridgeError;

// ── Routing table ─────────────────────────────────────────────────────────────

/// Immutable mapping from client-supplied ID to backend TCP port.
///
/// Deserialized from a JSON object file such as `{"a": 9001, "b": 9002}`.
/// Keys are opaque strings; values must fit in a `u16` (serde rejects
/// anything else during deserialization, so a table that loaded successfully
/// contains only valid ports).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct RoutingTable(HashMap<String, u16>);

impl RoutingTable {
    /// Looks up the port mapped to `id`, if any.
    pub fn get(&self, id: &str) -> Option<u16> {
        self.0.get(id).copied()
    }

    /// Number of entries in the table.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `true` if the table has no entries (every lookup will miss).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, u16)> for RoutingTable {
    fn from_iter<I: IntoIterator<Item = (String, u16)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ── Target argument classification ────────────────────────────────────────────

/// The shape of the `<target>` CLI argument, classified once at startup.
///
/// The raw string is inspected exactly once; the rest of the process works
/// with the resulting tagged value and never re-parses it.
///
/// | Input shape        | Classification                         |
/// |--------------------|----------------------------------------|
/// | `"9000"`           | `Port(9000)`                           |
/// | `"10.0.0.5:9000"`  | `HostPort { host, port }`              |
/// | `"routes.json"`    | `RoutingFile(path)`                    |
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetArg {
    /// A bare port number; the backend host comes from `--host`.
    Port(u16),
    /// An explicit `host:port` pair.
    HostPort {
        /// Backend hostname or IP address.
        host: String,
        /// Backend TCP port.
        port: u16,
    },
    /// A path to a JSON routing-table file.
    RoutingFile(PathBuf),
}

impl TargetArg {
    /// Classifies a raw target string by shape.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Configuration`] when the string contains a `:`
    /// (so it can only be a `host:port` pair) but the port or host part is
    /// invalid.  A string with no `:` that is not a number is assumed to be
    /// a routing-file path; whether the file exists is checked later, when
    /// it is loaded.
    pub fn classify(raw: &str) -> Result<Self, BridgeError> {
        if let Ok(port) = raw.parse::<u16>() {
            return Ok(TargetArg::Port(port));
        }

        if let Some((host, port_str)) = raw.rsplit_once(':') {
            let port = port_str.parse::<u16>().map_err(|_| {
                BridgeError::Configuration(format!("invalid port in target '{raw}'"))
            })?;
            if host.is_empty() {
                return Err(BridgeError::Configuration(format!(
                    "missing host in target '{raw}'"
                )));
            }
            return Ok(TargetArg::HostPort {
                host: host.to_string(),
                port,
            });
        }

        Ok(TargetArg::RoutingFile(PathBuf::from(raw)))
    }
}

// ── Target specification ──────────────────────────────────────────────────────

/// The process-wide target specification: which backend(s) connections
/// bridge to.
///
/// Exactly one variant is active per process instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSpec {
    /// Every connection bridges to this fixed `(host, port)`; the request
    /// path is ignored.
    Fixed {
        /// Backend hostname or IP address.
        host: String,
        /// Backend TCP port.
        port: u16,
    },
    /// The request path's first segment selects the backend port; the host
    /// is fixed for all entries.
    RoutingTable {
        /// Backend hostname or IP address shared by all table entries.
        host: String,
        /// ID → port mapping, immutable for the process lifetime.
        table: RoutingTable,
    },
}

impl TargetSpec {
    /// Resolves the backend `(host, port)` for a connection with the given
    /// request path.
    ///
    /// In fixed mode the path is ignored.  In routing-table mode the ID is
    /// the first path segment after the leading `/`; anything after a
    /// further `/` is ignored (`/a/extra` resolves the same as `/a`).
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::TargetNotFound`] in routing-table mode when
    /// the ID segment is missing, empty, or absent from the table.  The
    /// caller must reject the connection; there is no default target.
    pub fn resolve(&self, path: &str) -> Result<(String, u16), BridgeError> {
        match self {
            TargetSpec::Fixed { host, port } => Ok((host.clone(), *port)),

            TargetSpec::RoutingTable { host, table } => {
                // First segment after the leading separator.  `//a` has an
                // empty first segment and is rejected, not skipped over.
                let id = path
                    .strip_prefix('/')
                    .unwrap_or(path)
                    .split('/')
                    .next()
                    .unwrap_or("");

                if id.is_empty() {
                    return Err(BridgeError::TargetNotFound { id: String::new() });
                }

                match table.get(id) {
                    Some(port) => Ok((host.clone(), port)),
                    None => Err(BridgeError::TargetNotFound { id: id.to_string() }),
                }
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn table(entries: &[(&str, u16)]) -> RoutingTable {
        entries
            .iter()
            .map(|(id, port)| (id.to_string(), *port))
            .collect()
    }

    // ── TargetArg classification ──────────────────────────────────────────────

    #[test]
    fn test_classify_bare_port() {
        let arg = TargetArg::classify("9000").unwrap();
        assert_eq!(arg, TargetArg::Port(9000));
    }

    #[test]
    fn test_classify_host_port() {
        let arg = TargetArg::classify("10.0.0.5:9000").unwrap();
        assert_eq!(
            arg,
            TargetArg::HostPort {
                host: "10.0.0.5".to_string(),
                port: 9000,
            }
        );
    }

    #[test]
    fn test_classify_hostname_port() {
        // Hostnames (not just IPs) are valid on the left of the colon.
        let arg = TargetArg::classify("backend.internal:6502").unwrap();
        assert_eq!(
            arg,
            TargetArg::HostPort {
                host: "backend.internal".to_string(),
                port: 6502,
            }
        );
    }

    #[test]
    fn test_classify_routing_file() {
        let arg = TargetArg::classify("routes.json").unwrap();
        assert_eq!(arg, TargetArg::RoutingFile(PathBuf::from("routes.json")));
    }

    #[test]
    fn test_classify_invalid_port_in_host_port_is_config_error() {
        let result = TargetArg::classify("example.com:notaport");
        assert!(matches!(result, Err(BridgeError::Configuration(_))));
    }

    #[test]
    fn test_classify_port_out_of_range_is_config_error() {
        // 70000 does not fit in a u16, and the colon forces host:port shape.
        let result = TargetArg::classify("example.com:70000");
        assert!(matches!(result, Err(BridgeError::Configuration(_))));
    }

    #[test]
    fn test_classify_missing_host_is_config_error() {
        let result = TargetArg::classify(":9000");
        assert!(matches!(result, Err(BridgeError::Configuration(_))));
    }

    // ── Fixed-mode resolution ─────────────────────────────────────────────────

    #[test]
    fn test_fixed_mode_ignores_path() {
        let spec = TargetSpec::Fixed {
            host: "127.0.0.1".to_string(),
            port: 9000,
        };

        // Any path resolves to the same target.
        for path in ["/", "/a", "/a/b/c", ""] {
            let (host, port) = spec.resolve(path).unwrap();
            assert_eq!(host, "127.0.0.1");
            assert_eq!(port, 9000);
        }
    }

    // ── Routing-table-mode resolution ─────────────────────────────────────────

    #[test]
    fn test_routing_mode_hit_returns_mapped_port() {
        let spec = TargetSpec::RoutingTable {
            host: "127.0.0.1".to_string(),
            table: table(&[("a", 9001), ("b", 9002)]),
        };

        // `/a` must select 9001 — not 9002.
        let (host, port) = spec.resolve("/a").unwrap();
        assert_eq!(host, "127.0.0.1");
        assert_eq!(port, 9001);

        let (_, port) = spec.resolve("/b").unwrap();
        assert_eq!(port, 9002);
    }

    #[test]
    fn test_routing_mode_extra_path_segments_are_ignored() {
        let spec = TargetSpec::RoutingTable {
            host: "127.0.0.1".to_string(),
            table: table(&[("a", 9001)]),
        };

        let (_, port) = spec.resolve("/a/console/extra").unwrap();
        assert_eq!(port, 9001);
    }

    #[test]
    fn test_routing_mode_unknown_id_is_target_not_found() {
        let spec = TargetSpec::RoutingTable {
            host: "127.0.0.1".to_string(),
            table: table(&[("a", 9001), ("b", 9002)]),
        };

        let err = spec.resolve("/c").unwrap_err();
        assert!(matches!(err, BridgeError::TargetNotFound { id } if id == "c"));
    }

    #[test]
    fn test_routing_mode_empty_path_is_target_not_found() {
        let spec = TargetSpec::RoutingTable {
            host: "127.0.0.1".to_string(),
            table: table(&[("a", 9001)]),
        };

        assert!(matches!(
            spec.resolve("/"),
            Err(BridgeError::TargetNotFound { .. })
        ));
        assert!(matches!(
            spec.resolve(""),
            Err(BridgeError::TargetNotFound { .. })
        ));
    }

    #[test]
    fn test_routing_mode_double_slash_is_target_not_found() {
        // `//a` has an *empty* first segment; it must not resolve as `a`.
        let spec = TargetSpec::RoutingTable {
            host: "127.0.0.1".to_string(),
            table: table(&[("a", 9001)]),
        };

        assert!(matches!(
            spec.resolve("//a"),
            Err(BridgeError::TargetNotFound { .. })
        ));
    }

    #[test]
    fn test_routing_table_is_case_sensitive() {
        // IDs are opaque strings: no normalisation is applied.
        let spec = TargetSpec::RoutingTable {
            host: "127.0.0.1".to_string(),
            table: table(&[("Console", 9001)]),
        };

        assert!(spec.resolve("/Console").is_ok());
        assert!(spec.resolve("/console").is_err());
    }

    // ── RoutingTable basics ───────────────────────────────────────────────────

    #[test]
    fn test_routing_table_deserializes_from_json_object() {
        let table: RoutingTable = serde_json::from_str(r#"{"a": 9001, "b": 9002}"#).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get("a"), Some(9001));
        assert_eq!(table.get("b"), Some(9002));
        assert_eq!(table.get("c"), None);
    }

    #[test]
    fn test_empty_routing_table_is_valid_but_always_misses() {
        let table: RoutingTable = serde_json::from_str("{}").unwrap();
        assert!(table.is_empty());
        assert_eq!(table.get("anything"), None);
    }
}
