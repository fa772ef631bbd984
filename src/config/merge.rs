//! Configuration merging utilities
//!
//! This module provides functions to merge configuration from files
//! with command-line arguments, where CLI arguments take precedence.

use super::args::ServerArgs;
use super::defaults::*;
use super::file::ConfigFile;

/// Merge configuration file values with CLI arguments.
/// CLI arguments take precedence over config file values.
/// Only applies config file values where CLI uses defaults.
pub fn merge_config_with_args(mut args: ServerArgs, config: &ConfigFile) -> ServerArgs {
    macro_rules! apply_if_default {
        ($field:ident, $config_val:expr, $default:expr) => {
            if let Some(val) = $config_val {
                if args.$field == $default {
                    args.$field = val;
                }
            }
        };
    }

    macro_rules! apply_if_default_string {
        ($field:ident, $config_val:expr, $default:expr) => {
            if let Some(ref val) = $config_val {
                if args.$field == $default {
                    args.$field = val.clone();
                }
            }
        };
    }

    // Server section
    apply_if_default_string!(http_addr, config.server.http_addr, DEFAULT_HTTP_ADDR);
    apply_if_default_string!(log_level, config.server.log_level, DEFAULT_LOG_LEVEL);

    // Search section
    apply_if_default!(
        search_deadline_ms,
        config.search.deadline_ms,
        DEFAULT_SEARCH_DEADLINE_MS
    );
    apply_if_default!(
        max_request_bytes,
        config.search.max_request_bytes,
        DEFAULT_MAX_REQUEST_BYTES
    );
    apply_if_default!(close_flush_ms, config.search.close_flush_ms, DEFAULT_CLOSE_FLUSH_MS);
    apply_if_default!(event_buffer, config.search.event_buffer, DEFAULT_EVENT_BUFFER);

    // Frontend section
    apply_if_default!(frontend_enabled, config.frontend.enabled, DEFAULT_FRONTEND_ENABLED);
    if let Some(ref path) = config.frontend.path {
        if args.frontend_path == std::path::Path::new(DEFAULT_FRONTEND_PATH) {
            args.frontend_path = path.clone();
        }
    }

    // Authorization section
    if args.denied_topics.is_empty() {
        if let Some(ref topics) = config.authorization.denied_topics {
            args.denied_topics = topics.clone();
        }
    }

    apply_if_default!(demo, config.demo.enabled, DEFAULT_DEMO_ENABLED);
    apply_if_default!(
        drain_timeout_secs,
        config.shutdown.drain_timeout_secs,
        DEFAULT_DRAIN_TIMEOUT_SECS
    );

    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_file_values_fill_defaults() {
        let args = ServerArgs::parse_from(["topicscope"]);
        let config: ConfigFile = toml::from_str(
            r#"
            [server]
            http_addr = "127.0.0.1:7070"
            [search]
            deadline_ms = 3000
            [authorization]
            denied_topics = ["secrets"]
            [demo]
            enabled = true
            "#,
        )
        .unwrap();

        let merged = merge_config_with_args(args, &config);
        assert_eq!(merged.http_addr, "127.0.0.1:7070");
        assert_eq!(merged.search_deadline_ms, 3000);
        assert_eq!(merged.denied_topics, vec!["secrets"]);
        assert!(merged.demo);
        assert_eq!(merged.max_request_bytes, DEFAULT_MAX_REQUEST_BYTES);
    }

    #[test]
    fn test_cli_values_win() {
        let args = ServerArgs::parse_from([
            "topicscope",
            "--search-deadline-ms",
            "500",
            "--denied-topics",
            "audit-log",
        ]);
        let config: ConfigFile = toml::from_str(
            r#"
            [search]
            deadline_ms = 3000
            [authorization]
            denied_topics = ["secrets"]
            "#,
        )
        .unwrap();

        let merged = merge_config_with_args(args, &config);
        assert_eq!(merged.search_deadline_ms, 500);
        assert_eq!(merged.denied_topics, vec!["audit-log"]);
    }
}
