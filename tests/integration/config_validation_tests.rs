//! Configuration validation integration tests
//!
//! Tests for configuration loading and validation across all config
//! sections. These verify that configuration validates correctly and fails
//! appropriately for invalid values.

#[cfg(test)]
mod tests {
    use bulk_rs::config::{BulkConfig, Config, LoggingConfig, PoolConfig, ServerConfig, Validate};
    use bulk_rs::{Gateway, GatewayError};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn yaml_error(content: &str) -> String {
        match Config::from_yaml(content) {
            Err(GatewayError::Config(message)) => message,
            other => panic!("expected a config error, got {:?}", other),
        }
    }

    // ==================== Server ====================

    #[test]
    fn test_server_port_zero() {
        let config = ServerConfig {
            port: 0,
            ..ServerConfig::default()
        };
        let error = config.validate().unwrap_err();
        assert!(error.contains("port"));
    }

    #[test]
    fn test_server_limits() {
        assert!(yaml_error("server:\n  timeout: 0\n").contains("timeout"));
        assert!(yaml_error("server:\n  timeout: 7200\n").contains("1 hour"));
        assert!(yaml_error("server:\n  workers: 0\n").contains("Worker count"));
        assert!(yaml_error("server:\n  max_body_size: 0\n").contains("body size"));
    }

    // ==================== Pool ====================

    #[test]
    fn test_pool_bounds() {
        let mut config = PoolConfig::default();
        assert!(config.validate().is_ok());

        config.max_workers = 0;
        assert!(config.validate().is_err());

        config.max_workers = 5000;
        assert!(config.validate().unwrap_err().contains("too high"));

        config.max_workers = 8;
        config.thread_name_prefix = "  ".to_string();
        assert!(config.validate().unwrap_err().contains("thread_name_prefix"));
    }

    // ==================== Bulk ====================

    #[test]
    fn test_bulk_path_must_be_plain() {
        let relative = BulkConfig {
            path: "bulk/".to_string(),
            ..BulkConfig::default()
        };
        assert!(relative.validate().is_err());

        let templated = BulkConfig {
            path: "/bulk/{id}/".to_string(),
            ..BulkConfig::default()
        };
        assert!(templated.validate().is_err());

        let with_query = BulkConfig {
            path: "/bulk/?is_atomic=true".to_string(),
            ..BulkConfig::default()
        };
        assert!(with_query.validate().is_err());
    }

    // ==================== Logging ====================

    #[test]
    fn test_logging_level_must_parse() {
        let config = LoggingConfig {
            level: "bulk_rs=debug,actix_web=info".to_string(),
            json: true,
        };
        assert!(config.validate().is_ok());

        let message = yaml_error("logging:\n  level: \"bulk_rs=notalevel\"\n");
        assert!(message.contains("log level"));
    }

    // ==================== Whole configuration ====================

    #[tokio::test]
    async fn test_full_file_round_trip() {
        let content = r#"
server:
  host: "127.0.0.1"
  port: 8088
pool:
  max_workers: 6
  thread_name_prefix: "bulk-test"
bulk:
  path: "/batch/"
  default_atomic: false
logging:
  level: "debug"
  json: true
"#;
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();

        let config = Config::from_file(file.path()).await.unwrap();
        assert_eq!(config.server().address(), "127.0.0.1:8088");
        assert_eq!(config.pool().max_workers, 6);
        assert_eq!(config.pool().thread_name_prefix, "bulk-test");
        assert_eq!(config.bulk().path, "/batch/");
        assert!(!config.bulk().default_atomic);
        assert!(config.logging().json);

        let reparsed = Config::from_yaml(&config.to_yaml().unwrap()).unwrap();
        assert_eq!(reparsed, config);
    }

    #[test]
    fn test_unknown_yaml_shape_is_rejected() {
        assert!(yaml_error("pool: [1, 2]\n").contains("parse"));
    }

    #[test]
    fn test_gateway_refuses_invalid_config() {
        let mut config = Config::default();
        config.gateway.bulk.path = "no-slash".to_string();
        assert!(Gateway::new(config).is_err());
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!(config.gateway.validate().is_ok());
    }
}
