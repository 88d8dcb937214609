use super::{types::Config, ConfigError};

/// Longest accepted record lifetime (10 years).
const MAX_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Validate configuration
/// Currently validates:
/// - Server port and concurrency are not 0
/// - Quality is within 0-100
/// - At least one conversion may run at a time
/// - Size, file count, TTL and intervals are positive and bounded
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Server validation
    if config.server.port == 0 {
        return Err(invalid("server.port cannot be 0"));
    }
    if config.server.concurrency == 0 {
        return Err(invalid("server.concurrency cannot be 0"));
    }

    // Orchestrator validation
    let orchestrator = &config.orchestrator;
    if orchestrator.quality > 100 {
        return Err(invalid("orchestrator.quality must be between 0 and 100"));
    }
    if orchestrator.max_size_mb == 0 {
        return Err(invalid("orchestrator.max_size_mb cannot be 0"));
    }
    if orchestrator.max_conversions == 0 {
        return Err(invalid("orchestrator.max_conversions cannot be 0"));
    }
    if orchestrator.max_files == 0 {
        return Err(invalid("orchestrator.max_files cannot be 0"));
    }
    if orchestrator.ttl_secs == 0 || orchestrator.ttl_secs > MAX_TTL_SECS {
        return Err(invalid("orchestrator.ttl_secs must be between 1 and 315360000"));
    }
    if orchestrator.tick_interval_ms == 0 {
        return Err(invalid("orchestrator.tick_interval_ms cannot be 0"));
    }
    if orchestrator.disk_sample_interval_secs == 0 {
        return Err(invalid("orchestrator.disk_sample_interval_secs cannot be 0"));
    }

    // Tools validation
    if config.tools.timeout_secs == 0 || config.tools.probe_timeout_secs == 0 {
        return Err(invalid("tools timeouts cannot be 0"));
    }

    Ok(())
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::ValidationError(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::orchestrator::OrchestratorConfig;
    use std::net::IpAddr;

    #[test]
    fn test_validate_valid_config() {
        let config = Config::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let config = Config {
            server: ServerConfig {
                host: "0.0.0.0".parse::<IpAddr>().unwrap(),
                port: 0,
                concurrency: 16,
            },
            ..Default::default()
        };
        let result = validate_config(&config);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_quality_out_of_range() {
        let config = Config {
            orchestrator: OrchestratorConfig {
                quality: 101,
                ..Default::default()
            },
            ..Default::default()
        };
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("quality"));
    }

    #[test]
    fn test_validate_zero_conversions_fails() {
        let config = Config {
            orchestrator: OrchestratorConfig::default().with_max_conversions(0),
            ..Default::default()
        };
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("max_conversions"));
    }

    #[test]
    fn test_validate_ttl_bounds() {
        let config = Config {
            orchestrator: OrchestratorConfig::default().with_ttl_secs(0),
            ..Default::default()
        };
        assert!(validate_config(&config).is_err());

        let config = Config {
            orchestrator: OrchestratorConfig::default().with_ttl_secs(u64::MAX),
            ..Default::default()
        };
        assert!(validate_config(&config).is_err());
    }
}
