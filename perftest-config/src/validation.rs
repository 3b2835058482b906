//! Configuration validation traits and utilities

use crate::error::{ConfigError, ConfigResult};

/// Trait for validatable configuration
pub trait Validatable {
    /// Validate the configuration
    fn validate(&self) -> ConfigResult<()>;

    /// Get the domain name for error reporting
    fn domain_name(&self) -> &'static str;

    /// Helper to create a domain-specific validation error
    fn validation_error(&self, message: impl Into<String>) -> ConfigError {
        ConfigError::DomainError {
            domain: self.domain_name().to_string(),
            message: message.into(),
        }
    }
}

/// Validate a required string field
pub fn validate_required_string(value: &str, field_name: &str, domain: &str) -> ConfigResult<()> {
    if value.trim().is_empty() {
        return Err(ConfigError::DomainError {
            domain: domain.to_string(),
            message: format!("{} cannot be empty", field_name),
        });
    }
    Ok(())
}

/// Validate a positive number
pub fn validate_positive<T>(value: T, field_name: &str, domain: &str) -> ConfigResult<()>
where
    T: PartialOrd + Default + std::fmt::Display,
{
    if value <= T::default() {
        return Err(ConfigError::DomainError {
            domain: domain.to_string(),
            message: format!("{} must be greater than 0, got {}", field_name, value),
        });
    }
    Ok(())
}

/// Validate a git remote; only http(s), ssh and file transports are accepted
pub fn validate_repository_url(url: &str, field_name: &str, domain: &str) -> ConfigResult<()> {
    validate_required_string(url, field_name, domain)?;

    const SCHEMES: [&str; 4] = ["https://", "http://", "ssh://", "file://"];
    let scp_like = url.contains('@') && url.contains(':');
    if !SCHEMES.iter().any(|scheme| url.starts_with(scheme)) && !scp_like {
        return Err(ConfigError::DomainError {
            domain: domain.to_string(),
            message: format!("{} is not a recognised repository URL: {}", field_name, url),
        });
    }
    Ok(())
}
