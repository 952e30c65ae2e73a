//! config-rs/lib.rs
//! Shared configuration utilities for the stylist workspace
//! Provides standardized functions for port/address management and typed env lookups

use std::env;
use std::net::{Ipv4Addr, SocketAddr};
use std::str::FromStr;

/// Load a `.env` file from the working directory, if there is one.
///
/// Must run before any `from_env` constructor so the values are visible.
pub fn load_dotenv() {
    match dotenv::dotenv() {
        Ok(path) => log::debug!("Loaded environment from {}", path.display()),
        Err(_) => log::debug!("No .env file found, using process environment"),
    }
}

/// Get service port from environment variables with proper fallback
///
/// # Arguments
/// * `service_name` - The name of the service (e.g., "STYLIST", "WARDROBE")
/// * `default_port` - The default port to use if not specified in environment
///
/// # Returns
/// The port number to use for the service
pub fn get_service_port(service_name: &str, default_port: u16) -> u16 {
    let var_name = format!("{}_SERVICE_PORT", service_name.to_uppercase());
    match env::var(&var_name) {
        Ok(value) => value.parse::<u16>().unwrap_or_else(|_| {
            log::warn!("Invalid port in {}, using default {}", var_name, default_port);
            default_port
        }),
        Err(_) => default_port,
    }
}

/// Create a SocketAddr for binding a service
///
/// `<SERVICE>_SERVICE_ADDR` may hold either `host:port` or `http://host:port`;
/// anything else falls back to `0.0.0.0:<port>`.
pub fn get_bind_address(service_name: &str, default_port: u16) -> SocketAddr {
    let var_name = format!("{}_SERVICE_ADDR", service_name.to_uppercase());

    if let Ok(addr_str) = env::var(&var_name) {
        let trimmed = addr_str
            .strip_prefix("http://")
            .or_else(|| addr_str.strip_prefix("https://"))
            .unwrap_or(&addr_str);
        match trimmed.parse::<SocketAddr>() {
            Ok(addr) => return addr,
            Err(_) => log::warn!("Invalid address format in {}, using default", var_name),
        }
    }

    let port = get_service_port(service_name, default_port);
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, port))
}

/// Get client connection address for connecting to a service
///
/// # Arguments
/// * `service_name` - The name of the service (e.g., "WARDROBE")
/// * `default_port` - The default port to use if not specified in environment
/// * `host` - Optional host to use if not specified in environment (default: "localhost")
///
/// # Returns
/// A base URL for the client to connect to the service
pub fn get_client_address(service_name: &str, default_port: u16, host: Option<&str>) -> String {
    let addr_var_name = format!("{}_SERVICE_ADDR", service_name.to_uppercase());
    let port_var_name = format!("{}_SERVICE_PORT", service_name.to_uppercase());

    // First check if there's a full address override
    if let Ok(addr) = env::var(&addr_var_name) {
        return addr;
    }

    let port = env::var(&port_var_name)
        .ok()
        .and_then(|v| v.parse::<u16>().ok())
        .unwrap_or(default_port);

    let host = host.unwrap_or("localhost");
    format!("http://{}:{}", host, port)
}

/// Read an environment variable and parse it, falling back to `default`
/// when it is unset or does not parse.
pub fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

/// Read a boolean flag ("1", "true", "yes", "on" are truthy).
pub fn env_flag(name: &str, default: bool) -> bool {
    env::var(name)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

/// Read an optional, non-blank string variable.
pub fn env_opt(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Deployment mode of the running process.
///
/// Anything other than an explicit "production"/"prod" is treated as a
/// development deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentMode {
    Development,
    Production,
}

impl DeploymentMode {
    /// Resolve from `STYLIST_ENV`, then `APP_ENV`.
    pub fn from_env() -> Self {
        let raw = env_opt("STYLIST_ENV").or_else(|| env_opt("APP_ENV"));
        match raw {
            Some(value) => Self::parse(&value),
            None => DeploymentMode::Development,
        }
    }

    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => DeploymentMode::Production,
            _ => DeploymentMode::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, DeploymentMode::Production)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_service_port() {
        std::env::set_var("CFGTEST_SERVICE_PORT", "9000");
        assert_eq!(get_service_port("CFGTEST", 8000), 9000);

        std::env::set_var("CFGBAD_SERVICE_PORT", "not-a-port");
        assert_eq!(get_service_port("CFGBAD", 8000), 8000);

        std::env::remove_var("CFGUNKNOWN_SERVICE_PORT");
        assert_eq!(get_service_port("CFGUNKNOWN", 8000), 8000);
    }

    #[test]
    fn test_get_bind_address() {
        std::env::set_var("BINDTEST_SERVICE_ADDR", "http://127.0.0.1:7001");
        assert_eq!(
            get_bind_address("BINDTEST", 8000),
            "127.0.0.1:7001".parse::<SocketAddr>().unwrap()
        );

        std::env::remove_var("BINDDEFAULT_SERVICE_ADDR");
        std::env::remove_var("BINDDEFAULT_SERVICE_PORT");
        assert_eq!(
            get_bind_address("BINDDEFAULT", 8080),
            "0.0.0.0:8080".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn test_get_client_address() {
        std::env::set_var("CLIENTTEST_SERVICE_ADDR", "http://example.com:9000");
        assert_eq!(get_client_address("CLIENTTEST", 8000, None), "http://example.com:9000");

        std::env::set_var("CLIENTPORT_SERVICE_PORT", "9100");
        assert_eq!(get_client_address("CLIENTPORT", 8000, None), "http://localhost:9100");

        std::env::remove_var("CLIENTNONE_SERVICE_ADDR");
        std::env::remove_var("CLIENTNONE_SERVICE_PORT");
        assert_eq!(
            get_client_address("CLIENTNONE", 8000, Some("wardrobe.local")),
            "http://wardrobe.local:8000"
        );
    }

    #[test]
    fn test_env_helpers() {
        std::env::set_var("CFG_ENV_OR_NUM", " 42 ");
        assert_eq!(env_or("CFG_ENV_OR_NUM", 7u64), 42);
        assert_eq!(env_or("CFG_ENV_OR_MISSING", 7u64), 7);

        std::env::set_var("CFG_FLAG_ON", "Yes");
        assert!(env_flag("CFG_FLAG_ON", false));
        assert!(!env_flag("CFG_FLAG_MISSING", false));

        std::env::set_var("CFG_OPT_BLANK", "   ");
        assert_eq!(env_opt("CFG_OPT_BLANK"), None);
    }

    #[test]
    fn test_deployment_mode_parse() {
        assert_eq!(DeploymentMode::parse("production"), DeploymentMode::Production);
        assert_eq!(DeploymentMode::parse(" PROD "), DeploymentMode::Production);
        assert_eq!(DeploymentMode::parse("staging"), DeploymentMode::Development);
        assert!(!DeploymentMode::parse("dev").is_production());
    }
}
