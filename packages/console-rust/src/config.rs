//! Console configuration.

use std::fmt;
use std::time::Duration;

use fleet_core::DEFAULT_MAX_TARGETS;

/// Errors raised by [`ConsoleConfig::validate`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("base URL must be an absolute http(s) URL, got {0:?}")]
    InvalidBaseUrl(String),
    #[error("graphql path must start with '/', got {0:?}")]
    InvalidGraphqlPath(String),
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
}

/// Credentials sent with every request.
#[derive(Clone, Default, PartialEq, Eq)]
pub enum Credentials {
    #[default]
    None,
    Basic {
        username: String,
        password: String,
    },
    Bearer(String),
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Self::Bearer(_) => f.write_str("Bearer(<redacted>)"),
        }
    }
}

/// Top-level configuration for the console core.
#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    /// Base URL of the management API, e.g. `https://fleet.example.com`.
    pub base_url: String,
    /// Path of the query-graph endpoint, relative to `base_url`.
    pub graphql_path: String,
    /// Transport-level timeout for a single request.
    pub request_timeout: Duration,
    pub user_agent: String,
    pub credentials: Credentials,
    pub resolver: ResolverConfig,
    pub bulk: BulkConfig,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            graphql_path: "/api/graphql".to_string(),
            request_timeout: Duration::from_secs(30),
            user_agent: concat!("fleet-console/", env!("CARGO_PKG_VERSION")).to_string(),
            credentials: Credentials::None,
            resolver: ResolverConfig::default(),
            bulk: BulkConfig::default(),
        }
    }
}

impl ConsoleConfig {
    /// Checks the configuration for values that can never work.
    ///
    /// # Errors
    ///
    /// Returns the first `ConfigError` found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.base_url.trim();
        let has_host = url
            .strip_prefix("https://")
            .or_else(|| url.strip_prefix("http://"))
            .is_some_and(|rest| !rest.is_empty());
        if !has_host {
            return Err(ConfigError::InvalidBaseUrl(self.base_url.clone()));
        }
        if !self.graphql_path.starts_with('/') {
            return Err(ConfigError::InvalidGraphqlPath(self.graphql_path.clone()));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::Zero {
                field: "request_timeout",
            });
        }
        if self.resolver.per_page == 0 {
            return Err(ConfigError::Zero {
                field: "resolver.per_page",
            });
        }
        if self.bulk.max_targets == 0 {
            return Err(ConfigError::Zero {
                field: "bulk.max_targets",
            });
        }
        Ok(())
    }
}

/// Resolver settings.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Page size requested from the resource-oriented fallback.
    pub per_page: u32,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self { per_page: 1000 }
    }
}

/// Bulk operation settings.
#[derive(Debug, Clone)]
pub struct BulkConfig {
    /// Maximum number of distinct targets in one operation.
    pub max_targets: usize,
    /// Delay before a successful operation clears the caller's selection.
    pub auto_clear_delay: Duration,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            max_targets: DEFAULT_MAX_TARGETS,
            auto_clear_delay: Duration::from_secs(5),
        }
    }
}
