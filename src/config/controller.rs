//! # Controller Configuration
//!
//! Settings of the reconcile loops loaded from environment variables.

use super::{env_var_or_default, parse_list};
use crate::constants::*;
use std::collections::BTreeSet;
use std::time::Duration;

/// Reconcile loop configuration
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Namespace holding the service account and the generated kubeconfig
    pub managed_namespace: String,
    /// Namespace the operator runs in, reported as a related object
    pub operator_namespace: String,
    /// Lowercase platform types the kubeconfig loop acts on
    pub supported_platforms: BTreeSet<String>,
    /// Feature sets that enable Cluster API
    pub enabled_feature_sets: BTreeSet<String>,
    /// Version reported on the ClusterOperator
    pub release_version: String,
    /// API server endpoint written into the kubeconfig.
    /// When unset the host process fills in the client's cluster URL.
    pub api_server_endpoint: Option<String>,
    /// Read-modify-write cycles for a status write before giving up
    pub status_max_attempts: u32,
    /// Get/create/replace cycles for the kubeconfig upsert before giving up
    pub upsert_max_attempts: u32,
    /// Base pause between conflicting writes (milliseconds)
    pub conflict_retry_base_ms: u64,
    /// Periodic resync interval (seconds), 0 disables it
    pub resync_interval_secs: u64,
    /// Minimum reconcile error backoff (seconds)
    pub backoff_min_secs: u64,
    /// Maximum reconcile error backoff (seconds)
    pub backoff_max_secs: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            managed_namespace: DEFAULT_MANAGED_NAMESPACE.to_string(),
            operator_namespace: DEFAULT_OPERATOR_NAMESPACE.to_string(),
            supported_platforms: DEFAULT_SUPPORTED_PLATFORMS
                .iter()
                .map(|p| (*p).to_string())
                .collect(),
            enabled_feature_sets: DEFAULT_ENABLED_FEATURE_SETS
                .iter()
                .map(|f| (*f).to_string())
                .collect(),
            release_version: DEFAULT_RELEASE_VERSION.to_string(),
            api_server_endpoint: None,
            status_max_attempts: DEFAULT_STATUS_MAX_ATTEMPTS,
            upsert_max_attempts: DEFAULT_UPSERT_MAX_ATTEMPTS,
            conflict_retry_base_ms: DEFAULT_CONFLICT_RETRY_BASE_MS,
            resync_interval_secs: DEFAULT_RESYNC_INTERVAL_SECS,
            backoff_min_secs: DEFAULT_BACKOFF_MIN_SECS,
            backoff_max_secs: DEFAULT_BACKOFF_MAX_SECS,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            managed_namespace: env_var_or_default("MANAGED_NAMESPACE", defaults.managed_namespace),
            operator_namespace: env_var_or_default(
                "OPERATOR_NAMESPACE",
                defaults.operator_namespace,
            ),
            supported_platforms: std::env::var("SUPPORTED_PLATFORMS")
                .map(|v| Self::normalize_platforms(parse_list(&v)))
                .unwrap_or(defaults.supported_platforms),
            enabled_feature_sets: std::env::var("ENABLED_FEATURE_SETS")
                .map(|v| parse_list(&v).into_iter().collect())
                .unwrap_or(defaults.enabled_feature_sets),
            release_version: env_var_or_default("RELEASE_VERSION", defaults.release_version),
            api_server_endpoint: std::env::var("API_SERVER_ENDPOINT")
                .ok()
                .filter(|v| !v.is_empty()),
            status_max_attempts: env_var_or_default(
                "STATUS_MAX_ATTEMPTS",
                defaults.status_max_attempts,
            )
            .max(1),
            upsert_max_attempts: env_var_or_default(
                "UPSERT_MAX_ATTEMPTS",
                defaults.upsert_max_attempts,
            )
            .max(1),
            conflict_retry_base_ms: env_var_or_default(
                "CONFLICT_RETRY_BASE_MS",
                defaults.conflict_retry_base_ms,
            ),
            resync_interval_secs: env_var_or_default(
                "RESYNC_INTERVAL_SECS",
                defaults.resync_interval_secs,
            ),
            backoff_min_secs: env_var_or_default("BACKOFF_MIN_SECS", defaults.backoff_min_secs),
            backoff_max_secs: env_var_or_default("BACKOFF_MAX_SECS", defaults.backoff_max_secs),
        }
    }

    /// Platform names are compared in lowercase
    pub fn normalize_platforms<I, S>(platforms: I) -> BTreeSet<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        platforms
            .into_iter()
            .map(|p| p.as_ref().trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect()
    }

    pub fn is_platform_supported(&self, platform_type: &str) -> bool {
        self.supported_platforms
            .contains(&platform_type.to_lowercase())
    }

    pub fn is_feature_set_enabled(&self, feature_set: &str) -> bool {
        self.enabled_feature_sets.contains(feature_set)
    }

    pub fn resync_interval(&self) -> Option<Duration> {
        (self.resync_interval_secs > 0).then(|| Duration::from_secs(self.resync_interval_secs))
    }

    pub fn conflict_retry_base(&self) -> Duration {
        Duration::from_millis(self.conflict_retry_base_ms)
    }
}
