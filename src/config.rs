//! Configuration for lakelog
//!
//! Settings arrive as a flat string map. Each backend namespaces its keys with
//! a prefix so several backends can share one map:
//!
//! ```text
//!   spark.lakelog.storage.ExclusionLogStore.ddb.tableName = delta_log
//!   lakelog.storage.ExclusionLogStore.ddb.region          = eu-west-1
//!   InMemoryCommitCoordinator.backfillBatchSize           = 10
//! ```
//!
//! Lookup tries each root in `CONF_ROOTS` and finally the bare prefix.

use std::collections::HashMap;
use std::str::FromStr;

use crate::error::{LakeError, Result};

/// Flat configuration map handed to builders
pub type Conf = HashMap<String, String>;

/// Roots searched (in order) in front of a backend prefix
pub const CONF_ROOTS: [&str; 2] = ["spark.lakelog.storage.", "lakelog.storage."];

/// Look up `key` for the backend namespaced by `prefix`
pub fn get_param<'a>(conf: &'a Conf, prefix: &str, key: &str) -> Option<&'a str> {
    CONF_ROOTS
        .iter()
        .map(|root| format!("{root}{prefix}.{key}"))
        .chain(std::iter::once(format!("{prefix}.{key}")))
        .find_map(|full| conf.get(&full))
        .map(|v| v.trim())
}

/// Parse an optional numeric setting, failing fast on garbage
fn parse_param<T: FromStr>(conf: &Conf, prefix: &str, key: &str, default: T) -> Result<T> {
    match get_param(conf, prefix, key) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|_| {
            LakeError::Config(format!("{prefix}.{key}: invalid value {raw:?}"))
        }),
    }
}

// =============================================================================
// Exclusion table backend
// =============================================================================

/// Provisioned capacity used only when the exclusion table is first created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThroughputHints {
    pub read_capacity_units: u64,
    pub write_capacity_units: u64,
}

impl Default for ThroughputHints {
    fn default() -> Self {
        Self {
            read_capacity_units: 5,
            write_capacity_units: 5,
        }
    }
}

/// Settings for the exclusion-table commit strategy
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExclusionConfig {
    // -------------------------------------------------------------------------
    // Table identity
    // -------------------------------------------------------------------------
    /// Name of the mutual exclusion table
    pub table_name: String,

    /// Region of the coordination service
    pub region: String,

    /// Explicit endpoint override (None = derive from region)
    pub endpoint: Option<String>,

    // -------------------------------------------------------------------------
    // Table lifecycle
    // -------------------------------------------------------------------------
    /// Capacity hints for first-time table creation
    pub throughput: ThroughputHints,

    /// Seconds a completed record is kept before it may expire
    pub ttl_secs: u64,
}

impl ExclusionConfig {
    pub const CONF_PREFIX: &'static str = "ExclusionLogStore";

    pub const TABLE_NAME: &'static str = "ddb.tableName";
    pub const REGION: &'static str = "ddb.region";
    pub const ENDPOINT: &'static str = "ddb.endpoint";
    pub const CREATE_TABLE_RCU: &'static str = "provisionedThroughput.rcu";
    pub const CREATE_TABLE_WCU: &'static str = "provisionedThroughput.wcu";
    pub const TTL: &'static str = "ddb.ttl";

    pub const DEFAULT_REGION: &'static str = "us-east-1";
    pub const DEFAULT_TTL_SECS: u64 = 86_400;

    /// Resolve from a configuration map (no I/O)
    pub fn from_conf(conf: &Conf) -> Result<Self> {
        let prefix = Self::CONF_PREFIX;

        let table_name = get_param(conf, prefix, Self::TABLE_NAME)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                LakeError::Config(format!("missing required key {prefix}.{}", Self::TABLE_NAME))
            })?
            .to_string();

        let region = get_param(conf, prefix, Self::REGION)
            .unwrap_or(Self::DEFAULT_REGION)
            .to_string();
        let endpoint = get_param(conf, prefix, Self::ENDPOINT).map(str::to_string);

        let defaults = ThroughputHints::default();
        let throughput = ThroughputHints {
            read_capacity_units: parse_param(
                conf,
                prefix,
                Self::CREATE_TABLE_RCU,
                defaults.read_capacity_units,
            )?,
            write_capacity_units: parse_param(
                conf,
                prefix,
                Self::CREATE_TABLE_WCU,
                defaults.write_capacity_units,
            )?,
        };
        let ttl_secs = parse_param(conf, prefix, Self::TTL, Self::DEFAULT_TTL_SECS)?;

        Ok(Self {
            table_name,
            region,
            endpoint,
            throughput,
            ttl_secs,
        })
    }

    /// Create a new config builder
    pub fn builder(table_name: impl Into<String>) -> ExclusionConfigBuilder {
        ExclusionConfigBuilder {
            config: Self {
                table_name: table_name.into(),
                region: Self::DEFAULT_REGION.to_string(),
                endpoint: None,
                throughput: ThroughputHints::default(),
                ttl_secs: Self::DEFAULT_TTL_SECS,
            },
        }
    }
}

/// Builder for ExclusionConfig
pub struct ExclusionConfigBuilder {
    config: ExclusionConfig,
}

impl ExclusionConfigBuilder {
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.config.region = region.into();
        self
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = Some(endpoint.into());
        self
    }

    /// Set the capacity hints used on first table creation
    pub fn throughput(mut self, rcu: u64, wcu: u64) -> Self {
        self.config.throughput = ThroughputHints {
            read_capacity_units: rcu,
            write_capacity_units: wcu,
        };
        self
    }

    /// Set the retention of completed records (in seconds)
    pub fn ttl_secs(mut self, secs: u64) -> Self {
        self.config.ttl_secs = secs;
        self
    }

    pub fn build(self) -> ExclusionConfig {
        self.config
    }
}

// =============================================================================
// In-memory coordinator
// =============================================================================

/// Settings for the in-memory commit coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InMemoryCoordinatorConfig {
    /// Backfill once this many commits are pending
    pub backfill_batch_size: u64,
}

impl Default for InMemoryCoordinatorConfig {
    fn default() -> Self {
        Self {
            backfill_batch_size: 1,
        }
    }
}

impl InMemoryCoordinatorConfig {
    pub const CONF_PREFIX: &'static str = "InMemoryCommitCoordinator";
    pub const BACKFILL_BATCH_SIZE: &'static str = "backfillBatchSize";

    pub fn from_conf(conf: &Conf) -> Result<Self> {
        let backfill_batch_size: u64 =
            parse_param(conf, Self::CONF_PREFIX, Self::BACKFILL_BATCH_SIZE, 1)?;
        if backfill_batch_size == 0 {
            return Err(LakeError::Config(format!(
                "{}.{} must be at least 1",
                Self::CONF_PREFIX,
                Self::BACKFILL_BATCH_SIZE
            )));
        }
        Ok(Self {
            backfill_batch_size,
        })
    }
}
