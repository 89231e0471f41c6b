//! Runtime configuration, read from the environment.

use crate::cache::MAX_TTL;
use crate::web::middleware::rate_limit::{
    DEFAULT_SEARCH_LIMIT, DEFAULT_SEARCH_WINDOW, SearchRateLimiter,
};
use crate::query::{DEFAULT_GRID_PRECISION, DEFAULT_RADIUS_BUCKETS, NormalizeOptions};
use anyhow::{Context, bail};
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use serde::Deserialize;
use std::time::Duration;

/// Optional file merged underneath the environment.
pub const CONFIG_FILE: &str = "gasfinder.toml";

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_owned()
}

fn default_cache_ttl() -> u64 {
    15 * 60
}

fn default_sweep_interval() -> u64 {
    5 * 60
}

fn default_search_rate_limit() -> u32 {
    DEFAULT_SEARCH_LIMIT
}

fn default_search_rate_window() -> u64 {
    DEFAULT_SEARCH_WINDOW.as_secs()
}

fn default_grid_precision() -> f64 {
    DEFAULT_GRID_PRECISION
}

fn default_radius_buckets() -> RadiusBuckets {
    RadiusBuckets::List(DEFAULT_RADIUS_BUCKETS.to_vec())
}

fn default_shutdown_timeout() -> u64 {
    8
}

fn default_upstream_timeout() -> u64 {
    10
}

/// Radius buckets as written in the environment (`5,10,20,50` or a lone
/// `5`) or as a TOML array.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RadiusBuckets {
    List(Vec<f64>),
    Single(f64),
    Csv(String),
}

impl RadiusBuckets {
    /// Positive, finite, ascending and deduplicated.
    pub fn parse(&self) -> anyhow::Result<Vec<f64>> {
        let mut buckets = match self {
            Self::List(values) => values.clone(),
            Self::Single(value) => vec![*value],
            Self::Csv(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| s.parse().with_context(|| format!("'{s}' is not a number")))
                .collect::<anyhow::Result<Vec<f64>>>()?,
        };

        if buckets.is_empty() {
            bail!("at least one bucket is required");
        }
        if let Some(bad) = buckets.iter().find(|b| !b.is_finite() || **b <= 0.0) {
            bail!("bucket {bad} must be positive");
        }
        buckets.sort_by(f64::total_cmp);
        buckets.dedup();
        Ok(buckets)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Places/Distance Matrix key. Searches fail upstream without it.
    #[serde(default)]
    pub google_api_key: String,
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_seconds: u64,
    #[serde(default = "default_sweep_interval")]
    pub cache_sweep_interval_seconds: u64,
    #[serde(default = "default_grid_precision")]
    pub grid_precision: f64,
    #[serde(default = "default_radius_buckets")]
    pub radius_buckets: RadiusBuckets,
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_seconds: u64,
    /// Searches allowed per client IP within the window.
    #[serde(default = "default_search_rate_limit")]
    pub search_rate_limit: u32,
    #[serde(default = "default_search_rate_window")]
    pub search_rate_window_seconds: u64,
    /// Per-request timeout for provider calls.
    #[serde(default = "default_upstream_timeout")]
    pub upstream_timeout_seconds: u64,
}

impl Config {
    /// Load from `gasfinder.toml` (if present) overlaid with raw environment
    /// variables, then validate.
    pub fn load() -> anyhow::Result<Self> {
        Self::from_figment(
            Figment::new()
                .merge(Toml::file(CONFIG_FILE))
                .merge(Env::raw()),
        )
    }

    pub fn from_figment(figment: Figment) -> anyhow::Result<Self> {
        let config: Config = figment.extract().context("Failed to load config")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        self.normalize_options()?;
        if self.cache_ttl_seconds > MAX_TTL.as_secs() {
            bail!(
                "CACHE_TTL_SECONDS must be at most {}, got {}",
                MAX_TTL.as_secs(),
                self.cache_ttl_seconds
            );
        }
        SearchRateLimiter::new(self.search_rate_limit, self.search_rate_window())
            .context("Invalid SEARCH_RATE_LIMIT / SEARCH_RATE_WINDOW_SECONDS")?;
        if self.cache_sweep_interval_seconds == 0 {
            bail!("CACHE_SWEEP_INTERVAL_SECONDS must be positive");
        }
        Ok(())
    }

    /// Grid precision and radius buckets as normalization options.
    pub fn normalize_options(&self) -> anyhow::Result<NormalizeOptions> {
        if !self.grid_precision.is_finite() || self.grid_precision <= 0.0 {
            bail!(
                "GRID_PRECISION must be a positive number, got {}",
                self.grid_precision
            );
        }
        let radius_buckets = self
            .radius_buckets
            .parse()
            .with_context(|| format!("Invalid RADIUS_BUCKETS {:?}", self.radius_buckets))?;

        Ok(NormalizeOptions {
            grid_precision: self.grid_precision,
            radius_buckets,
        })
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.cache_sweep_interval_seconds)
    }

    pub fn search_rate_window(&self) -> Duration {
        Duration::from_secs(self.search_rate_window_seconds)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_seconds)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_seconds)
    }
}
