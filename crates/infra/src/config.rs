//! Engine configuration.

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use tracing::warn;

use stockroom_catalog::CategoryRules;
use stockroom_units::UnitLimits;

/// Prefix of every environment variable read by [`EngineConfig::from_env`].
pub const ENV_PREFIX: &str = "STOCKROOM_";

/// Limits and defaults for one engine instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Deepest category level (roots are level 0).
    pub max_category_depth: u8,
    pub max_conversion_factor: i64,
    /// Upper bound for any product's stock in base units.
    pub max_stock_quantity: i64,
    /// Used when a search call passes no limit.
    pub category_search_limit: usize,
    pub max_category_name_len: usize,
    pub max_unit_name_len: usize,
    pub max_icon_url_len: usize,
    /// Base unit symbols seeded into an empty store.
    pub default_base_units: Vec<String>,
    pub writer_thread_name: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_category_depth: 4,
            max_conversion_factor: 1_000_000,
            max_stock_quantity: i64::MAX,
            category_search_limit: 20,
            max_category_name_len: 100,
            max_unit_name_len: 50,
            max_icon_url_len: 500,
            default_base_units: vec!["pcs".to_string(), "gr".to_string()],
            writer_thread_name: "stockroom-writer".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn with_max_category_depth(mut self, depth: u8) -> Self {
        self.max_category_depth = depth;
        self
    }

    pub fn with_max_conversion_factor(mut self, factor: i64) -> Self {
        self.max_conversion_factor = factor;
        self
    }

    pub fn with_max_stock_quantity(mut self, qty: i64) -> Self {
        self.max_stock_quantity = qty;
        self
    }

    pub fn with_category_search_limit(mut self, limit: usize) -> Self {
        self.category_search_limit = limit;
        self
    }

    pub fn with_default_base_units<I, T>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.default_base_units = symbols.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_writer_thread_name(mut self, name: impl Into<String>) -> Self {
        self.writer_thread_name = name.into();
        self
    }

    /// Parse a JSON document; missing fields keep their defaults.
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(json).context("invalid engine config JSON")?;
        config.validate()?;
        Ok(config)
    }

    /// Read `STOCKROOM_*` variables over the defaults.
    ///
    /// A malformed value is logged and ignored. `STOCKROOM_DEFAULT_BASE_UNITS`
    /// is a comma-separated list.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        read_parsed(&var, "MAX_CATEGORY_DEPTH", &mut config.max_category_depth);
        read_parsed(&var, "MAX_CONVERSION_FACTOR", &mut config.max_conversion_factor);
        read_parsed(&var, "MAX_STOCK_QUANTITY", &mut config.max_stock_quantity);
        read_parsed(&var, "CATEGORY_SEARCH_LIMIT", &mut config.category_search_limit);
        read_parsed(&var, "MAX_CATEGORY_NAME_LEN", &mut config.max_category_name_len);
        read_parsed(&var, "MAX_UNIT_NAME_LEN", &mut config.max_unit_name_len);
        read_parsed(&var, "MAX_ICON_URL_LEN", &mut config.max_icon_url_len);

        if let Some(raw) = var("DEFAULT_BASE_UNITS") {
            config.default_base_units = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(name) = var("WRITER_THREAD_NAME").filter(|s| !s.trim().is_empty()) {
            config.writer_thread_name = name;
        }

        if let Err(e) = config.validate() {
            warn!(error = %e, "invalid engine config from environment; using defaults");
            return Self::default();
        }
        config
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_category_depth == u8::MAX {
            bail!("max_category_depth must be below {}", u8::MAX);
        }
        if self.max_conversion_factor < 1 {
            bail!("max_conversion_factor must be at least 1");
        }
        if self.max_stock_quantity < 1 {
            bail!("max_stock_quantity must be at least 1");
        }
        if self.category_search_limit == 0 {
            bail!("category_search_limit must be at least 1");
        }
        if self.max_category_name_len == 0 || self.max_unit_name_len == 0 {
            bail!("name length limits must be at least 1");
        }
        if self.writer_thread_name.trim().is_empty() {
            bail!("writer_thread_name cannot be empty");
        }
        Ok(())
    }

    pub fn unit_limits(&self) -> UnitLimits {
        UnitLimits {
            max_name_len: self.max_unit_name_len,
            max_conversion_factor: self.max_conversion_factor,
        }
    }

    pub fn category_rules(&self) -> CategoryRules {
        CategoryRules {
            max_depth: self.max_category_depth,
            max_name_len: self.max_category_name_len,
            max_icon_url_len: self.max_icon_url_len,
        }
    }
}

fn read_parsed<T: std::str::FromStr>(var: &impl Fn(&str) -> Option<String>, name: &str, slot: &mut T) {
    let Some(raw) = var(name) else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(v) => *slot = v,
        Err(_) => warn!(var = %format!("{ENV_PREFIX}{name}"), value = %raw, "ignoring malformed value"),
    }
}
