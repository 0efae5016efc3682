//! Index configuration.
//!
//! Page geometry is loaded from environment variables so the same binary can
//! inspect files written with non-default layouts.
//!
//! # Environment Variables
//!
//! - `TSINDEX_PAGE_SIZE`: Page size in bytes (default: `8192`)
//! - `TSINDEX_DEGREE`: Maximum keys per node (default: the most that fit in a page)
//! - `TSINDEX_SPLIT_FACTOR`: Fraction of a full node kept on the left when it splits (default: `0.5`)
//!
//! # Invariants
//!
//! - A config only describes a usable geometry once `layout()` succeeds
//! - Files must be opened with the same geometry they were created with

use crate::storage::{DEFAULT_SPLIT_FACTOR, Layout, LayoutError, PAGE_SIZE};

/// Page geometry of an index file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexConfig {
    /// Size of every page in bytes.
    pub page_size: usize,
    /// Maximum keys per node. `None` picks the largest degree that fits.
    pub degree: Option<usize>,
    /// Where a full node splits, as a fraction of the degree.
    pub split_factor: f64,
}

/// Error returned when loading configuration fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    InvalidValue { name: String, message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { name, message } => {
                write!(f, "invalid value for {name}: {message}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            page_size: PAGE_SIZE,
            degree: None,
            split_factor: DEFAULT_SPLIT_FACTOR,
        }
    }
}

impl IndexConfig {
    pub const PAGE_SIZE_VAR: &'static str = "TSINDEX_PAGE_SIZE";
    pub const DEGREE_VAR: &'static str = "TSINDEX_DEGREE";
    pub const SPLIT_FACTOR_VAR: &'static str = "TSINDEX_SPLIT_FACTOR";

    /// Load configuration from environment variables.
    ///
    /// Every variable is optional; unset variables take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let page_size = match lookup(Self::PAGE_SIZE_VAR) {
            Some(value) => parse_var(Self::PAGE_SIZE_VAR, &value, "a page size in bytes")?,
            None => defaults.page_size,
        };

        let degree = match lookup(Self::DEGREE_VAR) {
            Some(value) => Some(parse_var(Self::DEGREE_VAR, &value, "a key count")?),
            None => defaults.degree,
        };

        let split_factor = match lookup(Self::SPLIT_FACTOR_VAR) {
            Some(value) => parse_var(Self::SPLIT_FACTOR_VAR, &value, "a fraction")?,
            None => defaults.split_factor,
        };

        Ok(Self {
            page_size,
            degree,
            split_factor,
        })
    }

    /// Validate the geometry and compute page offsets.
    pub fn layout(&self) -> Result<Layout, LayoutError> {
        let degree = self
            .degree
            .unwrap_or_else(|| Layout::max_degree(self.page_size));
        Layout::new(self.page_size, degree, self.split_factor)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str, what: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        name: name.to_string(),
        message: format!("'{value}' is not {what}"),
    })
}
