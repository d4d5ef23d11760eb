//! Configuration types for the outlier methods.
//!
//! This module provides the parameters for the Hidiroglou-Berthelot (HB)
//! method and the runtime settings for the R bridge, both with the builder
//! pattern.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable overriding the `Rscript` program.
pub const RSCRIPT_ENV: &str = "SIRIUS_RSCRIPT";

/// Parameters for the HB ratio-outlier method.
///
/// Use [`HbParams::builder()`] to create validated parameters.
///
/// # Example
///
/// ```rust,ignore
/// use sirius_control::config::HbParams;
///
/// let params = HbParams::builder()
///     .p_c(20)
///     .p_u(0.5)
///     .p_a(0.05)
///     .build()?;
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HbParams {
    /// Controls the length of the confidence interval.
    /// Default: 20
    pub p_c: i32,

    /// Adjusts for different level of the variables (0.0 - 1.0).
    /// Default: 0.5
    pub p_u: f64,

    /// Adjusts for small differences between the median and the 1st or
    /// 3rd quartile (0.0 - 1.0).
    /// Default: 0.05
    pub p_a: f64,
}

impl Default for HbParams {
    fn default() -> Self {
        Self {
            p_c: 20,
            p_u: 0.5,
            p_a: 0.05,
        }
    }
}

impl HbParams {
    /// Create a new parameter builder.
    pub fn builder() -> HbParamsBuilder {
        HbParamsBuilder::default()
    }

    /// Validate the parameters and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.p_c < 0 {
            return Err(ConfigValidationError::NegativeConfidence(self.p_c));
        }

        if !(0.0..=1.0).contains(&self.p_u) {
            return Err(ConfigValidationError::OutOfUnitRange {
                field: "p_u".to_string(),
                value: self.p_u,
            });
        }

        if !(0.0..=1.0).contains(&self.p_a) {
            return Err(ConfigValidationError::OutOfUnitRange {
                field: "p_a".to_string(),
                value: self.p_a,
            });
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid value for '{field}': {value} (must be between 0.0 and 1.0)")]
    OutOfUnitRange { field: String, value: f64 },

    #[error("Invalid pC: {0} (must be zero or positive)")]
    NegativeConfidence(i32),

    #[error("Empty value for '{0}'")]
    Empty(String),
}

impl From<ConfigValidationError> for crate::ControlError {
    fn from(err: ConfigValidationError) -> Self {
        crate::ControlError::InvalidConfig(err.to_string())
    }
}

/// Builder for [`HbParams`] with fluent API.
#[derive(Debug, Default)]
pub struct HbParamsBuilder {
    p_c: Option<i32>,
    p_u: Option<f64>,
    p_a: Option<f64>,
}

impl HbParamsBuilder {
    /// Set pC, the confidence interval length.
    pub fn p_c(mut self, p_c: i32) -> Self {
        self.p_c = Some(p_c);
        self
    }

    /// Set pU, the level adjustment.
    pub fn p_u(mut self, p_u: f64) -> Self {
        self.p_u = Some(p_u);
        self
    }

    /// Set pA, the quartile adjustment.
    pub fn p_a(mut self, p_a: f64) -> Self {
        self.p_a = Some(p_a);
        self
    }

    /// Build the parameters.
    ///
    /// Returns validated `HbParams` or an error if validation fails.
    pub fn build(self) -> Result<HbParams, ConfigValidationError> {
        let defaults = HbParams::default();
        let params = HbParams {
            p_c: self.p_c.unwrap_or(defaults.p_c),
            p_u: self.p_u.unwrap_or(defaults.p_u),
            p_a: self.p_a.unwrap_or(defaults.p_a),
        };

        params.validate()?;
        Ok(params)
    }
}

/// Runtime settings for calling the Kostra R package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KostraConfig {
    /// The `Rscript` executable.
    /// Default: `$SIRIUS_RSCRIPT` or "Rscript"
    pub rscript: PathBuf,

    /// Name of the R package providing `Hb` and `ThError`.
    /// Default: "Kostra"
    pub package: String,
}

impl Default for KostraConfig {
    fn default() -> Self {
        Self {
            rscript: std::env::var_os(RSCRIPT_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("Rscript")),
            package: "Kostra".to_string(),
        }
    }
}

impl KostraConfig {
    /// Create a new configuration builder.
    pub fn builder() -> KostraConfigBuilder {
        KostraConfigBuilder::default()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.rscript.as_os_str().is_empty() {
            return Err(ConfigValidationError::Empty("rscript".to_string()));
        }
        if self.package.trim().is_empty() {
            return Err(ConfigValidationError::Empty("package".to_string()));
        }
        Ok(())
    }
}

/// Builder for [`KostraConfig`].
#[derive(Debug, Default)]
pub struct KostraConfigBuilder {
    rscript: Option<PathBuf>,
    package: Option<String>,
}

impl KostraConfigBuilder {
    /// Set the `Rscript` executable.
    pub fn rscript(mut self, path: impl Into<PathBuf>) -> Self {
        self.rscript = Some(path.into());
        self
    }

    /// Set the R package name.
    pub fn package(mut self, package: impl Into<String>) -> Self {
        self.package = Some(package.into());
        self
    }

    /// Build the configuration.
    pub fn build(self) -> Result<KostraConfig, ConfigValidationError> {
        let defaults = KostraConfig::default();
        let config = KostraConfig {
            rscript: self.rscript.unwrap_or(defaults.rscript),
            package: self.package.unwrap_or(defaults.package),
        };

        config.validate()?;
        Ok(config)
    }
}
