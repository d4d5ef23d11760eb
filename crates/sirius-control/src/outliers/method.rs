//! Outlier-method trait and the HB / TH-error wrappers.
//!
//! The statistical methods live in the Kostra R package. This module
//! treats them as an opaque [`OutlierMethods`] implementation and adds the
//! input checks, result validation and filtering around them.

use crate::config::HbParams;
use crate::error::{ControlError, Result};
use crate::utils::{numeric_values, require_series};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// 1 for outliers, 0 otherwise.
pub const OUTLIER_COLUMN: &str = "outlier";
/// Size measure of the unit, `max(x1, x2)` scaled by the HB method.
pub const MAX_X_COLUMN: &str = "maxX";
pub const RATIO_COLUMN: &str = "ratio";
pub const UPPER_LIMIT_COLUMN: &str = "upperLimit";
pub const LOWER_LIMIT_COLUMN: &str = "lowerLimit";

/// Columns every HB result must carry.
pub const HB_RESULT_COLUMNS: [&str; 5] = [
    OUTLIER_COLUMN,
    MAX_X_COLUMN,
    RATIO_COLUMN,
    UPPER_LIMIT_COLUMN,
    LOWER_LIMIT_COLUMN,
];

/// Provider of the ratio-based outlier methods.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`.
///
/// # Error Handling
///
/// Implementations return `anyhow::Result`; the wrappers in this module
/// turn failures into [`ControlError::OutlierMethod`].
pub trait OutlierMethods: Send + Sync {
    /// Run the TH-error method. The result has one row per unit with an
    /// `outlier` column.
    fn th_error(&self, data: &DataFrame, fields: &RatioFields) -> anyhow::Result<DataFrame>;

    /// Run the Hidiroglou-Berthelot method. The result carries the columns
    /// in [`HB_RESULT_COLUMNS`].
    fn hb(
        &self,
        data: &DataFrame,
        fields: &RatioFields,
        params: &HbParams,
    ) -> anyhow::Result<DataFrame>;

    /// Name used in logs and error messages.
    fn name(&self) -> &str;
}

/// Column names of the identifier and the two compared values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatioFields {
    pub id: String,
    /// Current value.
    pub x1: String,
    /// Reference value, usually the previous period.
    pub x2: String,
}

impl Default for RatioFields {
    fn default() -> Self {
        Self {
            id: "id".to_string(),
            x1: "x1".to_string(),
            x2: "x2".to_string(),
        }
    }
}

impl RatioFields {
    /// Compare `variable` with `{variable}_1`, its value in the previous period.
    pub fn for_variable(id: impl Into<String>, variable: &str) -> Self {
        Self {
            id: id.into(),
            x1: variable.to_string(),
            x2: format!("{}_1", variable),
        }
    }

    fn require_in(&self, data: &DataFrame) -> Result<()> {
        for column in [&self.id, &self.x1, &self.x2] {
            require_series(data, column)?;
        }
        Ok(())
    }
}

/// Comparison used to pick significant outliers by size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonOp {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
    Ne,
}

impl ComparisonOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Eq => "==",
            Self::Ne => "!=",
        }
    }

    pub fn compare(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            Self::Gt => lhs > rhs,
            Self::Ge => lhs >= rhs,
            Self::Lt => lhs < rhs,
            Self::Le => lhs <= rhs,
            Self::Eq => lhs == rhs,
            Self::Ne => lhs != rhs,
        }
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for ComparisonOp {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            ">" => Ok(Self::Gt),
            ">=" => Ok(Self::Ge),
            "<" => Ok(Self::Lt),
            "<=" => Ok(Self::Le),
            "==" => Ok(Self::Eq),
            "!=" => Ok(Self::Ne),
            other => Err(ControlError::InvalidConfig(format!(
                "unknown comparison operator '{}'",
                other
            ))),
        }
    }
}

fn method_error(methods: &dyn OutlierMethods, method: &str, err: anyhow::Error) -> ControlError {
    ControlError::OutlierMethod(format!("{} {} failed: {:#}", methods.name(), method, err))
}

fn sort_by_max_x(data: &DataFrame) -> Result<DataFrame> {
    Ok(data.sort(
        [MAX_X_COLUMN],
        SortMultipleOptions::default().with_nulls_last(true),
    )?)
}

/// Keep the rows where `outlier` satisfies `keep`. Null outlier values are dropped.
fn filter_outlier(data: &DataFrame, keep: impl Fn(f64, usize) -> bool) -> Result<DataFrame> {
    let outliers = numeric_values(data, OUTLIER_COLUMN)?;
    let mask: Vec<bool> = outliers
        .iter()
        .enumerate()
        .map(|(row, value)| value.is_some_and(|v| keep(v, row)))
        .collect();
    Ok(data.filter(&BooleanChunked::from_slice("mask".into(), &mask))?)
}

/// Run TH-error and keep the units that are not outliers.
pub fn th_error_inliers(
    methods: &dyn OutlierMethods,
    data: &DataFrame,
    fields: &RatioFields,
) -> Result<DataFrame> {
    fields.require_in(data)?;

    let result = methods
        .th_error(data, fields)
        .map_err(|e| method_error(methods, "ThError", e))?;
    let inliers = filter_outlier(&result, |outlier, _| outlier == 0.0)?;

    debug!(
        "{} ThError kept {} of {} units",
        methods.name(),
        inliers.height(),
        result.height()
    );
    Ok(inliers)
}

/// Run the HB method and return its result sorted by `maxX`.
pub fn hb_method(
    methods: &dyn OutlierMethods,
    data: &DataFrame,
    fields: &RatioFields,
    params: &HbParams,
) -> Result<DataFrame> {
    params.validate()?;
    fields.require_in(data)?;

    let result = methods
        .hb(data, fields, params)
        .map_err(|e| method_error(methods, "Hb", e))?;

    if let Some(missing) = HB_RESULT_COLUMNS
        .iter()
        .find(|column| result.column(column).is_err())
    {
        return Err(ControlError::OutlierMethod(format!(
            "{} Hb result is missing the '{}' column",
            methods.name(),
            missing
        )));
    }

    debug!(
        "{} Hb on {} / {} (pC={}, pU={}, pA={}): {} units",
        methods.name(),
        fields.x1,
        fields.x2,
        params.p_c,
        params.p_u,
        params.p_a,
        result.height()
    );
    sort_by_max_x(&result)
}

/// Run TH-error, then the HB method on the units it keeps.
///
/// The TH-error `outlier` column is dropped before HB adds its own.
pub fn hb_method_on_inliers(
    methods: &dyn OutlierMethods,
    data: &DataFrame,
    fields: &RatioFields,
    params: &HbParams,
) -> Result<DataFrame> {
    params.validate()?;
    let inliers = th_error_inliers(methods, data, fields)?.drop(OUTLIER_COLUMN)?;
    hb_method(methods, &inliers, fields, params)
}

/// Outliers of an HB result whose `maxX` satisfies `op value`, sorted by `maxX`.
pub fn significant_outliers(hb: &DataFrame, op: ComparisonOp, value: f64) -> Result<DataFrame> {
    let max_x = numeric_values(hb, MAX_X_COLUMN)?;
    let significant = filter_outlier(hb, |outlier, row| {
        outlier == 1.0 && max_x[row].is_some_and(|x| op.compare(x, value))
    })?;
    sort_by_max_x(&significant)
}
