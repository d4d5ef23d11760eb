//! Ratio-based outlier detection through the Kostra methods.
//!
//! # Example
//!
//! ```rust,ignore
//! use sirius_control::config::{HbParams, KostraConfig};
//! use sirius_control::outliers::{ComparisonOp, RatioFields, RscriptKostra, hb_method, significant_outliers};
//!
//! let kostra = RscriptKostra::new(KostraConfig::default())?;
//! let fields = RatioFields::for_variable("orgnr", "omsetning");
//! let hb = hb_method(&kostra, &data, &fields, &HbParams::default())?;
//! let flagged = significant_outliers(&hb, ComparisonOp::Gt, 0.0)?;
//! ```

mod method;
#[cfg(feature = "kostra")]
mod rscript;

pub use method::{
    ComparisonOp, HB_RESULT_COLUMNS, LOWER_LIMIT_COLUMN, MAX_X_COLUMN, OUTLIER_COLUMN,
    OutlierMethods, RATIO_COLUMN, RatioFields, UPPER_LIMIT_COLUMN, hb_method,
    hb_method_on_inliers, significant_outliers, th_error_inliers,
};
#[cfg(feature = "kostra")]
pub use rscript::RscriptKostra;
