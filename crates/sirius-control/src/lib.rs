//! Quality-Control Framework for Statistics Production
//!
//! Run named data checks over a polars [`DataFrame`](polars::prelude::DataFrame),
//! collect what they flag, and turn the result into a persisted quality
//! report with indicators.
//!
//! # Overview
//!
//! - **Controls**: wrap a check function that marks rows in a boolean flag
//!   column, with an optional row filter and nested automatic corrections
//! - **Collector**: findings and per-control documentation, owned by the
//!   caller and passed by `&mut`
//! - **Quality reports**: JSON snapshots of a collector with metadata about
//!   the checked data
//! - **Indicators**: edit ratio, effect of editing, trigger ratio and
//!   accuracy of controls
//! - **Outliers**: the HB and TH-error methods of the Kostra R package
//!   behind the [`outliers::OutlierMethods`] trait
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use sirius_control::{Control, ControlCollector, ControlType, FLAG_COLUMN, QualityReport};
//! use polars::prelude::*;
//!
//! let data = df![
//!     "Alder" => [120, 90, -50, 10, 20, 40],
//!     "ident" => [1, 2, 3, 4, 5, 6]
//! ]?;
//!
//! let negative_age = Control::builder("alder_negativ", ControlType::AbsoluteError)
//!     .description("Ugyldig verdi")
//!     .id_column("ident")
//!     .important_variables(["Alder"])
//!     .check(|mut data: DataFrame| {
//!         let flags = data.column("Alder")?.as_materialized_series().lt(0)?;
//!         data.with_column(flags.with_name(FLAG_COLUMN.into()).into_series())?;
//!         Ok(data)
//!     })
//!     .build()?;
//!
//! let mut collector = ControlCollector::new();
//! let data = negative_age.run(data, &mut collector)?;
//!
//! let report = QualityReport::builder()
//!     .statistics_name("Befolkning")
//!     .data_location("data/befolkning.parquet")
//!     .data_period("2024")
//!     .build(&collector)?;
//! report.save("rapporter/befolkning_2024.json")?;
//! ```
//!
//! # Features
//!
//! - `kostra` (default): [`outliers::RscriptKostra`], running the Kostra
//!   package through `Rscript`

pub mod config;
pub mod control;
pub mod error;
pub mod indicators;
pub mod outliers;
pub mod reporting;
pub mod types;
pub mod utils;

// Re-exports for convenient access
pub use config::{ConfigValidationError, HbParams, KostraConfig};
pub use control::{
    CORRECTION_COLUMN, Control, ControlBuilder, ControlCollector, ControlKind, ControlOutcome,
    FLAG_COLUMN,
};
pub use error::{ControlError, Result as ControlResult, ResultExt};
pub use reporting::{QualityReport, QualityReportBuilder};
pub use types::{ControlDocumentation, ControlType, ErrorReport, ObservationId};
