//! Quality reports and control documentation.
//!
//! A [`QualityReport`] is a snapshot of a [`crate::ControlCollector`]
//! together with metadata about the checked data. Reports serialize to the
//! JSON layout used by the existing report archive.
//!
//! # Example
//!
//! ```rust,ignore
//! use sirius_control::reporting::{QualityReport, control_documentation_table};
//!
//! let report = QualityReport::builder()
//!     .statistics_name("Befolkning")
//!     .data_location("data/befolkning.parquet")
//!     .data_period("2024")
//!     .build(&collector)?;
//!
//! report.save("rapporter/befolkning_2024.json")?;
//! println!("{}", control_documentation_table(&report)?);
//! ```

mod documentation;
mod report;

pub use documentation::{
    ControlRegisterRow, control_documentation_table, control_register_rows, findings_table,
};
pub use report::{DEFAULT_QUALITY_CONTROL_ID, QualityReport, QualityReportBuilder};
