//! Controls and the findings collector.
//!
//! A [`Control`] wraps a check function that marks rows in a boolean flag
//! column. Running it produces one [`crate::ErrorReport`] per flagged row
//! and a [`crate::ControlDocumentation`] entry, which are recorded in a
//! [`ControlCollector`] owned by the caller.
//!
//! # Example
//!
//! ```rust,ignore
//! use sirius_control::{Control, ControlCollector, ControlType, FLAG_COLUMN};
//! use polars::prelude::*;
//!
//! let high_age = Control::builder("alder_hoy", ControlType::PossibleError)
//!     .description("Veldig høy alder")
//!     .id_column("ident")
//!     .check(|mut data: DataFrame| {
//!         let flags = data.column("Alder")?.as_materialized_series().gt(100)?;
//!         data.with_column(flags.with_name(FLAG_COLUMN.into()).into_series())?;
//!         Ok(data)
//!     })
//!     .build()?;
//!
//! let mut collector = ControlCollector::new();
//! let data = high_age.run(data, &mut collector)?;
//! ```

mod collector;
mod definition;

pub use collector::ControlCollector;
pub use definition::{CheckFn, Control, ControlBuilder, ControlKind, ControlOutcome, RowFilter};

/// Column a check sets to `true` for flagged rows.
pub const FLAG_COLUMN: &str = "utslag";

/// Column an automatic correction sets to `true` for corrected rows.
pub const CORRECTION_COLUMN: &str = "maskinelt_rettet";
