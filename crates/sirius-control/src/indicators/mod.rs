//! Quality indicators.
//!
//! Editing indicators compare the current data with the data as received
//! (or with a log of changes). Control indicators are computed from a
//! [`crate::reporting::QualityReport`].

mod controls;
mod editing;

pub use controls::{Accuracy, ControlTriggerRatio, TriggerRatio, accuracy, trigger_ratio};
pub use editing::{
    EditEffect, GroupEditRatio, edit_effect, edit_effects_to_frame, edit_ratio,
    edit_ratio_by_group, edit_ratios_to_frame,
};
