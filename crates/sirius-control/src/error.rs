//! Error types for the quality-control framework.
//!
//! This module provides the error hierarchy used by controls, the
//! findings collector, report building and the outlier-method boundary.
//!
//! Errors are serializable so they can be handed to a frontend or written
//! into a JSON response as `{ "code": ..., "message": ... }`.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for the control framework.
#[derive(Error, Debug)]
pub enum ControlError {
    /// A required quality report field was not set.
    ///
    /// The message is the Norwegian text shown to statisticians.
    #[error("{message}")]
    MissingReportField {
        field: &'static str,
        message: &'static str,
    },

    /// Column was not found in the dataset.
    #[error("Column '{0}' not found in dataset")]
    ColumnNotFound(String),

    /// The check function removed the flag column.
    #[error("Control '{control}' did not return the flag column '{column}'")]
    FlagColumnMissing { control: String, column: String },

    /// The flag column is not boolean.
    #[error("Flag column '{column}' of control '{control}' must be boolean, found {dtype}")]
    InvalidFlagColumn {
        control: String,
        column: String,
        dtype: String,
    },

    /// The check function added or removed rows.
    #[error("Control '{control}' changed the number of rows from {expected} to {actual}")]
    RowCountChanged {
        control: String,
        expected: usize,
        actual: usize,
    },

    /// A flagged row has no identifier.
    #[error("Control '{control}' flagged row {row} which has no identifier")]
    MissingObservationId { control: String, row: usize },

    /// The control definition is incomplete or inconsistent.
    #[error("Invalid control definition: {0}")]
    InvalidControl(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A result type name that is not part of [`crate::ControlType`].
    #[error("Unknown control type '{0}'")]
    UnknownControlType(String),

    /// The external outlier method failed or returned malformed data.
    #[error("Outlier method error: {0}")]
    OutlierMethod(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<ControlError>,
    },
}

impl ControlError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        ControlError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Get error code for frontend handling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MissingReportField { .. } => "MISSING_REPORT_FIELD",
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::FlagColumnMissing { .. } => "FLAG_COLUMN_MISSING",
            Self::InvalidFlagColumn { .. } => "INVALID_FLAG_COLUMN",
            Self::RowCountChanged { .. } => "ROW_COUNT_CHANGED",
            Self::MissingObservationId { .. } => "MISSING_OBSERVATION_ID",
            Self::InvalidControl(_) => "INVALID_CONTROL",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::UnknownControlType(_) => "UNKNOWN_CONTROL_TYPE",
            Self::OutlierMethod(_) => "OUTLIER_METHOD_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Check if this error was caused by the caller's input rather than a
    /// failure while processing data.
    pub fn is_usage_error(&self) -> bool {
        match self {
            Self::MissingReportField { .. }
            | Self::InvalidControl(_)
            | Self::InvalidConfig(_)
            | Self::UnknownControlType(_) => true,
            Self::WithContext { source, .. } => source.is_usage_error(),
            _ => false,
        }
    }
}

/// Errors are serialized as a struct with `code` and `message` fields.
impl Serialize for ControlError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("ControlError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for control framework operations.
pub type Result<T> = std::result::Result<T, ControlError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| ControlError::Polars(e).with_context(context))
    }
}
