use crate::error::{ControlError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// The result type (severity) of a control.
///
/// Serialized by name. The historical Norwegian names are accepted when
/// reading older reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ControlType {
    #[serde(rename = "AUTOMATIC_CORRECTION", alias = "AUTOMATISK_OPPRETTING")]
    AutomaticCorrection,
    #[serde(rename = "MISSING")]
    Missing,
    #[serde(rename = "POSSIBLE_ERROR", alias = "MULIG_FEIL")]
    PossibleError,
    #[serde(rename = "ABSOLUTE_ERROR", alias = "ABSOLUTT_FEIL")]
    AbsoluteError,
}

impl ControlType {
    /// All result types in declaration order.
    pub const ALL: [ControlType; 4] = [
        ControlType::AutomaticCorrection,
        ControlType::Missing,
        ControlType::PossibleError,
        ControlType::AbsoluteError,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::AutomaticCorrection => "AUTOMATIC_CORRECTION",
            Self::Missing => "MISSING",
            Self::PossibleError => "POSSIBLE_ERROR",
            Self::AbsoluteError => "ABSOLUTE_ERROR",
        }
    }
}

impl fmt::Display for ControlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ControlType {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "AUTOMATIC_CORRECTION" | "AUTOMATISK_OPPRETTING" => Ok(Self::AutomaticCorrection),
            "MISSING" => Ok(Self::Missing),
            "POSSIBLE_ERROR" | "MULIG_FEIL" => Ok(Self::PossibleError),
            "ABSOLUTE_ERROR" | "ABSOLUTT_FEIL" => Ok(Self::AbsoluteError),
            other => Err(ControlError::UnknownControlType(other.to_string())),
        }
    }
}

/// Identifier of an observation (row), as found in the id column.
///
/// Reads whole floats such as `1.0` as [`ObservationId::Int`]; other
/// floats keep their text form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum ObservationId {
    Int(i64),
    Text(String),
}

impl ObservationId {
    /// Id for a float cell: `Int` when the value is a whole number that
    /// fits in an `i64`, otherwise its text form.
    pub fn from_f64(value: f64) -> Self {
        match whole_i64(value) {
            Some(int) => Self::Int(int),
            None => Self::Text(value.to_string()),
        }
    }
}

/// `value` as an `i64` when it is finite, whole and within range.
pub(crate) fn whole_i64(value: f64) -> Option<i64> {
    // 2^63 is exactly representable; i64::MAX is not.
    let in_range = (i64::MIN as f64..i64::MAX as f64).contains(&value);
    (in_range && value.fract() == 0.0).then_some(value as i64)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawObservationId {
    Int(i64),
    Float(f64),
    Text(String),
}

impl<'de> Deserialize<'de> for ObservationId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match RawObservationId::deserialize(deserializer)? {
            RawObservationId::Int(v) => Self::Int(v),
            RawObservationId::Float(v) => Self::from_f64(v),
            RawObservationId::Text(v) => Self::Text(v),
        })
    }
}

impl fmt::Display for ObservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{}", v),
            Self::Text(v) => f.write_str(v),
        }
    }
}

impl From<i64> for ObservationId {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for ObservationId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ObservationId {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// One flagged row from one control run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    #[serde(rename = "kontrollnavn")]
    control_name: String,
    #[serde(rename = "kontrolltype")]
    result_type: ControlType,
    #[serde(rename = "observasjon_id")]
    observation_id: ObservationId,
    #[serde(rename = "feilbeskrivelse", default)]
    description: Option<String>,
    #[serde(rename = "relevante_variabler", default)]
    important_variables: Option<Vec<String>>,
}

impl ErrorReport {
    pub fn new(
        control_name: impl Into<String>,
        result_type: ControlType,
        observation_id: ObservationId,
        description: Option<String>,
        important_variables: Option<Vec<String>>,
    ) -> Self {
        Self {
            control_name: control_name.into(),
            result_type,
            observation_id,
            description,
            important_variables,
        }
    }

    pub fn control_name(&self) -> &str {
        &self.control_name
    }

    pub fn result_type(&self) -> ControlType {
        self.result_type
    }

    pub fn observation_id(&self) -> &ObservationId {
        &self.observation_id
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Variables relevant to the finding; empty when none were configured.
    pub fn important_variables(&self) -> &[String] {
        self.important_variables.as_deref().unwrap_or(&[])
    }
}

/// Summary of the latest run of one control.
///
/// Counts satisfy `units_flagged <= units_checked <= units_in_dataset`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlDocumentation {
    #[serde(rename = "kontrolltype")]
    pub result_type: ControlType,
    #[serde(rename = "feilbeskrivelse")]
    pub description: String,
    #[serde(default)]
    pub docstring: Option<String>,
    #[serde(rename = "Enheter i datasettet")]
    pub units_in_dataset: usize,
    #[serde(rename = "Enheter kontrollert")]
    pub units_checked: usize,
    #[serde(rename = "Kontrollutslag")]
    pub units_flagged: usize,
    #[serde(
        rename = "Relevante variabler",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub important_variables: Option<Vec<String>>,
}
