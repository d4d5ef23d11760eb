use super::documentation::control_documentation_table;
use crate::control::ControlCollector;
use crate::error::{ControlError, Result, ResultExt};
use crate::types::{ControlDocumentation, ControlType, ErrorReport};
use chrono::{Local, NaiveDateTime};
use polars::prelude::DataFrame;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

/// Reference used when no quality control description has been linked.
pub const DEFAULT_QUALITY_CONTROL_ID: &str =
    "A reference (or link/uri) to the quality control description";

/// Snapshot of the findings and documentation of one control session.
///
/// The JSON layout uses the Norwegian keys of the reports already stored
/// by the statistics teams, so saved reports stay readable both ways.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    #[serde(rename = "statistikknavn")]
    pub statistics_name: String,

    pub quality_control_id: String,

    #[serde(rename = "data_plassering")]
    pub data_locations: Vec<String>,

    #[serde(rename = "data_periode")]
    pub data_period: String,

    #[serde(rename = "kvalitetsrapport opprettet")]
    pub created: NaiveDateTime,

    /// Distinct result types among the findings, in enum order.
    #[serde(
        rename = "typer_kontrollutslag",
        deserialize_with = "deserialize_result_types"
    )]
    pub result_types: Vec<ControlType>,

    #[serde(rename = "kontrollutslag")]
    pub errors: Vec<ErrorReport>,

    #[serde(rename = "kontrolldokumentasjon", default)]
    pub documentation: BTreeMap<String, ControlDocumentation>,
}

/// Older reports list `OK` when nothing was flagged; it carries no finding.
fn deserialize_result_types<'de, D>(deserializer: D) -> std::result::Result<Vec<ControlType>, D::Error>
where
    D: Deserializer<'de>,
{
    let names = Vec::<String>::deserialize(deserializer)?;
    names
        .iter()
        .filter(|name| name.as_str() != "OK")
        .map(|name| name.parse().map_err(serde::de::Error::custom))
        .collect()
}

impl QualityReport {
    pub fn builder() -> QualityReportBuilder {
        QualityReportBuilder::default()
    }

    pub fn to_value(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Write the report as JSON, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let mut file = File::create(path)
            .map_err(ControlError::from)
            .context(format!("Creating report file {}", path.display()))?;
        file.write_all(self.to_json_string()?.as_bytes())?;

        info!("Quality report saved: {}", path.display());
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .map_err(ControlError::from)
            .context(format!("Reading report file {}", path.display()))?;
        let report = Self::from_json_str(&json)
            .context(format!("Parsing report file {}", path.display()))?;

        debug!(
            "Loaded quality report '{}' with {} findings",
            report.statistics_name,
            report.errors.len()
        );
        Ok(report)
    }

    /// Findings recorded by one control.
    pub fn findings_for<'a>(&'a self, control: &'a str) -> impl Iterator<Item = &'a ErrorReport> {
        self.errors
            .iter()
            .filter(move |error| error.control_name() == control)
    }

    /// Number of findings per result type.
    pub fn counts_by_result_type(&self) -> BTreeMap<ControlType, usize> {
        let mut counts = BTreeMap::new();
        for error in &self.errors {
            *counts.entry(error.result_type()).or_insert(0) += 1;
        }
        counts
    }
}

/// Builder for [`QualityReport`].
#[derive(Debug, Default)]
pub struct QualityReportBuilder {
    statistics_name: Option<String>,
    quality_control_id: Option<String>,
    data_locations: Vec<String>,
    data_period: Option<String>,
    created: Option<NaiveDateTime>,
}

impl QualityReportBuilder {
    pub fn statistics_name(mut self, name: impl Into<String>) -> Self {
        self.statistics_name = Some(name.into());
        self
    }

    /// Add a location of the checked data. Can be called more than once.
    pub fn data_location(mut self, location: impl Into<String>) -> Self {
        self.data_locations.push(location.into());
        self
    }

    pub fn data_period(mut self, period: impl Into<String>) -> Self {
        self.data_period = Some(period.into());
        self
    }

    pub fn quality_control_id(mut self, id: impl Into<String>) -> Self {
        self.quality_control_id = Some(id.into());
        self
    }

    /// Override the creation timestamp (defaults to local time at build).
    pub fn created(mut self, created: NaiveDateTime) -> Self {
        self.created = Some(created);
        self
    }

    /// Snapshot the collector into a report.
    pub fn build(self, collector: &ControlCollector) -> Result<QualityReport> {
        let statistics_name = self.statistics_name.ok_or(ControlError::MissingReportField {
            field: "statistics_name",
            message: "Må sette statistikknavn (statistics_name)",
        })?;
        if self.data_locations.is_empty() {
            return Err(ControlError::MissingReportField {
                field: "data_location",
                message: "Mangler filsti til datasett (data_location)",
            });
        }
        let data_period = self.data_period.ok_or(ControlError::MissingReportField {
            field: "data_period",
            message: "Må definere hvilken periode dataene gjelder for (data_period)",
        })?;

        let report = QualityReport {
            statistics_name,
            quality_control_id: self
                .quality_control_id
                .unwrap_or_else(|| DEFAULT_QUALITY_CONTROL_ID.to_string()),
            data_locations: self.data_locations,
            data_period,
            created: self.created.unwrap_or_else(|| Local::now().naive_local()),
            result_types: collector.observed_result_types(),
            errors: collector.errors().to_vec(),
            documentation: collector.documentation().clone(),
        };

        debug!(
            "Built quality report for '{}' ({}): {} findings from {} controls",
            report.statistics_name,
            report.data_period,
            report.errors.len(),
            report.documentation.len()
        );
        Ok(report)
    }

    /// Build the report together with its control documentation table.
    pub fn build_with_documentation(
        self,
        collector: &ControlCollector,
    ) -> Result<(QualityReport, DataFrame)> {
        let report = self.build(collector)?;
        let table = control_documentation_table(&report)?;
        Ok((report, table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ObservationId;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn timestamp() -> NaiveDateTime {
        NaiveDateTime::parse_from_str("2024-03-01 12:30:00", "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn report() -> QualityReport {
        QualityReport {
            statistics_name: "Befolkning".to_string(),
            quality_control_id: DEFAULT_QUALITY_CONTROL_ID.to_string(),
            data_locations: vec!["data/befolkning.parquet".to_string()],
            data_period: "2024".to_string(),
            created: timestamp(),
            result_types: vec![ControlType::PossibleError, ControlType::AbsoluteError],
            errors: vec![
                ErrorReport::new(
                    "alder_hoy",
                    ControlType::PossibleError,
                    ObservationId::Int(1),
                    Some("Veldig høy alder".to_string()),
                    None,
                ),
                ErrorReport::new(
                    "alder_negativ",
                    ControlType::AbsoluteError,
                    ObservationId::Int(3),
                    Some("Ugyldig verdi".to_string()),
                    Some(vec!["Alder".to_string()]),
                ),
            ],
            documentation: BTreeMap::new(),
        }
    }

    #[test]
    fn test_build_requires_statistics_name() {
        let err = QualityReport::builder()
            .data_location("data.csv")
            .data_period("2024")
            .build(&ControlCollector::new())
            .unwrap_err();
        assert_eq!(err.to_string(), "Må sette statistikknavn (statistics_name)");
    }

    #[test]
    fn test_build_requires_data_location() {
        let err = QualityReport::builder()
            .statistics_name("Befolkning")
            .data_period("2024")
            .build(&ControlCollector::new())
            .unwrap_err();
        assert!(matches!(
            err,
            ControlError::MissingReportField {
                field: "data_location",
                ..
            }
        ));
    }

    #[test]
    fn test_build_requires_data_period() {
        let err = QualityReport::builder()
            .statistics_name("Befolkning")
            .data_location("data.csv")
            .build(&ControlCollector::new())
            .unwrap_err();
        assert_eq!(err.error_code(), "MISSING_REPORT_FIELD");
    }

    #[test]
    fn test_empty_collector_has_no_result_types() {
        let report = QualityReport::builder()
            .statistics_name("Befolkning")
            .data_location("data.csv")
            .data_period("2024")
            .build(&ControlCollector::new())
            .unwrap();
        assert!(report.result_types.is_empty());
        assert!(report.errors.is_empty());
        assert_eq!(report.quality_control_id, DEFAULT_QUALITY_CONTROL_ID);
    }

    #[test]
    fn test_json_layout() {
        let value = report().to_value().unwrap();
        assert_eq!(value["statistikknavn"], json!("Befolkning"));
        assert_eq!(value["data_plassering"], json!(["data/befolkning.parquet"]));
        assert_eq!(value["data_periode"], json!("2024"));
        assert_eq!(value["kvalitetsrapport opprettet"], json!("2024-03-01T12:30:00"));
        assert_eq!(
            value["typer_kontrollutslag"],
            json!(["POSSIBLE_ERROR", "ABSOLUTE_ERROR"])
        );
        assert_eq!(value["kontrollutslag"][1]["observasjon_id"], json!(3));
    }

    #[test]
    fn test_value_round_trip() {
        let original = report();
        let restored = QualityReport::from_value(original.to_value().unwrap()).unwrap();
        assert_eq!(restored, original);
    }

    #[test]
    fn test_reads_legacy_report() {
        let legacy = json!({
            "statistikknavn": "Næringsstatistikk",
            "quality_control_id": "ref",
            "data_plassering": ["gs://bucket/data.parquet"],
            "data_periode": "2023",
            "kvalitetsrapport opprettet": "2023-11-02T08:15:30.123456",
            "typer_kontrollutslag": ["OK"],
            "kontrollutslag": [],
            "kontrolldokumentasjon": {}
        });
        let report = QualityReport::from_value(legacy).unwrap();
        assert!(report.result_types.is_empty());
        assert_eq!(report.statistics_name, "Næringsstatistikk");
    }

    #[test]
    fn test_reads_legacy_report_with_float_ids() {
        let legacy = json!({
            "statistikknavn": "Befolkning",
            "quality_control_id": "ref",
            "data_plassering": ["data.parquet"],
            "data_periode": "2023",
            "kvalitetsrapport opprettet": "2023-11-02T08:15:30",
            "typer_kontrollutslag": ["MULIG_FEIL"],
            "kontrollutslag": [{
                "kontrollnavn": "alder_hoy",
                "kontrolltype": "MULIG_FEIL",
                "observasjon_id": 1.0,
                "feilbeskrivelse": "Veldig høy alder",
                "relevante_variabler": ["Alder"]
            }],
            "kontrolldokumentasjon": {}
        });
        let report = QualityReport::from_value(legacy).unwrap();
        assert_eq!(report.errors[0].observation_id(), &ObservationId::Int(1));
        assert_eq!(report.result_types, vec![ControlType::PossibleError]);
    }

    #[test]
    fn test_findings_for_and_counts() {
        let report = report();
        assert_eq!(report.findings_for("alder_hoy").count(), 1);
        assert_eq!(report.findings_for("ukjent").count(), 0);

        let counts = report.counts_by_result_type();
        assert_eq!(counts[&ControlType::AbsoluteError], 1);
        assert!(!counts.contains_key(&ControlType::Missing));
    }

    #[test]
    fn test_load_missing_file_has_context() {
        let err = QualityReport::load("/nonexistent/dir/report.json").unwrap_err();
        assert!(matches!(err, ControlError::WithContext { .. }));
        assert_eq!(err.error_code(), "IO_ERROR");
    }
}
