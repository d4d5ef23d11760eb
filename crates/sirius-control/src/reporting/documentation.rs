use super::QualityReport;
use crate::error::Result;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// One row of the external control register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlRegisterRow {
    pub periode: String,
    pub kontroll_id: String,
    pub kontrolltype: String,
    pub feilbeskrivelse: String,
}

fn join_variables(variables: Option<&[String]>) -> Option<String> {
    variables
        .filter(|vars| !vars.is_empty())
        .map(|vars| vars.join(", "))
}

/// Overview of every control in the report, one row per control.
pub fn control_documentation_table(report: &QualityReport) -> Result<DataFrame> {
    let docs = &report.documentation;

    let ids: Vec<&str> = docs.keys().map(String::as_str).collect();
    let types: Vec<&str> = docs.values().map(|d| d.result_type.name()).collect();
    let descriptions: Vec<&str> = docs.values().map(|d| d.description.as_str()).collect();
    let docstrings: Vec<Option<&str>> = docs.values().map(|d| d.docstring.as_deref()).collect();
    let in_dataset: Vec<u64> = docs.values().map(|d| d.units_in_dataset as u64).collect();
    let checked: Vec<u64> = docs.values().map(|d| d.units_checked as u64).collect();
    let flagged: Vec<u64> = docs.values().map(|d| d.units_flagged as u64).collect();
    let variables: Vec<Option<String>> = docs
        .values()
        .map(|d| join_variables(d.important_variables.as_deref()))
        .collect();
    let periods = vec![report.data_period.as_str(); docs.len()];

    let table = DataFrame::new(vec![
        Series::new("kontroll_id".into(), ids).into(),
        Series::new("kontrolltype".into(), types).into(),
        Series::new("feilbeskrivelse".into(), descriptions).into(),
        Series::new("docstring".into(), docstrings).into(),
        Series::new("Enheter i datasettet".into(), in_dataset).into(),
        Series::new("Enheter kontrollert".into(), checked).into(),
        Series::new("Kontrollutslag".into(), flagged).into(),
        Series::new("Relevante variabler".into(), variables).into(),
        Series::new("periode".into(), periods).into(),
    ])?;
    Ok(table)
}

/// All findings of the report, one row per finding.
pub fn findings_table(report: &QualityReport) -> Result<DataFrame> {
    let errors = &report.errors;

    let names: Vec<&str> = errors.iter().map(|e| e.control_name()).collect();
    let types: Vec<&str> = errors.iter().map(|e| e.result_type().name()).collect();
    let ids: Vec<String> = errors.iter().map(|e| e.observation_id().to_string()).collect();
    let descriptions: Vec<Option<&str>> = errors.iter().map(|e| e.description()).collect();
    let variables: Vec<Option<String>> = errors
        .iter()
        .map(|e| join_variables(Some(e.important_variables())))
        .collect();

    let table = DataFrame::new(vec![
        Series::new("kontrollnavn".into(), names).into(),
        Series::new("kontrolltype".into(), types).into(),
        Series::new("observasjon_id".into(), ids).into(),
        Series::new("feilbeskrivelse".into(), descriptions).into(),
        Series::new("relevante_variabler".into(), variables).into(),
    ])?;
    Ok(table)
}

/// Rows for registering the report's controls in a control register.
pub fn control_register_rows(report: &QualityReport) -> Vec<ControlRegisterRow> {
    report
        .documentation
        .iter()
        .map(|(control, doc)| ControlRegisterRow {
            periode: report.data_period.clone(),
            kontroll_id: control.clone(),
            kontrolltype: doc.result_type.name().to_string(),
            feilbeskrivelse: doc.description.clone(),
        })
        .collect()
}
