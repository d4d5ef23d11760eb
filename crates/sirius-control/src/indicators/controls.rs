use crate::error::Result;
use crate::reporting::QualityReport;
use crate::types::ObservationId;
use crate::utils::percentage;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Flagged share of the checked units for one control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlTriggerRatio {
    pub control: String,
    pub units_checked: usize,
    pub units_flagged: usize,
    pub ratio: Option<f64>,
}

/// Flagged share of the checked units over all controls of a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerRatio {
    pub total: Option<f64>,
    pub per_control: Vec<ControlTriggerRatio>,
}

impl TriggerRatio {
    pub fn to_frame(&self) -> Result<DataFrame> {
        let rows = &self.per_control;
        Ok(DataFrame::new(vec![
            Series::new(
                "kontroll_id".into(),
                rows.iter().map(|r| r.control.as_str()).collect::<Vec<_>>(),
            )
            .into(),
            Series::new(
                "kontrollutslagsandel".into(),
                rows.iter().map(|r| r.ratio).collect::<Vec<_>>(),
            )
            .into(),
            Series::new(
                "Enheter kontrollert".into(),
                rows.iter().map(|r| r.units_checked as u64).collect::<Vec<_>>(),
            )
            .into(),
            Series::new(
                "Kontrollutslag".into(),
                rows.iter().map(|r| r.units_flagged as u64).collect::<Vec<_>>(),
            )
            .into(),
        ])?)
    }
}

fn ratio(part: usize, whole: usize) -> Option<f64> {
    (whole > 0).then(|| part as f64 / whole as f64)
}

/// Share of checked units that were flagged, as a fraction.
pub fn trigger_ratio(report: &QualityReport) -> TriggerRatio {
    let per_control: Vec<ControlTriggerRatio> = report
        .documentation
        .iter()
        .map(|(control, doc)| ControlTriggerRatio {
            control: control.clone(),
            units_checked: doc.units_checked,
            units_flagged: doc.units_flagged,
            ratio: ratio(doc.units_flagged, doc.units_checked),
        })
        .collect();

    let flagged = per_control.iter().map(|r| r.units_flagged).sum();
    let checked = per_control.iter().map(|r| r.units_checked).sum();

    TriggerRatio {
        total: ratio(flagged, checked),
        per_control,
    }
}

/// How many flagged cells were later edited, in percent of the flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Accuracy {
    pub total: Option<f64>,
    pub per_control: BTreeMap<String, Option<f64>>,
}

/// Compare the flagged cells of each control with the edits made.
///
/// A flagged cell is an (observation, variable) pair for every relevant
/// variable of a finding. `edits` lists the changed cells; identifiers are
/// compared by their text form.
pub fn accuracy(report: &QualityReport, edits: &[(ObservationId, String)]) -> Accuracy {
    let mut per_control = BTreeMap::new();
    let mut total_flagged = 0;
    let mut total_hits = 0;

    for (control, doc) in &report.documentation {
        let flagged_cells: HashSet<(String, &str)> = report
            .findings_for(control)
            .flat_map(|finding| {
                let id = finding.observation_id().to_string();
                finding
                    .important_variables()
                    .iter()
                    .map(move |var| (id.clone(), var.as_str()))
            })
            .collect();

        let hits = edits
            .iter()
            .filter(|(id, var)| flagged_cells.contains(&(id.to_string(), var.as_str())))
            .count();

        total_flagged += doc.units_flagged;
        total_hits += hits;
        per_control.insert(
            control.clone(),
            percentage(hits as f64, doc.units_flagged as f64),
        );
    }

    Accuracy {
        total: percentage(total_hits as f64, total_flagged as f64),
        per_control,
    }
}
