use super::ControlOutcome;
use crate::types::{ControlDocumentation, ControlType, ErrorReport};
use polars::prelude::DataFrame;
use std::collections::{BTreeMap, BTreeSet};

/// Findings and documentation accumulated over control runs.
///
/// Findings are append-only; documentation is keyed by control name and
/// overwritten when a control runs again. Nothing is cleared implicitly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControlCollector {
    errors: Vec<ErrorReport>,
    documentation: BTreeMap<String, ControlDocumentation>,
}

impl ControlCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an outcome and hand back its data.
    pub fn record(&mut self, outcome: ControlOutcome) -> DataFrame {
        self.errors.extend(outcome.findings);
        self.documentation.extend(outcome.documentation);
        outcome.data
    }

    pub fn errors(&self) -> &[ErrorReport] {
        &self.errors
    }

    pub fn documentation(&self) -> &BTreeMap<String, ControlDocumentation> {
        &self.documentation
    }

    /// Distinct result types among the findings, in enum order.
    pub fn observed_result_types(&self) -> Vec<ControlType> {
        self.errors
            .iter()
            .map(ErrorReport::result_type)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn clear(&mut self) {
        self.errors.clear();
        self.documentation.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty() && self.documentation.is_empty()
    }
}
