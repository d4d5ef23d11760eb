//! Control definition and execution.

use super::{CORRECTION_COLUMN, FLAG_COLUMN};
use crate::control::ControlCollector;
use crate::error::{ControlError, Result, ResultExt};
use crate::types::{ControlDocumentation, ControlType, ErrorReport};
use crate::utils::{has_column, observation_id_from, require_series};
use polars::prelude::*;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, warn};

/// Check function: receives the rows to check with the flag column set to
/// `false` and returns them with flagged rows set to `true`.
pub type CheckFn = Box<dyn Fn(DataFrame) -> Result<DataFrame> + Send + Sync>;

/// Row predicate restricting which rows a control checks.
pub type RowFilter = Box<dyn Fn(&DataFrame) -> Result<BooleanChunked> + Send + Sync>;

/// Whether a control flags suspicious rows or records automatic corrections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    /// Marks rows in [`FLAG_COLUMN`].
    Check,
    /// Marks rows in [`CORRECTION_COLUMN`], always [`ControlType::AutomaticCorrection`].
    AutomaticCorrection,
}

impl ControlKind {
    pub fn flag_column(&self) -> &'static str {
        match self {
            Self::Check => FLAG_COLUMN,
            Self::AutomaticCorrection => CORRECTION_COLUMN,
        }
    }
}

/// Result of applying a control without recording it.
#[derive(Debug, Clone)]
pub struct ControlOutcome {
    /// The checked rows, without the flag column.
    pub data: DataFrame,
    /// Findings in execution order; nested corrections come first.
    pub findings: Vec<ErrorReport>,
    /// Documentation entries for this control and its nested corrections.
    pub documentation: BTreeMap<String, ControlDocumentation>,
}

/// A named check with its result type and reporting metadata.
pub struct Control {
    name: String,
    kind: ControlKind,
    result_type: ControlType,
    description: String,
    docstring: Option<String>,
    id_column: String,
    important_variables: Option<Vec<String>>,
    filter: Option<RowFilter>,
    check: CheckFn,
    corrections: Vec<Control>,
}

static_assertions::assert_impl_all!(Control: Send, Sync);

impl fmt::Debug for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Control")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("result_type", &self.result_type)
            .field("description", &self.description)
            .field("id_column", &self.id_column)
            .field("important_variables", &self.important_variables)
            .field("has_filter", &self.filter.is_some())
            .field("corrections", &self.corrections)
            .finish()
    }
}

impl Control {
    /// Start building a control that flags rows with the given result type.
    pub fn builder(name: impl Into<String>, result_type: ControlType) -> ControlBuilder {
        ControlBuilder::new(name.into(), ControlKind::Check, result_type)
    }

    /// Start building an automatic correction.
    ///
    /// The check marks corrected rows in [`CORRECTION_COLUMN`]; the
    /// description set on the builder is the correction description.
    pub fn automatic_correction(name: impl Into<String>) -> ControlBuilder {
        ControlBuilder::new(
            name.into(),
            ControlKind::AutomaticCorrection,
            ControlType::AutomaticCorrection,
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ControlKind {
        self.kind
    }

    pub fn result_type(&self) -> ControlType {
        self.result_type
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Run the control and record its findings in `collector`.
    ///
    /// Returns the checked rows without the flag column.
    pub fn run(&self, data: DataFrame, collector: &mut ControlCollector) -> Result<DataFrame> {
        let outcome = self.apply(data)?;
        Ok(collector.record(outcome))
    }

    /// Run the control without recording anything.
    pub fn apply(&self, data: DataFrame) -> Result<ControlOutcome> {
        let flag = self.kind.flag_column();
        let mut data = data;

        if has_column(&data, flag) {
            data = data.drop(flag)?;
            debug!("Control '{}': dropped existing '{}' column", self.name, flag);
        }

        let units_in_dataset = data.height();
        match &self.filter {
            Some(filter) => {
                let mask = filter(&data).context(format!("Filter of control '{}'", self.name))?;
                data = data.filter(&mask)?;
                if data.height() == units_in_dataset {
                    warn!(
                        "Control '{}': data before and after filter have the same length",
                        self.name
                    );
                }
            }
            None => warn!(
                "Control '{}' has no filter; units in dataset and units checked will be reported as equal",
                self.name
            ),
        }
        let units_checked = data.height();

        data.with_column(BooleanChunked::full(flag.into(), false, units_checked).into_series())?;
        let mut checked = (self.check)(data)?;
        self.ensure_row_count(&checked, units_checked)?;

        let mut findings = Vec::new();
        let mut documentation = BTreeMap::new();
        for correction in &self.corrections {
            let outcome = correction.apply(checked).context(format!(
                "Correction '{}' of control '{}'",
                correction.name, self.name
            ))?;
            checked = outcome.data;
            findings.extend(outcome.findings);
            documentation.extend(outcome.documentation);
        }

        self.ensure_row_count(&checked, units_checked)?;

        let flagged_rows = self.flagged_rows(&checked)?;
        findings.extend(self.error_reports(&checked, &flagged_rows)?);

        documentation.insert(
            self.name.clone(),
            ControlDocumentation {
                result_type: self.result_type,
                description: self.description.clone(),
                docstring: self.docstring.clone(),
                units_in_dataset,
                units_checked,
                units_flagged: flagged_rows.len(),
                important_variables: self.important_variables.clone(),
            },
        );

        debug!(
            "Control '{}': {} of {} checked units flagged ({} in dataset)",
            self.name,
            flagged_rows.len(),
            units_checked,
            units_in_dataset
        );

        let data = checked.drop(flag)?;
        Ok(ControlOutcome {
            data,
            findings,
            documentation,
        })
    }

    fn ensure_row_count(&self, checked: &DataFrame, expected: usize) -> Result<()> {
        if checked.height() != expected {
            return Err(ControlError::RowCountChanged {
                control: self.name.clone(),
                expected,
                actual: checked.height(),
            });
        }
        Ok(())
    }

    /// Row positions where the flag column is `true`. Nulls count as `false`.
    fn flagged_rows(&self, checked: &DataFrame) -> Result<Vec<usize>> {
        let flag = self.kind.flag_column();
        let series = checked
            .column(flag)
            .map_err(|_| ControlError::FlagColumnMissing {
                control: self.name.clone(),
                column: flag.to_string(),
            })?
            .as_materialized_series();

        let flags = series.bool().map_err(|_| ControlError::InvalidFlagColumn {
            control: self.name.clone(),
            column: flag.to_string(),
            dtype: series.dtype().to_string(),
        })?;

        Ok(flags
            .into_iter()
            .enumerate()
            .filter_map(|(row, flagged)| (flagged == Some(true)).then_some(row))
            .collect())
    }

    fn error_reports(&self, checked: &DataFrame, rows: &[usize]) -> Result<Vec<ErrorReport>> {
        let ids = require_series(checked, &self.id_column)?;

        rows.iter()
            .map(|&row| {
                let observation_id = observation_id_from(&ids.get(row)?).ok_or_else(|| {
                    ControlError::MissingObservationId {
                        control: self.name.clone(),
                        row,
                    }
                })?;
                Ok(ErrorReport::new(
                    self.name.clone(),
                    self.result_type,
                    observation_id,
                    Some(self.description.clone()),
                    self.important_variables.clone(),
                ))
            })
            .collect()
    }
}

/// Builder for [`Control`].
pub struct ControlBuilder {
    name: String,
    kind: ControlKind,
    result_type: ControlType,
    description: Option<String>,
    docstring: Option<String>,
    id_column: Option<String>,
    important_variables: Option<Vec<String>>,
    filter: Option<RowFilter>,
    check: Option<CheckFn>,
    corrections: Vec<Control>,
}

impl ControlBuilder {
    fn new(name: String, kind: ControlKind, result_type: ControlType) -> Self {
        Self {
            name,
            kind,
            result_type,
            description: None,
            docstring: None,
            id_column: None,
            important_variables: None,
            filter: None,
            check: None,
            corrections: Vec::new(),
        }
    }

    /// Description attached to every finding of this control.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Longer documentation of what the control checks.
    pub fn docstring(mut self, docstring: impl Into<String>) -> Self {
        self.docstring = Some(docstring.into());
        self
    }

    /// Column holding the row identifier.
    pub fn id_column(mut self, column: impl Into<String>) -> Self {
        self.id_column = Some(column.into());
        self
    }

    /// Variables relevant to the findings of this control.
    pub fn important_variables<I, S>(mut self, variables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.important_variables = Some(variables.into_iter().map(Into::into).collect());
        self
    }

    /// Restrict the checked rows to those where `filter` returns `true`.
    pub fn filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&DataFrame) -> Result<BooleanChunked> + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(filter));
        self
    }

    /// The check function.
    pub fn check<F>(mut self, check: F) -> Self
    where
        F: Fn(DataFrame) -> Result<DataFrame> + Send + Sync + 'static,
    {
        self.check = Some(Box::new(check));
        self
    }

    /// Run `correction` on the check output before the flags are read.
    ///
    /// The correction sees the flag column of this control.
    pub fn correction(mut self, correction: Control) -> Self {
        self.corrections.push(correction);
        self
    }

    pub fn build(self) -> Result<Control> {
        if self.name.trim().is_empty() {
            return Err(ControlError::InvalidControl(
                "control name must not be empty".to_string(),
            ));
        }
        let description = self.description.ok_or_else(|| {
            ControlError::InvalidControl(format!("control '{}' has no description", self.name))
        })?;
        let id_column = self.id_column.ok_or_else(|| {
            ControlError::InvalidControl(format!("control '{}' has no id column", self.name))
        })?;
        let check = self.check.ok_or_else(|| {
            ControlError::InvalidControl(format!("control '{}' has no check function", self.name))
        })?;

        let flag = self.kind.flag_column();
        if let Some(nested) = self
            .corrections
            .iter()
            .find(|c| c.kind.flag_column() == flag)
        {
            return Err(ControlError::InvalidControl(format!(
                "correction '{}' uses the same flag column '{}' as control '{}'",
                nested.name, flag, self.name
            )));
        }

        Ok(Control {
            name: self.name,
            kind: self.kind,
            result_type: self.result_type,
            description,
            docstring: self.docstring,
            id_column,
            important_variables: self.important_variables,
            filter: self.filter,
            check,
            corrections: self.corrections,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ObservationId;
    use pretty_assertions::assert_eq;

    fn ages() -> DataFrame {
        df![
            "Alder" => [120i64, 90, -50, 10, 20, 40],
            "ident" => [1i64, 2, 3, 4, 5, 6]
        ]
        .unwrap()
    }

    fn set_flags(mut data: DataFrame, column: &str, flags: BooleanChunked) -> Result<DataFrame> {
        data.with_column(flags.with_name(column.into()).into_series())?;
        Ok(data)
    }

    fn high_age() -> Control {
        Control::builder("alder_hoy", ControlType::PossibleError)
            .description("Veldig høy alder")
            .docstring("Sjekker etter ekstremt høy alder")
            .id_column("ident")
            .check(|data: DataFrame| {
                let flags = data.column("Alder")?.as_materialized_series().gt(100)?;
                set_flags(data, FLAG_COLUMN, flags)
            })
            .build()
            .unwrap()
    }

    fn negative_age() -> ControlBuilder {
        Control::builder("alder_negativ", ControlType::AbsoluteError)
            .description("Ugyldig verdi")
            .id_column("ident")
            .check(|data: DataFrame| {
                let flags = data.column("Alder")?.as_materialized_series().lt(0)?;
                set_flags(data, FLAG_COLUMN, flags)
            })
    }

    fn blank_invalid_age() -> Control {
        Control::automatic_correction("alder_negativ_retting")
            .description("Erstatter ugyldig alder med null")
            .id_column("ident")
            .check(|mut data: DataFrame| {
                let flagged = data
                    .column(FLAG_COLUMN)?
                    .as_materialized_series()
                    .bool()?
                    .clone();
                let ages = data
                    .column("Alder")?
                    .as_materialized_series()
                    .cast(&DataType::Float64)?;
                let corrected: Float64Chunked = ages
                    .f64()?
                    .into_iter()
                    .zip(flagged.into_iter())
                    .map(|(age, flag)| if flag == Some(true) { None } else { age })
                    .collect();
                data.with_column(corrected.with_name("Alder".into()).into_series())?;
                set_flags(data, CORRECTION_COLUMN, flagged)
            })
            .build()
            .unwrap()
    }

    #[test]
    fn test_flags_rows_and_builds_reports() {
        let outcome = high_age().apply(ages()).unwrap();

        assert_eq!(outcome.findings.len(), 1);
        let finding = &outcome.findings[0];
        assert_eq!(finding.control_name(), "alder_hoy");
        assert_eq!(finding.result_type(), ControlType::PossibleError);
        assert_eq!(finding.observation_id(), &ObservationId::Int(1));
        assert_eq!(finding.description(), Some("Veldig høy alder"));
    }

    #[test]
    fn test_flag_column_removed_from_result() {
        let outcome = high_age().apply(ages()).unwrap();
        assert!(!has_column(&outcome.data, FLAG_COLUMN));
        assert_eq!(outcome.data.height(), 6);
        assert_eq!(outcome.data.width(), 2);
    }

    #[test]
    fn test_rerun_drops_existing_flag_column() {
        let mut data = ages();
        data.with_column(Series::new(FLAG_COLUMN.into(), &[true, true, true, true, true, true]))
            .unwrap();

        let outcome = high_age().apply(data).unwrap();

        assert_eq!(outcome.findings.len(), 1);
        assert_eq!(outcome.findings[0].observation_id(), &ObservationId::Int(1));
    }

    #[test]
    fn test_documentation_without_filter() {
        let outcome = high_age().apply(ages()).unwrap();
        let doc = &outcome.documentation["alder_hoy"];

        assert_eq!(doc.units_in_dataset, 6);
        assert_eq!(doc.units_checked, 6);
        assert_eq!(doc.units_flagged, 1);
        assert_eq!(doc.docstring.as_deref(), Some("Sjekker etter ekstremt høy alder"));
        assert_eq!(doc.result_type, ControlType::PossibleError);
    }

    #[test]
    fn test_filter_restricts_checked_units() {
        let control = negative_age()
            .filter(|data: &DataFrame| {
                Ok(data.column("ident")?.as_materialized_series().lt_eq(4)?)
            })
            .build()
            .unwrap();

        let outcome = control.apply(ages()).unwrap();
        let doc = &outcome.documentation["alder_negativ"];

        assert_eq!(doc.units_in_dataset, 6);
        assert_eq!(doc.units_checked, 4);
        assert_eq!(doc.units_flagged, 1);
        assert_eq!(outcome.data.height(), 4);
    }

    #[test]
    fn test_null_flags_count_as_false() {
        let control = Control::builder("nullflagg", ControlType::Missing)
            .description("Mangler verdi")
            .id_column("ident")
            .check(|mut data: DataFrame| {
                data.with_column(Series::new(
                    FLAG_COLUMN.into(),
                    &[Some(true), None, None, Some(false), None, None],
                ))?;
                Ok(data)
            })
            .build()
            .unwrap();

        let outcome = control.apply(ages()).unwrap();
        assert_eq!(outcome.findings.len(), 1);
    }

    #[test]
    fn test_check_dropping_flag_column_fails() {
        let control = Control::builder("dropper", ControlType::Missing)
            .description("d")
            .id_column("ident")
            .check(|data: DataFrame| Ok(data.drop(FLAG_COLUMN)?))
            .build()
            .unwrap();

        assert!(matches!(
            control.apply(ages()),
            Err(ControlError::FlagColumnMissing { .. })
        ));
    }

    #[test]
    fn test_non_boolean_flag_column_fails() {
        let control = Control::builder("tall", ControlType::Missing)
            .description("d")
            .id_column("ident")
            .check(|mut data: DataFrame| {
                data.with_column(Series::new(FLAG_COLUMN.into(), &[1i32, 0, 0, 0, 0, 0]))?;
                Ok(data)
            })
            .build()
            .unwrap();

        assert!(matches!(
            control.apply(ages()),
            Err(ControlError::InvalidFlagColumn { .. })
        ));
    }

    #[test]
    fn test_row_count_change_fails() {
        let control = Control::builder("kutter", ControlType::Missing)
            .description("d")
            .id_column("ident")
            .check(|data: DataFrame| Ok(data.head(Some(2))))
            .build()
            .unwrap();

        assert!(matches!(
            control.apply(ages()),
            Err(ControlError::RowCountChanged {
                expected: 6,
                actual: 2,
                ..
            })
        ));
    }

    #[test]
    fn test_missing_id_column_fails() {
        let control = Control::builder("alder_hoy", ControlType::PossibleError)
            .description("Veldig høy alder")
            .id_column("orgnr")
            .check(|data: DataFrame| Ok(data))
            .build()
            .unwrap();

        assert!(matches!(
            control.apply(ages()),
            Err(ControlError::ColumnNotFound(column)) if column == "orgnr"
        ));
    }

    #[test]
    fn test_check_errors_propagate() {
        let control = Control::builder("feiler", ControlType::Missing)
            .description("d")
            .id_column("ident")
            .check(|_data: DataFrame| Err(ControlError::ColumnNotFound("Inntekt".to_string())))
            .build()
            .unwrap();

        assert!(matches!(
            control.apply(ages()),
            Err(ControlError::ColumnNotFound(column)) if column == "Inntekt"
        ));
    }

    #[test]
    fn test_text_identifiers() {
        let data = df![
            "Alder" => [101i64, 30],
            "orgnr" => ["974760673", "912345678"]
        ]
        .unwrap();
        let control = Control::builder("alder_hoy", ControlType::PossibleError)
            .description("Veldig høy alder")
            .id_column("orgnr")
            .important_variables(["Alder"])
            .check(|data: DataFrame| {
                let flags = data.column("Alder")?.as_materialized_series().gt(100)?;
                set_flags(data, FLAG_COLUMN, flags)
            })
            .build()
            .unwrap();

        let outcome = control.apply(data).unwrap();
        assert_eq!(
            outcome.findings[0].observation_id(),
            &ObservationId::Text("974760673".to_string())
        );
        assert_eq!(outcome.findings[0].important_variables(), ["Alder".to_string()]);
    }

    #[test]
    fn test_nested_correction_records_both() {
        let control = negative_age().correction(blank_invalid_age()).build().unwrap();

        let outcome = control.apply(ages()).unwrap();

        assert_eq!(outcome.findings.len(), 2);
        assert_eq!(
            outcome.findings[0].result_type(),
            ControlType::AutomaticCorrection
        );
        assert_eq!(outcome.findings[1].result_type(), ControlType::AbsoluteError);
        assert_eq!(outcome.findings[1].observation_id(), &ObservationId::Int(3));
        assert!(outcome.documentation.contains_key("alder_negativ"));
        assert!(outcome.documentation.contains_key("alder_negativ_retting"));
        assert!(!has_column(&outcome.data, FLAG_COLUMN));
        assert!(!has_column(&outcome.data, CORRECTION_COLUMN));
        assert_eq!(outcome.data.column("Alder").unwrap().null_count(), 1);
    }

    #[test]
    fn test_builder_requires_check() {
        let result = Control::builder("tom", ControlType::Missing)
            .description("d")
            .id_column("ident")
            .build();
        assert!(matches!(result, Err(ControlError::InvalidControl(_))));
    }

    #[test]
    fn test_builder_rejects_shared_flag_column() {
        let nested = negative_age().build().unwrap();
        let result = negative_age().correction(nested).build();
        assert!(matches!(result, Err(ControlError::InvalidControl(_))));
    }
}
