use crate::error::Result;
use crate::utils::{group_key_from, numeric_values, percentage, require_series, row_group_keys};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Share of edited units within one group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupEditRatio {
    /// Values of the grouping columns, in the order they were given.
    pub group: Vec<String>,
    pub units: usize,
    pub edited_units: usize,
    /// `edited_units / units * 100`.
    pub edit_ratio: Option<f64>,
}

/// Effect of editing on one key variable within one group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditEffect {
    pub group: Vec<String>,
    pub variable: String,
    /// Sum over the edited data.
    pub edited: f64,
    /// Sum over the data as received.
    pub unedited: f64,
    /// `(unedited - edited) / edited * 100`.
    pub effect: Option<f64>,
}

/// Distinct non-null identifiers of a column.
fn unique_ids(df: &DataFrame, ident: &str) -> Result<HashSet<String>> {
    let series = require_series(df, ident)?;
    let mut ids = HashSet::new();
    for row in 0..series.len() {
        if let Some(id) = group_key_from(&series.get(row)?) {
            ids.insert(id);
        }
    }
    Ok(ids)
}

fn unique_ids_by_group(
    df: &DataFrame,
    ident: &str,
    groups: &[&str],
) -> Result<BTreeMap<Vec<String>, HashSet<String>>> {
    let series = require_series(df, ident)?;
    let keys = row_group_keys(df, groups)?;

    let mut by_group: BTreeMap<Vec<String>, HashSet<String>> = BTreeMap::new();
    for (row, key) in keys.into_iter().enumerate() {
        let Some(key) = key else { continue };
        let ids = by_group.entry(key).or_default();
        if let Some(id) = group_key_from(&series.get(row)?) {
            ids.insert(id);
        }
    }
    Ok(by_group)
}

/// Percentage of units in `current` that appear in `changes`.
///
/// Computed as distinct identifiers in `changes` over distinct identifiers
/// in `current`, times 100. `None` when `current` has no identifiers.
pub fn edit_ratio(current: &DataFrame, changes: &DataFrame, ident: &str) -> Result<Option<f64>> {
    let total = unique_ids(current, ident)?.len();
    let edited = unique_ids(changes, ident)?.len();
    debug!("Edit ratio: {} edited of {} units", edited, total);
    Ok(percentage(edited as f64, total as f64))
}

/// [`edit_ratio`] per group of `current`.
///
/// Groups that only occur in `changes` are ignored; groups without changes
/// get zero edited units. Rows with a null group key are left out.
pub fn edit_ratio_by_group(
    current: &DataFrame,
    changes: &DataFrame,
    ident: &str,
    groups: &[&str],
) -> Result<Vec<GroupEditRatio>> {
    let units = unique_ids_by_group(current, ident, groups)?;
    let edited = unique_ids_by_group(changes, ident, groups)?;

    Ok(units
        .into_iter()
        .map(|(group, ids)| {
            let edited_units = edited.get(&group).map_or(0, HashSet::len);
            GroupEditRatio {
                edit_ratio: percentage(edited_units as f64, ids.len() as f64),
                units: ids.len(),
                edited_units,
                group,
            }
        })
        .collect())
}

/// Tabular form of [`edit_ratio_by_group`].
pub fn edit_ratios_to_frame(rows: &[GroupEditRatio], groups: &[&str]) -> Result<DataFrame> {
    let mut columns = group_columns(rows.iter().map(|r| &r.group), groups);
    columns.push(
        Series::new(
            "units".into(),
            rows.iter().map(|r| r.units as u64).collect::<Vec<_>>(),
        )
        .into(),
    );
    columns.push(
        Series::new(
            "edited_units".into(),
            rows.iter().map(|r| r.edited_units as u64).collect::<Vec<_>>(),
        )
        .into(),
    );
    columns.push(
        Series::new(
            "editeringsandel".into(),
            rows.iter().map(|r| r.edit_ratio).collect::<Vec<_>>(),
        )
        .into(),
    );
    Ok(DataFrame::new(columns)?)
}

/// Sums of each key variable per group, skipping null values and rows
/// with a null group key.
fn sums_by_group(
    df: &DataFrame,
    key_vars: &[&str],
    groups: &[&str],
) -> Result<BTreeMap<(Vec<String>, String), f64>> {
    let keys = row_group_keys(df, groups)?;
    let mut sums = BTreeMap::new();

    for var in key_vars {
        let values = numeric_values(df, var)?;
        for (key, value) in keys.iter().zip(values) {
            let Some(key) = key else { continue };
            let sum = sums.entry((key.clone(), var.to_string())).or_insert(0.0);
            if let Some(v) = value {
                *sum += v;
            }
        }
    }
    Ok(sums)
}

/// Effect of editing on the key variables, per group and variable.
///
/// Only groups present in both frames are compared.
pub fn edit_effect(
    current: &DataFrame,
    original: &DataFrame,
    ident: &str,
    key_vars: &[&str],
    groups: &[&str],
) -> Result<Vec<EditEffect>> {
    require_series(current, ident)?;
    require_series(original, ident)?;

    let edited = sums_by_group(current, key_vars, groups)?;
    let unedited = sums_by_group(original, key_vars, groups)?;

    Ok(edited
        .into_iter()
        .filter_map(|(key, edited)| {
            let unedited = *unedited.get(&key)?;
            let (group, variable) = key;
            Some(EditEffect {
                group,
                variable,
                edited,
                unedited,
                effect: percentage(unedited - edited, edited),
            })
        })
        .collect())
}

/// Tabular form of [`edit_effect`].
pub fn edit_effects_to_frame(rows: &[EditEffect], groups: &[&str]) -> Result<DataFrame> {
    let mut columns = group_columns(rows.iter().map(|r| &r.group), groups);
    columns.push(
        Series::new(
            "variable".into(),
            rows.iter().map(|r| r.variable.as_str()).collect::<Vec<_>>(),
        )
        .into(),
    );
    columns.push(Series::new("editert".into(), rows.iter().map(|r| r.edited).collect::<Vec<_>>()).into());
    columns.push(
        Series::new(
            "ueditert".into(),
            rows.iter().map(|r| r.unedited).collect::<Vec<_>>(),
        )
        .into(),
    );
    columns.push(
        Series::new(
            "effekt av editering".into(),
            rows.iter().map(|r| r.effect).collect::<Vec<_>>(),
        )
        .into(),
    );
    Ok(DataFrame::new(columns)?)
}

fn group_columns<'a>(
    keys: impl Iterator<Item = &'a Vec<String>> + Clone,
    groups: &[&str],
) -> Vec<Column> {
    groups
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let values: Vec<&str> = keys
                .clone()
                .map(|key| key.get(i).map_or("", String::as_str))
                .collect();
            Series::new((*name).into(), values).into()
        })
        .collect()
}
