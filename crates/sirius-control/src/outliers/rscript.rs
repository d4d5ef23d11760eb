//! [`OutlierMethods`] backed by the Kostra R package, run through `Rscript`.
//!
//! Data is exchanged as CSV files in a temporary directory that is removed
//! when the call returns.

use super::method::{OutlierMethods, RatioFields};
use crate::config::{HbParams, KostraConfig};
use crate::error::Result;
use crate::utils::{read_csv_with_dtypes, write_csv};
use anyhow::{Context, bail};
use once_cell::sync::OnceCell;
use polars::prelude::DataFrame;
use std::fs;
use std::path::Path;
use std::process::Command;
use std::time::Instant;
use tracing::{debug, info};

/// Runs `Hb` and `ThError` from the Kostra package.
#[derive(Debug)]
pub struct RscriptKostra {
    config: KostraConfig,
    loaded: OnceCell<()>,
}

static_assertions::assert_impl_all!(RscriptKostra: Send, Sync);

/// Quote a value as an R string literal.
fn r_string(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

fn r_path(path: &Path) -> String {
    r_string(&path.to_string_lossy().replace('\\', "/"))
}

/// `colClasses` argument reading the id column as character.
fn id_col_classes(id: &str) -> String {
    format!("setNames(\"character\", {})", r_string(id))
}

/// Read the method result, giving the id column the dtype it has in `input`.
fn read_result(path: &Path, input: &DataFrame, id: &str) -> anyhow::Result<DataFrame> {
    let id_dtype = input
        .column(id)
        .with_context(|| format!("Id column {} not in input", id))?
        .dtype()
        .clone();
    Ok(read_csv_with_dtypes(path, &[(id, id_dtype)])?)
}

impl RscriptKostra {
    pub fn new(config: KostraConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            loaded: OnceCell::new(),
        })
    }

    pub fn config(&self) -> &KostraConfig {
        &self.config
    }

    fn library_call(&self) -> String {
        format!(
            "suppressPackageStartupMessages(library({}, character.only = TRUE))",
            r_string(&self.config.package)
        )
    }

    fn run_script(&self, script: &str) -> anyhow::Result<String> {
        let output = Command::new(&self.config.rscript)
            .arg("--vanilla")
            .arg("-e")
            .arg(script)
            .output()
            .with_context(|| format!("Failed to start {}", self.config.rscript.display()))?;

        if !output.status.success() {
            bail!(
                "Rscript exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Check once that the package can be loaded.
    fn ensure_loaded(&self) -> anyhow::Result<()> {
        self.loaded
            .get_or_try_init(|| {
                let start = Instant::now();
                self.run_script(&self.library_call())
                    .with_context(|| format!("Loading R package {}", self.config.package))?;
                info!(
                    "Finished loading {} in {:.3} seconds",
                    self.config.package,
                    start.elapsed().as_secs_f64()
                );
                Ok(())
            })
            .map(|_| ())
    }

    /// Write `data`, call `call` on it as `data` and read back `result`.
    ///
    /// The `id` column is read as text in R, and read back with its dtype
    /// in `data`.
    fn call_method(&self, data: &DataFrame, id: &str, call: &str) -> anyhow::Result<DataFrame> {
        self.ensure_loaded()?;

        let dir = tempfile::tempdir().context("Creating exchange directory")?;
        let input = dir.path().join("input.csv");
        let output = dir.path().join("result.csv");

        let mut exchanged = data.clone();
        write_csv(&mut exchanged, &input)?;

        let script = format!(
            "{library}\n\
             data <- read.csv({input}, stringsAsFactors = FALSE, check.names = FALSE, \
             colClasses = {classes})\n\
             result <- {call}\n\
             write.csv(result, {output}, row.names = FALSE)\n",
            library = self.library_call(),
            input = r_path(&input),
            classes = id_col_classes(id),
            call = call,
            output = r_path(&output),
        );
        debug!("Running Kostra: {}", call);
        self.run_script(&script)?;

        if !fs::exists(&output)? {
            bail!("{} did not write a result", call);
        }
        read_result(&output, data, id)
    }
}

impl OutlierMethods for RscriptKostra {
    fn th_error(&self, data: &DataFrame, fields: &RatioFields) -> anyhow::Result<DataFrame> {
        let call = format!(
            "ThError(data = data, id = {}, x1 = {}, x2 = {})",
            r_string(&fields.id),
            r_string(&fields.x1),
            r_string(&fields.x2)
        );
        self.call_method(data, &fields.id, &call)
    }

    fn hb(
        &self,
        data: &DataFrame,
        fields: &RatioFields,
        params: &HbParams,
    ) -> anyhow::Result<DataFrame> {
        let call = format!(
            "Hb(data = data, id = {}, x1 = {}, x2 = {}, pC = {}, pU = {}, pA = {})",
            r_string(&fields.id),
            r_string(&fields.x1),
            r_string(&fields.x2),
            params.p_c,
            params.p_u,
            params.p_a
        );
        self.call_method(data, &fields.id, &call)
    }

    fn name(&self) -> &str {
        "Kostra"
    }
}
