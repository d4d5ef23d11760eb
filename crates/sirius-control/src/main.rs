//! CLI for inspecting quality reports and running the HB method.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use serde_json::json;
use sirius_control::QualityReport;
use sirius_control::indicators::trigger_ratio;
use sirius_control::reporting::{control_documentation_table, findings_table};
use std::path::{Path, PathBuf};
use tracing::info;

#[cfg(feature = "kostra")]
use sirius_control::{HbParams, KostraConfig};

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Quality-control reports and outlier checks",
    long_about = "Inspect saved quality reports and run the HB outlier method.\n\n\
                  ENVIRONMENT VARIABLES:\n  \
                  SIRIUS_RSCRIPT    Rscript program used for the Kostra methods\n\n\
                  EXAMPLES:\n  \
                  # Overview of a saved report\n  \
                  sirius-control inspect --report rapporter/befolkning_2024.json\n\n  \
                  # HB outliers of turnover against last year\n  \
                  sirius-control hb --input data.csv --ident orgnr --variable omsetning\n\n  \
                  # Same, with ThError outliers removed first\n  \
                  sirius-control hb --input data.csv --ident orgnr --variable omsetning --th-error"
)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Only show warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the control overview of a saved quality report
    Inspect {
        /// Path to the report JSON file
        #[arg(short, long)]
        report: PathBuf,

        /// Also list every finding
        #[arg(long)]
        findings: bool,

        /// Output JSON to stdout instead of tables
        #[arg(long)]
        json: bool,
    },

    /// Run the HB method and print the significant outliers
    #[cfg(feature = "kostra")]
    Hb {
        /// CSV file with the current and previous values
        #[arg(short, long)]
        input: PathBuf,

        /// Identifier column
        #[arg(long)]
        ident: String,

        /// Variable to check; its previous value is read from `<variable>_1`
        #[arg(long)]
        variable: String,

        /// pC: length of the confidence interval
        #[arg(long, default_value = "20")]
        p_c: i32,

        /// pU: adjustment for the level of the variables
        #[arg(long, default_value = "0.5")]
        p_u: f64,

        /// pA: adjustment for small quartile distances
        #[arg(long, default_value = "0.05")]
        p_a: f64,

        /// Comparison applied to maxX (>, >=, <, <=, ==, !=)
        #[arg(long, default_value = ">")]
        filter_op: String,

        /// Value maxX is compared with
        #[arg(long, default_value = "0")]
        filter_value: f64,

        /// Drop the ThError outliers before running HB
        #[arg(long)]
        th_error: bool,
    },
}

impl Command {
    fn prints_json(&self) -> bool {
        matches!(self, Command::Inspect { json: true, .. })
    }
}

/// Initialize the tracing subscriber for logging.
///
/// Logging stays off for JSON output so stdout only holds the JSON.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level, args.quiet, args.command.prints_json());

    dotenv().ok();

    match args.command {
        Command::Inspect {
            report,
            findings,
            json,
        } => inspect(&report, findings, json),
        #[cfg(feature = "kostra")]
        Command::Hb {
            input,
            ident,
            variable,
            p_c,
            p_u,
            p_a,
            filter_op,
            filter_value,
            th_error,
        } => {
            let params = HbParams::builder().p_c(p_c).p_u(p_u).p_a(p_a).build()?;
            let filter = (filter_op.as_str(), filter_value);
            run_hb(&input, &ident, &variable, &params, filter, th_error)
        }
    }
}

/// Print the overview of a saved report.
///
/// Uses `println!` for the tables; they are the output of the command.
fn inspect(path: &Path, show_findings: bool, json_output: bool) -> Result<()> {
    let report = QualityReport::load(path)
        .with_context(|| format!("Could not load report {}", path.display()))?;
    let ratios = trigger_ratio(&report);
    let counts = report.counts_by_result_type();

    if json_output {
        let counts: serde_json::Map<String, serde_json::Value> = counts
            .iter()
            .map(|(kind, count)| (kind.to_string(), json!(count)))
            .collect();
        let findings = if show_findings {
            json!(report.errors)
        } else {
            serde_json::Value::Null
        };
        let output = json!({
            "statistikknavn": report.statistics_name,
            "data_periode": report.data_period,
            "kontrollutslagsandel": ratios,
            "antall_per_kontrolltype": counts,
            "kontrollutslag": findings,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    info!("Loaded report: {}", path.display());

    println!("\n{}", "=".repeat(80));
    println!(
        "QUALITY REPORT: {} ({})",
        report.statistics_name, report.data_period
    );
    println!("{}", "=".repeat(80));
    println!("  Created: {}", report.created);
    println!("  Data: {}", report.data_locations.join(", "));
    println!("  Controls: {}", report.documentation.len());
    println!("  Findings: {}", report.errors.len());
    println!();

    println!("CONTROLS");
    println!("{}", "-".repeat(40));
    println!("{}", control_documentation_table(&report)?);
    println!();

    println!("TRIGGER RATIO");
    println!("{}", "-".repeat(40));
    match ratios.total {
        Some(total) => println!("  Total: {:.4}", total),
        None => println!("  Total: - (no units checked)"),
    }
    for row in &ratios.per_control {
        println!(
            "  {:<30} {:>8} / {:<8} {}",
            row.control,
            row.units_flagged,
            row.units_checked,
            row.ratio.map_or("-".to_string(), |r| format!("{:.4}", r))
        );
    }
    println!();

    println!("FINDINGS PER RESULT TYPE");
    println!("{}", "-".repeat(40));
    if counts.is_empty() {
        println!("  No findings");
    }
    for (kind, count) in &counts {
        println!("  {:<25} {}", kind.name(), count);
    }

    if show_findings {
        println!();
        println!("FINDINGS");
        println!("{}", "-".repeat(40));
        println!("{}", findings_table(&report)?);
    }

    Ok(())
}

#[cfg(feature = "kostra")]
fn run_hb(
    input: &Path,
    ident: &str,
    variable: &str,
    params: &HbParams,
    (filter_op, filter_value): (&str, f64),
    th_error_first: bool,
) -> Result<()> {
    use sirius_control::outliers::{
        ComparisonOp, RatioFields, RscriptKostra, hb_method, hb_method_on_inliers,
        significant_outliers,
    };
    use polars::prelude::DataType;
    use sirius_control::utils::read_csv_with_dtypes;

    let op: ComparisonOp = filter_op.parse()?;

    info!("Loading dataset from: {}", input.display());
    let data = read_csv_with_dtypes(input, &[(ident, DataType::String)])?;
    info!("Dataset loaded successfully: {:?}", data.shape());

    let kostra = RscriptKostra::new(KostraConfig::default())?;
    let fields = RatioFields::for_variable(ident, variable);
    let hb = if th_error_first {
        hb_method_on_inliers(&kostra, &data, &fields, params)?
    } else {
        hb_method(&kostra, &data, &fields, params)?
    };
    info!("HB ran on {} of {} units", hb.height(), data.height());
    let outliers = significant_outliers(&hb, op, filter_value)?;

    println!(
        "\n{} - outliers with the HB method ({} found, maxX {} {})",
        variable,
        outliers.height(),
        op,
        filter_value
    );
    println!("{}", outliers);
    Ok(())
}
