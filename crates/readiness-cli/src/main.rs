//! Readiness CLI - assess datasets, check standards, export audit logs

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::Parser;
use readiness_assess::{AssessmentMode, AssessmentResult, Dataset, DatasetMetadata, Record, RuleRegistry, ScoreAggregator};
use readiness_audit::export_verodat;
use readiness_core::ReadinessConfig;
use readiness_standards::{suggest_standard, to_yaml, StandardLoader, TemplateEvaluation, TemplateEvaluator};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "readiness")]
#[command(about = "Data readiness - quality scoring and standards compliance for tabular data")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log filter (overrides the configured level; RUST_LOG overrides both)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Assess a JSON array of records
    Assess {
        /// Data file (JSON array of objects)
        data: PathBuf,
        /// Data source name (defaults to the file stem)
        #[arg(long)]
        source: Option<String>,
        /// Declared field metadata (JSON)
        #[arg(long)]
        metadata: Option<PathBuf>,
        /// Standard to evaluate against (YAML)
        #[arg(short, long)]
        standard: Option<PathBuf>,
        /// Assessment mode: auto, discovery or validation
        #[arg(long)]
        mode: Option<AssessmentMode>,
        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Load and validate a standard document
    CheckStandard {
        /// Standard file (YAML)
        standard: PathBuf,
    },
    /// Draft a standard from the quality a dataset already reaches
    Suggest {
        /// Data file (JSON array of objects)
        data: PathBuf,
        /// Id of the suggested standard
        #[arg(long, default_value = "suggested_standard")]
        id: String,
        /// Write the YAML here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Convert a JSONL audit log to Verodat records
    Export {
        /// Audit log (JSONL)
        input: PathBuf,
        /// Output file (JSONL)
        output: PathBuf,
    },
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ReadinessConfig::from_path(path)
            .with_context(|| format!("loading configuration {}", path.display()))?,
        None => ReadinessConfig::default(),
    };

    let level = cli.log_level.clone().unwrap_or_else(|| config.audit.log_level.clone());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Some(Commands::Assess {
            data,
            source,
            metadata,
            standard,
            mode,
            json,
        }) => {
            let mut dataset = load_dataset(&data, source)?;
            if let Some(path) = metadata {
                dataset = dataset.with_metadata(load_metadata(&path)?);
            }
            let standard = standard
                .or_else(|| config.assessment.standard.clone())
                .map(|path| StandardLoader::new()?.load_path(&path))
                .transpose()
                .context("loading standard")?;

            let mut aggregator_config = config.assessment.aggregator();
            if let Some(mode) = mode {
                aggregator_config.mode = mode;
            }
            let result = ScoreAggregator::new(RuleRegistry::new())
                .with_config(aggregator_config)
                .assess_with_standard(&dataset, standard.as_ref().map(|s| s.id.as_str()));
            let evaluation = standard
                .as_ref()
                .map(|s| TemplateEvaluator::new().evaluate(&result, s));

            if json {
                let value = serde_json::json!({ "assessment": result, "evaluation": evaluation });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                print!("{}", render_assessment(&result));
                if let Some(evaluation) = &evaluation {
                    print!("{}", render_evaluation(evaluation));
                }
            }

            let ok = result.passed && evaluation.map_or(true, |e| e.compliant);
            Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
        Some(Commands::CheckStandard { standard }) => {
            let loaded = StandardLoader::new()?
                .load_path(&standard)
                .with_context(|| format!("checking {}", standard.display()))?;
            let req = &loaded.requirements;
            println!("{} v{} ({}) - OK", loaded.id, loaded.version, loaded.name);
            if let Some(min) = req.overall_minimum {
                println!("  overall minimum:      {min}");
            }
            println!("  dimension rules:      {}", req.dimension_requirements.len());
            println!("  mandatory fields:     {}", req.mandatory_fields.len());
            println!("  custom rules:         {}", req.custom_rules.len());
            Ok(ExitCode::SUCCESS)
        }
        Some(Commands::Suggest { data, id, output }) => {
            let dataset = load_dataset(&data, None)?;
            let result = ScoreAggregator::new(RuleRegistry::new())
                .with_config(readiness_assess::AggregatorConfig {
                    mode: AssessmentMode::Discovery,
                    ..config.assessment.aggregator()
                })
                .assess(&dataset);
            let yaml = to_yaml(&suggest_standard(&result, id))?;
            match output {
                Some(path) => {
                    fs::write(&path, yaml).with_context(|| format!("writing {}", path.display()))?;
                    info!("Suggested standard written to {}", path.display());
                }
                None => print!("{yaml}"),
            }
            Ok(ExitCode::SUCCESS)
        }
        Some(Commands::Export { input, output }) => {
            let count = export_verodat(&input, &output)
                .with_context(|| format!("exporting {}", input.display()))?;
            println!("Exported {count} records to {}", output.display());
            Ok(ExitCode::SUCCESS)
        }
        None => {
            println!("Readiness v{} - Use --help for commands", env!("CARGO_PKG_VERSION"));
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Reads a JSON array of records. The source name defaults to the file stem.
fn load_dataset(path: &Path, source: Option<String>) -> anyhow::Result<Dataset> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let rows: Vec<Record> = serde_json::from_str(&text)
        .with_context(|| format!("{} is not a JSON array of objects", path.display()))?;
    if rows.is_empty() {
        bail!("{} contains no records", path.display());
    }
    let source = source
        .or_else(|| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "dataset".to_string());
    debug!("Loaded {} rows from {}", rows.len(), path.display());
    Ok(Dataset::from_records(rows).with_source(source))
}

fn load_metadata(path: &Path) -> anyhow::Result<DatasetMetadata> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing metadata {}", path.display()))
}

fn render_assessment(result: &AssessmentResult) -> String {
    let mut out = format!(
        "{} ({} rows, {} columns, {} mode)\n",
        result.data_source.as_deref().unwrap_or("dataset"),
        result.data_info.row_count,
        result.data_info.column_count,
        result.assessment_mode,
    );
    for (dimension, score) in &result.dimension_scores {
        out.push_str(&format!("  {:<14}{:>5.1} / 20\n", dimension.as_str(), score.score));
        for recommendation in &score.recommendations {
            out.push_str(&format!("      - {recommendation}\n"));
        }
    }
    out.push_str(&format!(
        "  {:<14}{:>5.1} / 100  {}\n",
        "overall",
        result.overall_score,
        if result.passed { "PASSED" } else { "FAILED" }
    ));
    out
}

fn render_evaluation(evaluation: &TemplateEvaluation) -> String {
    let mut out = format!(
        "\nStandard {} v{}: {} (compliance {:.0}%, certification {})\n",
        evaluation.standard_id,
        evaluation.standard_version,
        if evaluation.compliant { "COMPLIANT" } else { "NOT COMPLIANT" },
        evaluation.compliance_score,
        if evaluation.certification_eligible { "eligible" } else { "blocked" },
    );
    for step in &evaluation.remediation_plan {
        out.push_str(&format!("  {}. [{}] {}\n", step.priority, step.severity, step.action));
    }
    out
}
