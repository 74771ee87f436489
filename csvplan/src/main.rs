//! csvplan CLI - Apply declarative transformation plans to CSV files
//!
//! # Main Commands
//!
//! ```bash
//! csvplan transform input.csv output.csv plan.yaml   # Run one plan over one file
//! csvplan pipeline pipeline.yaml                     # Run merge/split/process stages
//! ```
//!
//! # Helper Commands
//!
//! ```bash
//! csvplan inspect input.csv        # Show detected encoding, delimiter and column types
//! csvplan operations               # Show available transformations
//! csvplan example-plan --yaml      # Show an example transformation plan
//! ```

use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser, Subcommand};
use csvplan::config::{parse_delimiter, parse_encoding, Settings};
use csvplan::logs::{init_logging, log_error, log_info, log_success, LogFormat};
use csvplan::{
    parse_file, process_file, run_pipeline, PipelineOptions, PipelinePlan, PlanOptions,
    ReadOptions, TransformationPlan,
};

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "csvplan")]
#[command(about = "Apply declarative column transformations to CSV files", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Log format: pretty, compact or json
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a transformation plan to a CSV file
    Transform {
        /// Input CSV file
        input: PathBuf,

        /// Output CSV file
        output: PathBuf,

        /// Transformation plan (.json, otherwise YAML)
        plan: PathBuf,

        /// Input encoding (auto-detect if not specified)
        #[arg(short, long, value_parser = parse_encoding)]
        encoding: Option<String>,

        /// CSV delimiter (auto-detect if not specified)
        #[arg(short, long, value_parser = parse_delimiter)]
        delimiter: Option<u8>,

        /// Skip unknown transformation types instead of rejecting the plan
        #[arg(long)]
        skip_unknown: bool,
    },

    /// Run a pipeline file
    Pipeline {
        /// Pipeline definition (.json, otherwise YAML)
        file: PathBuf,

        /// Skip unknown stage and transformation types instead of rejecting them
        #[arg(long)]
        skip_unknown: bool,

        /// Write the run report as JSON
        #[arg(short, long)]
        report: Option<PathBuf>,
    },

    /// Show how a CSV file is read
    Inspect {
        /// Input CSV file
        input: PathBuf,

        /// Input encoding (auto-detect if not specified)
        #[arg(short, long, value_parser = parse_encoding)]
        encoding: Option<String>,

        /// CSV delimiter (auto-detect if not specified)
        #[arg(short, long, value_parser = parse_delimiter)]
        delimiter: Option<u8>,
    },

    /// Show available transformations
    Operations,

    /// Show an example transformation plan
    ExamplePlan {
        /// Print YAML instead of JSON
        #[arg(long)]
        yaml: bool,
    },
}

fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(2);
        }
    };

    let log_config = settings
        .log_config()
        .with_verbosity(cli.verbose)
        .with_format(cli.log_format.unwrap_or(settings.log_format));
    if let Err(e) = init_logging(&log_config) {
        eprintln!("Warning: logging unavailable: {e}");
    }

    let result = match cli.command {
        Commands::Transform {
            input,
            output,
            plan,
            encoding,
            delimiter,
            skip_unknown,
        } => {
            let read = ReadOptions {
                encoding: encoding.or_else(|| settings.encoding.clone()),
                delimiter: delimiter.or(settings.delimiter),
            };
            let options = PlanOptions {
                skip_unknown: skip_unknown || settings.skip_unknown,
            };
            cmd_transform(&input, &output, &plan, &read, options)
        }

        Commands::Pipeline {
            file,
            skip_unknown,
            report,
        } => {
            let options = PipelineOptions {
                read: settings.read_options(),
                plan: PlanOptions {
                    skip_unknown: skip_unknown || settings.skip_unknown,
                },
                base_dir: None,
            };
            cmd_pipeline(&file, &options, report.as_deref())
        }

        Commands::Inspect {
            input,
            encoding,
            delimiter,
        } => {
            let read = ReadOptions {
                encoding: encoding.or_else(|| settings.encoding.clone()),
                delimiter: delimiter.or(settings.delimiter),
            };
            cmd_inspect(&input, &read)
        }

        Commands::Operations => cmd_operations(),

        Commands::ExamplePlan { yaml } => cmd_example_plan(yaml),
    };

    if let Err(e) = result {
        log_error(e.to_string());
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn cmd_transform(
    input: &Path,
    output: &Path,
    plan_path: &Path,
    read: &ReadOptions,
    options: PlanOptions,
) -> CliResult {
    log_info(format!("Processing: {}", input.display()));

    let plan = TransformationPlan::from_path(plan_path, options)?;
    log_info(format!("Loaded {} transformations from {}", plan.len(), plan_path.display()));

    let summary = process_file(input, &plan, output, read)?;
    let rows = summary.rows.first().copied().unwrap_or(0);
    log_success(format!("Wrote {rows} rows to {}", output.display()));
    Ok(())
}

fn cmd_pipeline(file: &Path, options: &PipelineOptions, report_path: Option<&Path>) -> CliResult {
    let plan = PipelinePlan::from_path(file, options.plan)?;
    let report = run_pipeline(&plan, options);

    for stage in &report.stages {
        match &stage.outcome {
            Ok(summary) => println!(
                "[ok]     #{} {} -> {}",
                stage.index,
                stage.kind,
                summary
                    .outputs
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Err(e) => println!("[failed] #{} {}: {e}", stage.index, stage.kind),
        }
    }
    println!("{}", report.summary());

    if let Some(path) = report_path {
        std::fs::write(path, report.to_json()?)?;
        log_info(format!("Report written to {}", path.display()));
    }

    if !report.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_inspect(input: &Path, read: &ReadOptions) -> CliResult {
    let parsed = parse_file(input, read)?;

    println!("File:      {}", input.display());
    println!("Encoding:  {}", parsed.encoding);
    println!("Delimiter: '{}'", format_delimiter(parsed.delimiter));
    println!("Rows:      {}", parsed.table.row_count());
    println!("Columns:");
    for (i, column) in parsed.table.columns().iter().enumerate() {
        let blanks = column.values.iter().filter(|v| v.is_blank()).count();
        println!(
            "  [{:2}] {} ({}, {} blank)",
            i + 1,
            column.name,
            column.data_type(),
            blanks
        );
    }
    Ok(())
}

fn format_delimiter(d: u8) -> String {
    match d {
        b'\t' => "\\t".to_string(),
        c => (c as char).to_string(),
    }
}

fn cmd_operations() -> CliResult {
    println!("{}", csvplan::operations_description());
    Ok(())
}

fn cmd_example_plan(yaml: bool) -> CliResult {
    let plan = csvplan::example_plan();
    let text = if yaml { plan.to_yaml()? } else { plan.to_json()? };
    println!("{text}");
    Ok(())
}
