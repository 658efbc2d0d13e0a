use std::path::PathBuf;

use clap::{Parser, Subcommand};
use daily_report::config::ReportConfig;
use daily_report::fill::{self, FillRequest, FillSummary};
use daily_report::{Result, ReportError};
use tracing_subscriber::EnvFilter;

const MISSING_LISTING_LIMIT: usize = 30;

fn main() {
    let cli = Cli::parse();
    if let Err(error) = init_tracing() {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
    if let Err(error) = run(cli) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| ReportError::Logging(error.to_string()))
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Fill(args) => execute_fill(args),
    }
}

fn execute_fill(args: FillArgs) -> Result<()> {
    for path in [&args.template, &args.mapping, &args.sources] {
        if !path.exists() {
            return Err(ReportError::MissingInput(path.clone()));
        }
    }

    let mut config = match &args.config {
        Some(path) => ReportConfig::from_path(path)?,
        None => ReportConfig::default(),
    };
    if args.strict {
        config.strict_addressing = true;
    }

    let request = FillRequest {
        center: fill::parse_center_time(&args.at)?,
        minutes: args.minutes,
        template: args.template,
        mapping: args.mapping,
        sources: args.sources,
        output_dir: args.output_dir,
    };

    let summary = fill::run(&request, &config)?;
    if let Some(path) = &args.diagnostics {
        fill::write_diagnostics(path, &summary)?;
    }
    print_summary(&summary, &config);
    Ok(())
}

fn print_summary(summary: &FillSummary, config: &ReportConfig) {
    let outcome = &summary.outcome;
    println!("window: {} ~ {}", summary.window_start, summary.window_end);
    println!("sheet: {}", summary.sheet);
    println!("filled {} item(s)", outcome.written);

    let missing = outcome.missing_names();
    if !missing.is_empty() {
        println!(
            "no data in this window for the following item(s) (filled with {}):",
            config.fill_marker
        );
        for name in missing.iter().take(MISSING_LISTING_LIMIT) {
            println!(" - {name}");
        }
        if missing.len() > MISSING_LISTING_LIMIT {
            println!(" ... ({} in total)", missing.len());
        }
    }

    if !outcome.void_writes.is_empty() {
        println!("{} write(s) could not be placed:", outcome.void_writes.len());
        for void in &outcome.void_writes {
            println!(" - {} ({}): {}", void.address, void.origin, void.reason);
        }
    }

    println!("output: {}", summary.output.display());
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Fill a spreadsheet report template from time-stamped measurement exports."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fill the report template for one point in time.
    Fill(FillArgs),
}

#[derive(clap::Args)]
struct FillArgs {
    /// Report time, `YYYY-MM-DD HH:MM` or `YYYY/MM/DD HH:MM`.
    #[arg(long)]
    at: String,

    /// Minutes on either side of the report time to collect.
    #[arg(long)]
    minutes: u32,

    /// Report template workbook.
    #[arg(long, default_value = "template.xlsx")]
    template: PathBuf,

    /// Mapping workbook binding measurement names to template cells.
    #[arg(long, default_value = "mapping.xlsx")]
    mapping: PathBuf,

    /// Directory holding the measurement exports.
    #[arg(long, default_value = "sources")]
    sources: PathBuf,

    /// Directory the filled report is written to.
    #[arg(long, default_value = "output")]
    output_dir: PathBuf,

    /// Optional JSON configuration overriding the defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the run summary and miss diagnostics to this JSON file.
    #[arg(long)]
    diagnostics: Option<PathBuf>,

    /// Fail instead of saving when a write cannot be placed in the template.
    #[arg(long)]
    strict: bool,
}
