use std::process::ExitCode;

use clap::{Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use gnidump::app::{App, ProgressSink};
use gnidump::config::{ConfigLoader, ResolvedConfig};
use gnidump::error::DumpError;
use gnidump::fs_util;
use gnidump::output::{JsonOutput, LogProgress, print_convert_summary, print_create_summary};
use gnidump::parser::HttpNameParser;

#[derive(Parser)]
#[command(name = "gnidump")]
#[command(about = "Converts a Global Names Index dump into gnindex CSV tables")]
#[command(version)]
struct Cli {
    /// Path to a JSON config file (defaults to ./gnidump.json when present).
    #[arg(long, global = true)]
    config: Option<String>,

    /// Worker count; overrides WORKERS_NUMBER and the config file.
    #[arg(long, global = true)]
    workers: Option<usize>,

    /// Print the run summary as JSON on stdout.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Parse name strings into the staging store")]
    Convert,
    #[command(about = "Resolve staged names into gnindex CSV files")]
    Create,
    #[command(about = "Run convert, then create")]
    Run,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<DumpError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &DumpError) -> u8 {
    match error {
        DumpError::ConfigRead(_)
        | DumpError::ConfigParse(_)
        | DumpError::InvalidConfig(_)
        | DumpError::MissingParserUrl => 2,
        DumpError::ParserHttp(_)
        | DumpError::ParserStatus { .. }
        | DumpError::MalformedParse(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = ConfigLoader::resolve(cli.config.as_deref())?;
    if let Some(workers) = cli.workers {
        if workers == 0 {
            return Err(DumpError::InvalidConfig("--workers must be at least 1".to_string()).into());
        }
        config.pipeline = config.pipeline.with_workers(workers);
    }
    fs_util::ensure_dirs(&[
        config.paths.staging_dir.as_path(),
        config.paths.source_dir.as_path(),
        config.paths.output_dir.as_path(),
    ])?;

    let sink: &dyn ProgressSink = if cli.json { &JsonOutput } else { &LogProgress };
    match cli.command {
        Commands::Convert => {
            let app = App::new(config.clone(), http_parser(&config)?);
            let summary = app.convert(sink)?;
            if cli.json {
                JsonOutput::print_convert(&summary).into_diagnostic()?;
            } else {
                print_convert_summary(&summary);
            }
        }
        Commands::Create => {
            let app = App::<HttpNameParser>::without_parser(config);
            let summary = app.create(sink)?;
            if cli.json {
                JsonOutput::print_create(&summary).into_diagnostic()?;
            } else {
                print_create_summary(&summary);
            }
        }
        Commands::Run => {
            let app = App::new(config.clone(), http_parser(&config)?);
            let summary = app.run(sink)?;
            if cli.json {
                JsonOutput::print_run(&summary).into_diagnostic()?;
            } else {
                print_convert_summary(&summary.convert);
                print_create_summary(&summary.create);
            }
        }
    }
    Ok(())
}

fn http_parser(config: &ResolvedConfig) -> Result<HttpNameParser, DumpError> {
    let url = config
        .parser
        .url
        .as_deref()
        .ok_or(DumpError::MissingParserUrl)?;
    HttpNameParser::new(url, config.parser.timeout)
}

