use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand, ValueEnum};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use isbn_harvest::blurb::DepositClient;
use isbn_harvest::catalog::read_catalog;
use isbn_harvest::config::{ConfigLoader, ResolvedConfig, load_access_token};
use isbn_harvest::domain::{FetchKind, Isbn};
use isbn_harvest::error::HarvestError;
use isbn_harvest::harvest::{HarvestOptions, Harvester};
use isbn_harvest::marc::{DnbClient, MarcSource};
use isbn_harvest::output::{
    ClearLineWriter, JsonOutput, LogProgress, OutputMode, TerminalProgress, print_harvest_summary,
    print_status_summary,
};
use isbn_harvest::store::CatalogStore;

#[derive(Parser)]
#[command(name = "isbn-harvest")]
#[command(about = "Resumable MARC21 and blurb harvester for an ISBN catalog")]
#[command(version, author)]
struct Cli {
    /// Path to a JSON config file (default: ./isbn-harvest.json when present)
    #[arg(long, global = true)]
    config: Option<String>,

    #[arg(long, global = true)]
    non_interactive: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Create the catalog tables if they are missing")]
    Init,
    #[command(about = "Load ISBNs (one per line) into the catalog")]
    Import(ImportArgs),
    #[command(about = "Fetch pending MARC21 records and blurbs")]
    Fetch(FetchArgs),
    #[command(about = "Show pending and completed counts")]
    Status,
}

#[derive(Args)]
struct ImportArgs {
    file: Utf8PathBuf,
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Marc21,
    Blurb,
    All,
}

impl KindArg {
    fn kinds(self) -> Vec<FetchKind> {
        match self {
            KindArg::Marc21 => vec![FetchKind::Marc21],
            KindArg::Blurb => vec![FetchKind::Blurb],
            KindArg::All => FetchKind::all().to_vec(),
        }
    }
}

#[derive(Args)]
struct FetchArgs {
    #[arg(long, value_enum, default_value = "all")]
    kind: KindArg,

    #[arg(long)]
    dry_run: bool,

    #[arg(long)]
    limit: Option<usize>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<HarvestError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &HarvestError) -> u8 {
    match error {
        HarvestError::ConfigRead(_)
        | HarvestError::ConfigParse(_)
        | HarvestError::InvalidPattern(_)
        | HarvestError::MissingAccessToken(_)
        | HarvestError::CatalogRead(_) => 2,
        HarvestError::MarcHttp(_)
        | HarvestError::MarcStatus { .. }
        | HarvestError::BlurbHttp(_)
        | HarvestError::BlurbStatus { .. } => 3,
        HarvestError::Store(_) => 4,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    let logs = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false);
    match output_mode {
        OutputMode::Interactive => logs
            .with_writer(ClearLineWriter::new(std::io::stderr))
            .init(),
        OutputMode::NonInteractive => logs.with_writer(std::io::stderr).init(),
    }

    let config = ConfigLoader::resolve(cli.config.as_deref())?;
    let store = CatalogStore::open(&config.database)?;
    store.initialize()?;

    match cli.command {
        Commands::Init => {
            tracing::info!(database = %config.database, "catalog tables ready");
            Ok(())
        }
        Commands::Import(args) => run_import(args, store),
        Commands::Fetch(args) => run_fetch(args, store, &config, output_mode),
        Commands::Status => {
            let status = store.status(&config.blurb_link_pattern)?;
            match output_mode {
                OutputMode::Interactive => print_status_summary(&status),
                OutputMode::NonInteractive => JsonOutput::print_status(&status).into_diagnostic()?,
            }
            Ok(())
        }
    }
}

fn run_import(args: ImportArgs, mut store: CatalogStore) -> miette::Result<()> {
    let isbns = read_catalog(&args.file)?;
    let total = isbns.len();
    let inserted = store.import_isbns(isbns)?;
    tracing::info!(file = %args.file, total, inserted, "catalog imported");
    Ok(())
}

fn run_fetch(
    args: FetchArgs,
    store: CatalogStore,
    config: &ResolvedConfig,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let kinds = args.kind.kinds();
    let options = HarvestOptions {
        dry_run: args.dry_run,
        limit: args.limit,
    };
    let blurb = DepositClient::new(config.timeout)?;

    if !options.dry_run && kinds.contains(&FetchKind::Marc21) {
        let token = load_access_token(&config.access_token_file)?;
        let marc = DnbClient::new(&config.sru_url_template, token, config.timeout)?;
        let harvester = Harvester::new(store, marc, blurb, config.blurb_link_pattern.clone());
        run_harvest(harvester, &kinds, &options, output_mode)
    } else {
        let harvester = Harvester::new(store, NopMarc, blurb, config.blurb_link_pattern.clone());
        run_harvest(harvester, &kinds, &options, output_mode)
    }
}

fn run_harvest<M: MarcSource>(
    mut harvester: Harvester<M, DepositClient>,
    kinds: &[FetchKind],
    options: &HarvestOptions,
    output_mode: OutputMode,
) -> miette::Result<()> {
    match output_mode {
        OutputMode::Interactive => {
            let sink = TerminalProgress::new();
            let report = harvester.run(kinds, options, &sink)?;
            print_harvest_summary(&report);
        }
        OutputMode::NonInteractive => {
            let report = harvester.run(kinds, options, &LogProgress)?;
            JsonOutput::print_harvest(&report).into_diagnostic()?;
        }
    }
    Ok(())
}

/// Stands in for the SRU client when no metadata request can happen.
struct NopMarc;

impl MarcSource for NopMarc {
    fn fetch_record(&self, isbn: &Isbn) -> Result<String, HarvestError> {
        Err(HarvestError::MarcHttp(format!(
            "metadata fetching disabled for {isbn}"
        )))
    }
}
