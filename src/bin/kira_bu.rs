use std::path::PathBuf;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use kira_bioutils::app::{self, App, AssemblyOptions, FetchResult, MappingOptions, ProgressSink};
use kira_bioutils::config::{ConfigLoader, ResolvedConfig};
use kira_bioutils::domain::{EntryKind, GenomeAccession};
use kira_bioutils::download::{DownloadStatus, MirrorHttpClient};
use kira_bioutils::error::KiraError;
use kira_bioutils::ncbi::EntrezHttpClient;
use kira_bioutils::output::{JsonOutput, TracingSink};
use kira_bioutils::uniprot::{self, UniprotHttpClient};

#[derive(Parser)]
#[command(name = "kira-bu")]
#[command(about = "Bioinformatics utilities: NCBI assembly downloads and GenBank to UniProt mapping")]
#[command(version, author)]
struct Cli {
    /// Path to a kira-bu.json config file
    #[arg(long, global = true)]
    config: Option<String>,

    /// Print results as JSON and suppress progress logging
    #[arg(long, global = true)]
    non_interactive: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Download genomic assemblies from the NCBI genomes mirror")]
    Assembly(AssemblyArgs),
    #[command(about = "Map GenBank accessions to UniProt accessions")]
    Uniprot(UniprotArgs),
    #[command(about = "List files or directories by name prefix and suffix")]
    Ls(LsArgs),
    #[command(about = "Create or clear an output directory")]
    Outdir(OutdirArgs),
}

#[derive(Args)]
struct AssemblyArgs {
    #[arg(required = true)]
    accessions: Vec<String>,

    #[arg(long)]
    outdir: Option<Utf8PathBuf>,

    #[arg(long)]
    suffix: Option<String>,

    #[command(flatten)]
    dir: DirFlags,

    /// Check that each downloaded file decompresses cleanly
    #[arg(long)]
    verify: bool,
}

#[derive(Args)]
struct UniprotArgs {
    /// JSON object or `accession id` table of GenBank accessions to record ids
    #[arg(long)]
    input: Utf8PathBuf,

    #[arg(long)]
    batch_size: Option<usize>,

    #[arg(long)]
    retries: Option<usize>,
}

#[derive(Args)]
struct LsArgs {
    directory: PathBuf,

    #[arg(long = "prefix")]
    prefixes: Vec<String>,

    #[arg(long = "suffix")]
    suffixes: Vec<String>,

    /// List directories instead of files
    #[arg(long)]
    dirs: bool,
}

#[derive(Args)]
struct OutdirArgs {
    path: Utf8PathBuf,

    #[command(flatten)]
    dir: DirFlags,
}

#[derive(Args, Clone, Copy)]
struct DirFlags {
    /// Write into an existing output directory
    #[arg(long)]
    force: bool,

    /// Keep the contents of an existing output directory
    #[arg(long)]
    nodelete: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(kira) = report.downcast_ref::<KiraError>() {
            return ExitCode::from(map_exit_code(kira));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &KiraError) -> u8 {
    match error {
        KiraError::OutputDirExists(_) | KiraError::Lookup(_) => 2,
        KiraError::Transport(_) | KiraError::TransportStatus { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = ConfigLoader::resolve(cli.config.as_deref())?;
    if let Some(source) = config.source_path() {
        tracing::debug!("using config {source}");
    }

    let tracing_sink = TracingSink::new();
    let sink: &dyn ProgressSink = if cli.non_interactive {
        &JsonOutput
    } else {
        &tracing_sink
    };

    match cli.command {
        Commands::Assembly(args) => run_assembly(args, &config, cli.non_interactive, sink),
        Commands::Uniprot(args) => run_uniprot(args, &config, sink),
        Commands::Ls(args) => {
            let kind = if args.dirs {
                EntryKind::Dir
            } else {
                EntryKind::File
            };
            let result = app::list_paths(&args.directory, kind, &args.prefixes, &args.suffixes)?;
            JsonOutput::print_list(&result).into_diagnostic()
        }
        Commands::Outdir(args) => {
            let result = app::prepare_output_dir(
                args.path.as_std_path(),
                args.dir.force,
                args.dir.nodelete,
                sink,
            )?;
            JsonOutput::print_output_dir(&result).into_diagnostic()
        }
    }
}

fn run_assembly(
    args: AssemblyArgs,
    config: &ResolvedConfig,
    non_interactive: bool,
    sink: &dyn ProgressSink,
) -> miette::Result<()> {
    let accessions = args
        .accessions
        .iter()
        .map(|value| value.parse::<GenomeAccession>())
        .collect::<Result<Vec<_>, KiraError>>()?;

    if let Some(outdir) = &args.outdir {
        app::prepare_output_dir(outdir.as_std_path(), args.dir.force, args.dir.nodelete, sink)?;
    }

    let entrez = EntrezHttpClient::new(config.email.clone())?.with_attempts(config.entrez_attempts);
    let mirror = MirrorHttpClient::new()?;
    let uniprot = UniprotHttpClient::with_url(&config.uniprot_url)?;
    let app = App::new(entrez, mirror, uniprot);

    let options = AssemblyOptions {
        suffix: args
            .suffix
            .unwrap_or_else(|| config.assembly_suffix.clone()),
        ftp_stem: config.ftp_stem.clone(),
        verify: args.verify,
    };
    let result = app.fetch_assemblies(
        &accessions,
        args.outdir.as_ref().map(|dir| dir.as_std_path()),
        &options,
        sink,
    )?;

    if non_interactive {
        JsonOutput::print_fetch(&result).into_diagnostic()
    } else {
        print_fetch_summary(&result);
        Ok(())
    }
}

fn run_uniprot(
    args: UniprotArgs,
    config: &ResolvedConfig,
    sink: &dyn ProgressSink,
) -> miette::Result<()> {
    let content = std::fs::read_to_string(args.input.as_std_path())
        .map_err(|err| KiraError::Filesystem(format!("read {}: {err}", args.input)))?;
    let accessions = uniprot::parse_accession_map(&content)?;

    let client = UniprotHttpClient::with_url(&config.uniprot_url)?;
    let options = MappingOptions {
        batch_size: args.batch_size.unwrap_or(config.batch_size),
        retries: args.retries.unwrap_or(config.retries),
    };
    let result = app::map_accessions(&client, &accessions, options, sink)?;
    JsonOutput::print_mapping(&result).into_diagnostic()
}

fn print_fetch_summary(result: &FetchResult) {
    let green = "\x1b[32m";
    let yellow = "\x1b[33m";
    let cyan = "\x1b[36m";
    let red = "\x1b[31m";
    let reset = "\x1b[0m";

    let failed = result
        .items
        .iter()
        .filter(|item| item.status == DownloadStatus::Failed)
        .count();

    println!("{cyan}kira-bu assembly summary{reset}");
    println!("{green}Assemblies: {}{reset}", result.items.len());
    if failed > 0 {
        println!("{red}Failed downloads: {failed}{reset}");
    }

    for item in &result.items {
        let (label, color) = match item.status {
            DownloadStatus::Downloaded { .. } => ("downloaded", green),
            DownloadStatus::Skipped => ("skipped, file exists", yellow),
            DownloadStatus::Failed => ("failed", red),
        };
        println!("{color}  {} ({label}){reset}", item.accession);
        println!("{color}    {}{reset}", item.path.display());
        if item.verified == Some(false) {
            println!("{red}    gzip verification failed{reset}");
        }
    }
}
