use std::fs::File;
use std::process::ExitCode;
use std::sync::Mutex;

use clap::Parser;
use miette::IntoDiagnostic;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};

use interpro_ebisearch::annotation::{Enricher, NoEnrichment, SearchEnricher, SearchHttpClient};
use interpro_ebisearch::app::{App, LogSink, RunOptions};
use interpro_ebisearch::assemble::today;
use interpro_ebisearch::cache::{DumpFileSource, RecordCache};
use interpro_ebisearch::config::{AnnotationBackend, ConfigLoader, ResolvedConfig};
use interpro_ebisearch::error::DumpError;
use interpro_ebisearch::output::JsonOutput;
use interpro_ebisearch::rest::{RestEnricher, RestHttpClient};
use interpro_ebisearch::schema::{SchemaHttpClient, SchemaStore};

#[derive(Parser)]
#[command(name = "ipr-ebisearch")]
#[command(about = "Dump InterPro entries as EBI Search document sets")]
#[command(version)]
struct Cli {
    #[arg(short, long, help = "Config file (defaults to ipr-ebisearch.json)")]
    config: Option<String>,

    #[arg(short, long, default_value = "ebisearch", help = "Output file prefix")]
    output: String,

    #[arg(short, long, default_value_t = 0, help = "Only process the first N records (0 means all)")]
    test: usize,

    #[arg(short = 'n', long = "nocache", help = "Ignore the record cache and re-read the source")]
    no_cache: bool,

    #[arg(short, long, help = "Mirror the log to stderr")]
    log: bool,

    #[arg(short, long, help = "Validate each document set against the schema")]
    validate: bool,

    #[arg(long)]
    verbose: bool,
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
        DumpError::MissingConfig
        | DumpError::ConfigRead(_)
        | DumpError::ConfigParse(_)
        | DumpError::InvalidConfig(_) => 2,
        DumpError::SchemaHttp(_)
        | DumpError::SchemaStatus { .. }
        | DumpError::SearchHttp(_)
        | DumpError::SearchStatus { .. }
        | DumpError::RestHttp(_)
        | DumpError::RestStatus { .. } => 3,
        DumpError::MissingField { .. } => 4,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();
    let config = ConfigLoader::resolve(cli.config.as_deref())?;
    init_logging(&config, cli.log, cli.verbose)?;

    info!(
        release = %config.release.name,
        version = %config.release.version,
        "starting EBI Search dump"
    );

    let schema = if cli.validate {
        let fetcher = SchemaHttpClient::new()?;
        Some(SchemaStore::load(
            config.schema_file.as_deref(),
            config.schema_url.as_deref(),
            &fetcher,
        )?)
    } else {
        None
    };

    let enricher = build_enricher(config.annotation.as_ref())?;
    let source = config.dump_file.clone().map(DumpFileSource::new);
    let app = App::new(
        RecordCache::new(config.cache_file.clone()),
        source,
        enricher,
        config.release.clone(),
        config.records_per_file,
    );

    let options = RunOptions {
        output_prefix: cli.output,
        limit: (cli.test > 0).then_some(cli.test),
        no_cache: cli.no_cache,
        release_date: today(),
    };
    let result = app.run(&options, schema.as_ref(), &LogSink)?;
    info!(files = result.files.len(), "dump complete");
    JsonOutput::print_run(&result).into_diagnostic()?;
    Ok(())
}

fn init_logging(config: &ResolvedConfig, mirror: bool, verbose: bool) -> Result<(), DumpError> {
    let file = File::create(config.log_file.as_std_path())
        .map_err(|err| DumpError::Filesystem(format!("create {}: {err}", config.log_file)))?;
    let file = Mutex::new(file);
    let writer = if mirror {
        BoxMakeWriter::new(file.and(std::io::stderr))
    } else {
        BoxMakeWriter::new(file)
    };

    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(writer)
        .init();
    Ok(())
}

fn build_enricher(backend: Option<&AnnotationBackend>) -> Result<Box<dyn Enricher>, DumpError> {
    let enricher: Box<dyn Enricher> = match backend {
        Some(AnnotationBackend::Search {
            base_url,
            page_size,
            pagination,
            timeout,
        }) => Box::new(SearchEnricher::new(
            SearchHttpClient::new(base_url, *timeout)?,
            *page_size,
            *pagination,
        )),
        Some(AnnotationBackend::Rest {
            base_url,
            segment,
            dbname,
            page_size,
            timeout,
        }) => Box::new(RestEnricher::new(
            RestHttpClient::new(base_url, *timeout)?,
            segment,
            *page_size,
            dbname.clone(),
        )),
        None => Box::new(NoEnrichment),
    };
    Ok(enricher)
}
