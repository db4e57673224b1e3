use clap::builder::PossibleValuesParser;
use clap::Parser;
use dotenv::dotenv;
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use park_scraper::apis::SourceQuery;
use park_scraper::config::Config;
use park_scraper::constants::get_supported_sources;
use park_scraper::infra::record_sink::OutputSpec;
use park_scraper::logging;
use park_scraper::types::SourceKind;
use park_scraper::{Pipeline, RunFailure, RunOptions, RunSummary};

#[derive(Parser, Debug)]
#[command(name = "park_scraper")]
#[command(about = "Fetch mobile home park and parcel records and export them as JSON or CSV")]
#[command(version)]
struct Cli {
    /// Which portal to scrape
    #[arg(long, value_parser = PossibleValuesParser::new(get_supported_sources()))]
    source: String,

    /// County name (mapped to a numeric code for ca_hcd)
    #[arg(long, default_value = "Riverside")]
    county: String,

    /// Explicit CA HCD county code; wins over --county
    #[arg(long)]
    county_code: Option<u32>,

    /// State code (mhvillage)
    #[arg(long, default_value = "CA")]
    state: String,

    /// Max records; zero or negative fetches everything
    #[arg(long, default_value_t = 200, allow_negative_numbers = true)]
    limit: i64,

    /// Output file (.json or .csv)
    #[arg(long)]
    out: PathBuf,

    /// Config file (defaults to $PARK_SCRAPER_CONFIG or ./config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Stop paginating after this many seconds and keep what was fetched
    #[arg(long)]
    deadline_secs: Option<u64>,

    /// Write records gathered before a failure (still exits non-zero)
    #[arg(long)]
    keep_partial: bool,

    /// Skip derived fields
    #[arg(long)]
    no_enrich: bool,
}

async fn run(cli: Cli) -> anyhow::Result<RunSummary> {
    let source = SourceKind::from_str(&cli.source)?;
    let failed = |error| RunFailure {
        source,
        error,
        written: None,
    };

    // Fail fast on the output format, before config or network.
    OutputSpec::from_path(&cli.out).map_err(failed)?;

    let config = Config::load(cli.config.as_deref()).map_err(failed)?;
    debug!(?config, "Configuration loaded");
    let pipeline = Pipeline::from_config(config).map_err(failed)?;

    let options = RunOptions {
        source,
        query: SourceQuery {
            county: cli.county,
            county_code: cli.county_code,
            state: cli.state,
        },
        limit: cli.limit,
        out: cli.out,
        deadline: cli.deadline_secs.map(Duration::from_secs),
        keep_partial: cli.keep_partial,
        enrich: !cli.no_enrich,
    };
    info!(%source, limit = options.limit, "Starting run");
    Ok(pipeline.run(&options).await?)
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    let cli = Cli::parse();
    logging::init_logging();

    match run(cli).await {
        Ok(summary) => {
            println!("Wrote {} records to {}", summary.records, summary.output.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            if let Some(written) = e.downcast_ref::<RunFailure>().and_then(|f| f.written) {
                eprintln!("Wrote {written} partial records before the failure");
            }
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
