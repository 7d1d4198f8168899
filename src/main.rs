use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use nedra_map::api::{ApiClient, InfoSource, RegionSource};
use nedra_map::config::Config;
use nedra_map::deposits::{DepositDataset, DepositFilter, RegionStatsTable, ALL_REGIONS};
use nedra_map::geometry::{self, Bounds};
use nedra_map::registry::{find_region, Activity, Category, Region, RegionSummary};
use nedra_map::server::{self, AppState};
use nedra_map::session::{region_not_found, Driver};
use nedra_map::similarity;
use serde::Serialize;
use serde_json::json;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Nedra Map — mineral licensing registry for East Kazakhstan
///
/// Lists regions and license holders from the licensing API, fetches parcel
/// outlines, matches spoken region names and serves the deposit dataset.
///
/// Examples:
///   nedra regions
///   nedra voice "покажи глубоковский район"
///   nedra load-all Глубоковский --category opi --activity dobycha
///   nedra deposits --region __all__
///   nedra serve --listen 0.0.0.0:8080
#[derive(Parser)]
#[command(name = "nedra", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Licensing API base URL
    #[arg(long, global = true, env = "NEDRA_API_URL")]
    api_url: Option<String>,

    /// Deposit dataset JSON
    #[arg(long, global = true, env = "NEDRA_DATASET")]
    dataset: Option<PathBuf>,

    /// Region stats lookup table JSON
    #[arg(long, global = true, env = "NEDRA_REGION_STATS")]
    region_stats: Option<PathBuf>,

    /// Parallel info requests when loading outlines
    #[arg(long, global = true, env = "NEDRA_FETCH_CONCURRENCY")]
    concurrency: Option<usize>,

    /// Use cached API responses only
    #[arg(long, global = true)]
    offline: bool,
}

#[derive(Subcommand)]
enum Command {
    /// List regions with license holder counts
    Regions,
    /// One region with its license holders
    Region { name: String },
    /// Match a spoken phrase to a region
    Voice {
        #[arg(required = true, trailing_var_arg = true)]
        transcript: Vec<String>,
    },
    /// License details for a location key
    Info { location: String },
    /// Fetch parcel outlines for a region's license holders
    LoadAll {
        region: String,
        /// opi or tpi
        #[arg(long)]
        category: Option<Category>,
        /// razvedka or dobycha; needs --category
        #[arg(long, requires = "category")]
        activity: Option<Activity>,
    },
    /// Deposit dataset rows (all regions unless --region is given)
    Deposits {
        #[arg(long)]
        region: Option<String>,
    },
    /// Region labels present in the deposit dataset
    DepositRegions,
    /// Region stats row
    Stats { region: String },
    /// Parse WKT or GeoJSON geometry text ("-" reads stdin)
    Parse { text: String },
    /// Run the local JSON API
    Serve {
        #[arg(long, env = "LISTEN")]
        listen: Option<String>,
    },
}

impl Cli {
    fn apply(&self, config: &mut Config) {
        if let Some(ref url) = self.api_url {
            config.api_base_url = url.clone();
        }
        if let Some(ref path) = self.dataset {
            config.dataset_path = path.clone();
        }
        if let Some(ref path) = self.region_stats {
            config.region_stats_path = Some(path.clone());
        }
        if let Some(n) = self.concurrency {
            config.fetch_concurrency = n.max(1);
        }
        if self.offline {
            config.offline = true;
        }
        if let Command::Serve { listen: Some(ref listen) } = self.command {
            config.listen_addr = listen.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Loaded before parsing so flag defaults can come from `.env`.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    let mut config = Config::from_env()?;
    cli.apply(&mut config);
    init_logging(&config);

    match cli.command {
        Command::Regions => {
            let regions = fetch_regions(&config).await?;
            let summaries: Vec<RegionSummary> = regions.iter().map(RegionSummary::of).collect();
            print_json(&summaries)
        }
        Command::Region { name } => {
            let regions = fetch_regions(&config).await?;
            let region = find_region(&regions, &name).with_context(|| format!("unknown region '{}'", name))?;
            print_json(&json!({
                "summary": RegionSummary::of(region),
                "companies": region.companies,
                "bounds": Bounds::of_ring(&region.coordinates),
            }))
        }
        Command::Voice { transcript } => {
            let transcript = transcript.join(" ");
            let regions = fetch_regions(&config).await?;
            match similarity::match_by_voice(&transcript, &regions, |r| r.name.as_str()) {
                Some((region, score)) => {
                    info!(region = %region.name, score, "voice match");
                    print_json(&json!({ "score": score, "region": RegionSummary::of(region) }))
                }
                None => bail!(region_not_found(&transcript)),
            }
        }
        Command::Info { location } => {
            let client = Arc::new(ApiClient::from_config(&config));
            let key = location.clone();
            let info = tokio::task::spawn_blocking(move || client.fetch_info(&key))
                .await?
                .map_err(|e| anyhow::anyhow!(e.user_message()))
                .with_context(|| format!("location '{}'", location))?;
            print_json(&json!({ "info": info, "polygon": info.polygon() }))
        }
        Command::LoadAll { region, category, activity } => {
            let client = Arc::new(ApiClient::from_config(&config));
            let regions = fetch_regions_with(Arc::clone(&client)).await?;
            let found = find_region(&regions, &region)
                .cloned()
                .with_context(|| format!("unknown region '{}'", region))?;

            let driver = Driver::new(client, config.fetch_concurrency).without_delays();
            let session = driver.load_region(found, category, activity).await;
            print_json(&json!({
                "region": session.region.as_ref().map(|r| r.name.as_str()),
                "polygons": session.fetched,
                "view": session.view,
            }))
        }
        Command::Deposits { region } => {
            let dataset = load_dataset(&config)?;
            let filter = DepositFilter::from_param(Some(region.as_deref().unwrap_or(ALL_REGIONS)));
            let (label, records) = match filter {
                DepositFilter::Region(name) => {
                    let (label, records) = dataset.for_region(&name);
                    if label.is_none() {
                        warn!(region = %name, "no deposit region matched");
                    }
                    (label, records)
                }
                other => (None, dataset.filter(&other)),
            };
            print_json(&json!({
                "region": label,
                "count": records.len(),
                "bounds": DepositDataset::bounds_of(&records),
                "records": records,
            }))
        }
        Command::DepositRegions => {
            let dataset = load_dataset(&config)?;
            print_json(&dataset.region_labels())
        }
        Command::Stats { region } => {
            let Some(ref path) = config.region_stats_path else {
                bail!("no region stats table configured; set NEDRA_REGION_STATS or --region-stats");
            };
            let table = RegionStatsTable::load(path).with_context(|| format!("loading {}", path.display()))?;
            let row = table.lookup(&region).with_context(|| format!("no stats for region '{}'", region))?;
            print_json(row)
        }
        Command::Parse { text } => {
            let text = if text == "-" {
                let mut buf = String::new();
                std::io::stdin().read_to_string(&mut buf).context("reading stdin")?;
                buf
            } else {
                text
            };
            let rings = geometry::parse_geometry(&text);
            print_json(&json!({
                "rings": rings,
                "bounds": Bounds::of_rings(rings.iter().map(|r| r.as_slice())),
            }))
        }
        Command::Serve { .. } => serve(config).await,
    }
}

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if config.log_format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn load_dataset(config: &Config) -> Result<DepositDataset> {
    DepositDataset::load(&config.dataset_path)
        .with_context(|| format!("loading deposit dataset {}", config.dataset_path.display()))
}

async fn fetch_regions(config: &Config) -> Result<Vec<Region>> {
    fetch_regions_with(Arc::new(ApiClient::from_config(config))).await
}

async fn fetch_regions_with(client: Arc<ApiClient>) -> Result<Vec<Region>> {
    let regions = tokio::task::spawn_blocking(move || client.fetch_regions()).await??;
    Ok(regions)
}

async fn serve(config: Config) -> Result<()> {
    let dataset = match DepositDataset::load(&config.dataset_path) {
        Ok(dataset) => dataset,
        Err(e) => {
            warn!(error = %e, "serving without a deposit dataset");
            DepositDataset::default()
        }
    };
    let stats = match config.region_stats_path {
        Some(ref path) => RegionStatsTable::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => RegionStatsTable::default(),
    };
    info!(
        api = %config.api_base_url,
        deposits = dataset.len(),
        stats = stats.rows().len(),
        offline = config.offline,
        "starting server"
    );

    let client = Arc::new(ApiClient::from_config(&config));
    let state = AppState::new(client, dataset, stats, config.fetch_concurrency);
    server::start(&config.listen_addr, state).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::try_parse_from(["nedra", "--api-url", "http://localhost:9000", "--concurrency", "0", "regions"]).unwrap();
        let mut config = Config::default();
        cli.apply(&mut config);
        assert_eq!(config.api_base_url, "http://localhost:9000");
        assert_eq!(config.fetch_concurrency, 1);
    }

    #[test]
    fn test_flags_document_env_vars() {
        let help = <Cli as clap::CommandFactory>::command().render_long_help().to_string();
        assert!(help.contains("NEDRA_API_URL"));
        assert!(help.contains("NEDRA_DATASET"));
    }
}
