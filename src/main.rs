use clap::Parser;
use std::path::PathBuf;
use tracing::{info, instrument};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use climate_indicators::config::Config;
use climate_indicators::params::IndicatorParams;
use climate_indicators::services::IndicatorService;
use climate_indicators::store::SeriesRepository;

#[derive(Parser)]
#[command(name = "climate-indicators")]
#[command(about = "Compute a climate indicator for one city and scenario", long_about = None)]
struct Cli {
    /// JSON series file
    #[arg(long, env = "INDICATORS_DATA_PATH")]
    data: Option<PathBuf>,

    /// Indicator name (see list-indicators)
    #[arg(long)]
    indicator: String,

    #[arg(long)]
    city: String,

    /// Emissions scenario, e.g. RCP85
    #[arg(long)]
    scenario: String,

    /// Comma-separated model names (default: all)
    #[arg(long)]
    models: Option<String>,

    /// Comma-separated years or ranges, e.g. "2050,2060:2070"
    #[arg(long)]
    years: Option<String>,

    /// yearly, monthly, quarterly, offset_yearly or custom
    #[arg(long)]
    time_aggregation: Option<String>,

    /// Custom spans, e.g. "1-1:3-31,6-1:8-31"
    #[arg(long)]
    custom_time_agg: Option<String>,

    /// Day offset for offset_yearly
    #[arg(long)]
    offset: Option<i64>,

    #[arg(long)]
    units: Option<String>,

    /// Comma-separated statistics, e.g. "min,max,avg,95th"
    #[arg(long)]
    agg: Option<String>,

    #[arg(long)]
    threshold: Option<f64>,

    #[arg(long)]
    threshold_units: Option<String>,

    /// gt, gte, lt or lte
    #[arg(long)]
    threshold_comparator: Option<String>,

    #[arg(long)]
    basetemp: Option<f64>,

    #[arg(long)]
    basetemp_units: Option<String>,

    #[arg(long)]
    percentile: Option<i64>,

    /// Start of the 30-year historic baseline: 1951, 1961, 1971 or 1981
    #[arg(long)]
    historic_range: Option<String>,

    /// Fail on missing data instead of skipping it
    #[arg(long)]
    strict: bool,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,
}

impl Cli {
    fn params(&self) -> IndicatorParams {
        IndicatorParams {
            models: self.models.clone(),
            years: self.years.clone(),
            time_aggregation: self.time_aggregation.clone(),
            custom_time_agg: self.custom_time_agg.clone(),
            offset: self.offset,
            units: self.units.clone(),
            agg: self.agg.clone(),
            threshold: self.threshold,
            threshold_units: self.threshold_units.clone(),
            threshold_comparator: self.threshold_comparator.clone(),
            basetemp: self.basetemp,
            basetemp_units: self.basetemp_units.clone(),
            percentile: self.percentile,
            historic_range: self.historic_range.clone(),
        }
    }
}

#[instrument]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables before clap reads its env fallbacks
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,climate_indicators=debug")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_line_number(true),
        )
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env()?;
    if cli.strict {
        config = config.strict(true);
    }
    info!("Starting climate indicators with config: {:?}", config);

    let path = cli
        .data
        .clone()
        .or_else(|| config.data_path.clone())
        .ok_or("No data file given (use --data or INDICATORS_DATA_PATH)")?;
    let repository = SeriesRepository::from_json_file(&path)?;

    let service = IndicatorService::new(repository, config);
    let result = service.calculate(&cli.indicator, &cli.city, &cli.scenario, &cli.params())?;

    let output = if cli.pretty {
        serde_json::to_string_pretty(&result)?
    } else {
        serde_json::to_string(&result)?
    };
    println!("{output}");

    Ok(())
}
