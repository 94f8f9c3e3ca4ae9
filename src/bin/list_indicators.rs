/// List every indicator in the catalog with its units and parameters
use clap::Parser;

use climate_indicators::indicators::definitions::catalog_problems;
use climate_indicators::indicators::{ExtraParameter, INDICATORS};

#[derive(Parser)]
#[command(name = "list-indicators")]
#[command(about = "List available climate indicators", long_about = None)]
struct Cli {
    /// Print the catalog as JSON
    #[arg(long)]
    json: bool,
}

fn parameter_name(parameter: &ExtraParameter) -> &'static str {
    match parameter {
        ExtraParameter::Threshold => "threshold",
        ExtraParameter::BaseTemperature => "basetemp",
        ExtraParameter::Percentile { .. } => "percentile",
        ExtraParameter::HistoricRange => "historic_range",
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let problems = catalog_problems();
    if !problems.is_empty() {
        return Err(format!("Inconsistent indicator catalog:\n  {}", problems.join("\n  ")).into());
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(INDICATORS)?);
        return Ok(());
    }

    println!("{} indicators:\n", INDICATORS.len());
    for definition in INDICATORS {
        let aggregations: Vec<&str> = definition
            .valid_aggregations
            .iter()
            .map(|kind| kind.as_str())
            .collect();
        let parameters: Vec<&str> = definition.parameters.iter().map(parameter_name).collect();

        println!("  {} ({})", definition.name, definition.label);
        println!("      {}", definition.description);
        println!(
            "      units: {} (default {}), aggregations: {}",
            definition.family.unit_names().join(", "),
            definition.default_units,
            aggregations.join(", ")
        );
        if !parameters.is_empty() {
            println!("      parameters: {}", parameters.join(", "));
        }
    }

    Ok(())
}
