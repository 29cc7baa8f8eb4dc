mod cli;

use crate::cli::{build_source, get_config_info, get_log_level, setup_logger, OutputFormat};
use log::{info, warn};
use weather_dashboard::{Dashboard, Severity};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = get_config_info()?;
    setup_logger(get_log_level(&cli)).apply()?;

    let dashboard = Dashboard::builder()
        .source(build_source(&cli).await?)
        .preview_limit(cli.preview_limit())
        .build();
    info!("Weather dashboard reading {}", dashboard.source_description());

    if cli.controls {
        let controls = dashboard.controls().await?;
        match cli.format() {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&controls)?),
            OutputFormat::Text => {
                println!("Stations:");
                for station in &controls.stations {
                    println!("  {}", station);
                }
                match (controls.date_min, controls.date_max) {
                    (Some(min), Some(max)) => println!("Dates: {} .. {}", min, max),
                    _ => println!("Dates: none (no parseable timestamps)"),
                }
            }
        }
        return Ok(());
    }

    let rendered = dashboard
        .render()
        .maybe_stations(cli.stations())
        .maybe_start(cli.start_bound()?)
        .maybe_end(cli.end_bound()?)
        .call()
        .await;

    match rendered {
        Ok(view) => {
            match cli.format() {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&view)?),
                OutputFormat::Text => print!("{}", view),
            }
            Ok(())
        }
        Err(e) if e.severity() == Severity::Warning => {
            warn!("{}", e);
            println!("{}", e);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
