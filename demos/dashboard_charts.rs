//! demos/dashboard_charts.rs
//!
//! Loads an exported observation file, renders the dashboard for all stations
//! and shows its three charts in the browser with `plotlars`.
//!
//! To run this demo:
//! cargo run --example dashboard_charts --features plotting -- weather.json

use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;

use plotlars::{Legend, Line, Plot, Rgb, Text, TimeSeriesPlot};
use polars::prelude::*;
use weather_dashboard::{Chart, Dashboard, FileDocumentSource};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let path = std::env::args()
        .nth(1)
        .ok_or("usage: dashboard_charts <export.json>")?;

    // 1. Build a dashboard over the exported collection
    let dashboard = Dashboard::with_source(FileDocumentSource::new(path));

    // 2. Render with the default, wide open filter
    let view = dashboard.render().call().await?;
    for kpi in &view.kpis {
        println!("{}: {}", kpi.label, kpi.display);
    }

    // 3. Plot every chart
    for chart in [&view.temperature_trend, &view.hourly_profile, &view.pressure_trend] {
        plot_chart(chart)?;
    }
    println!("Plots shown in browser.");

    Ok(())
}

/// Spreads the per-location series of a chart into one column per location,
/// aligned on the x values.
fn wide_frame(chart: &Chart) -> PolarsResult<(DataFrame, Vec<String>)> {
    let xs: BTreeSet<String> = chart
        .series
        .iter()
        .flat_map(|s| s.points.iter().map(|p| p.x.to_string()))
        .collect();
    let xs: Vec<String> = xs.into_iter().collect();

    let mut columns = vec![Column::new("x".into(), xs.clone())];
    let mut names = Vec::new();
    for series in &chart.series {
        let by_x: BTreeMap<String, f64> = series
            .points
            .iter()
            .map(|p| (p.x.to_string(), p.y))
            .collect();
        let values: Vec<Option<f64>> = xs.iter().map(|x| by_x.get(x).copied()).collect();
        columns.push(Column::new(series.location.as_str().into(), values));
        names.push(series.location.clone());
    }
    Ok((DataFrame::new(columns)?, names))
}

fn plot_chart(chart: &Chart) -> Result<(), Box<dyn Error>> {
    let (data, names) = wide_frame(chart)?;
    let Some((first, rest)) = names.split_first() else {
        println!("{}: nothing to plot", chart.title);
        return Ok(());
    };
    let palette = [
        Rgb(235, 117, 0),
        Rgb(69, 157, 230),
        Rgb(80, 180, 90),
        Rgb(200, 60, 120),
    ];

    TimeSeriesPlot::builder()
        .data(&data)
        .x("x")
        .y(first.as_str())
        .additional_series(rest.iter().map(String::as_str).collect())
        .size(8)
        .colors(palette.iter().cycle().take(names.len()).cloned().collect())
        .lines(vec![Line::Solid; names.len()])
        .with_shape(chart.markers)
        .plot_title(Text::from(chart.title).font("Arial").size(18))
        .legend(&Legend::new().x(0.05).y(0.9))
        .x_title(chart.x_label)
        .y_title(Text::from(chart.y_label).color(Rgb(0, 0, 0)))
        .build()
        .plot();
    Ok(())
}
