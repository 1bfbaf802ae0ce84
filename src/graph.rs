#![cfg(not(tarpaulin_include))]
#![cfg(feature = "web")]
use crate::dashboard::DashboardStats;
use crate::record::{Asset, MONITOR_RATIO, REPLACE_NOW_RATIO, Repair, WARNING_RATIO};
use plotters::prelude::*;
use std::error::Error;
use std::path::Path;

/// Available graph types
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GraphType {
    /// Line graph - running totals over successive repairs
    Line,

    /// Bar graph - one bar per asset
    Bar,
}

/// Configuration options for graph generation
#[derive(Clone, Debug)]
pub struct GraphOptions {
    /// Title displayed at the top of the graph
    pub title: String,

    /// Label for the X-axis
    pub x_label: String,

    /// Label for the Y-axis
    pub y_label: String,

    /// Width of the graph in pixels
    pub width: u32,

    /// Height of the graph in pixels
    pub height: u32,

    /// Type of graph to generate
    pub graph_type: GraphType,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            title: "Graph".to_string(),
            x_label: "X Axis".to_string(),
            y_label: "Y Axis".to_string(),
            width: 800,
            height: 600,
            graph_type: GraphType::Bar,
        }
    }
}

/// Bars for the dashboard's top problem assets: `(asset name, total repairs)`.
pub fn top_problem_series(stats: &DashboardStats) -> Vec<(String, f64)> {
    stats
        .top_problems
        .iter()
        .map(|p| (p.name.clone(), p.total_repairs))
        .collect()
}

/// Cumulative repair spend after each repair, starting from `(0, 0)`.
///
/// Built from each repair's own cost rather than its stored running-total snapshot,
/// which goes stale once earlier repairs are deleted.
pub fn running_total_series(repairs: &[Repair]) -> Vec<(f64, f64)> {
    let mut points = Vec::with_capacity(repairs.len() + 1);
    points.push((0.0, 0.0));
    let mut total = 0.0;
    for (i, repair) in repairs.iter().enumerate() {
        total += repair.total_cost;
        points.push(((i + 1) as f64, total));
    }
    points
}

/// Creates a PNG chart of the assets with the highest repair spend
///
/// # Arguments
/// * `stats` - Dashboard figures; only `top_problems` is drawn
/// * `options` - Graph styling options. `Line` draws a line through the bar tops
///
/// # Returns
/// * A Result containing the PNG image data as bytes or an error
pub fn create_top_problems_graph(
    stats: &DashboardStats,
    options: &GraphOptions,
) -> Result<Vec<u8>, Box<dyn Error>> {
    let series = top_problem_series(stats);
    render_png(|path| draw_bars(path, &series, options))
}

/// Creates a PNG chart of an asset's running repair total
///
/// Horizontal guides mark the MONITOR, WARNING and REPLACE NOW levels for the
/// asset's replacement cost.
///
/// # Arguments
/// * `asset` - The asset whose history is drawn
/// * `repairs` - The asset's repairs in recorded order
/// * `options` - Graph styling options
///
/// # Returns
/// * A Result containing the PNG image data as bytes or an error
pub fn create_repair_history_graph(
    asset: &Asset,
    repairs: &[Repair],
    options: &GraphOptions,
) -> Result<Vec<u8>, Box<dyn Error>> {
    let points = running_total_series(repairs);
    render_png(|path| {
        draw_history(path, &points, asset.replacement_cost, options)
    })
}

// plotters encodes PNG by file extension, so draw into a temp file and read it back
fn render_png(
    draw: impl FnOnce(&Path) -> Result<(), Box<dyn Error>>,
) -> Result<Vec<u8>, Box<dyn Error>> {
    let file = tempfile::Builder::new()
        .prefix("ledger_graph")
        .suffix(".png")
        .tempfile()?;
    draw(file.path())?;
    let buffer = std::fs::read(file.path())?;
    Ok(buffer)
}

fn draw_bars(
    path: &Path,
    series: &[(String, f64)],
    options: &GraphOptions,
) -> Result<(), Box<dyn Error>> {
    let root = BitMapBackend::new(path, (options.width, options.height)).into_drawing_area();
    root.fill(&WHITE)?;

    let count = series.len().max(1);
    let max_y = series.iter().map(|(_, v)| *v).fold(0.0, f64::max).max(1.0);

    let mut chart = ChartBuilder::on(&root)
        .caption(&options.title, ("sans-serif", 30).into_font())
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0f64..count as f64, 0f64..max_y * 1.1)?;

    let label_for = |x: &f64| -> String {
        series
            .get(x.floor() as usize)
            .map(|(name, _)| name.clone())
            .unwrap_or_default()
    };

    chart
        .configure_mesh()
        .x_desc(&options.x_label)
        .y_desc(&options.y_label)
        .x_labels(count * 2)
        .x_label_formatter(&label_for)
        .draw()?;

    match options.graph_type {
        GraphType::Bar => {
            chart.draw_series(series.iter().enumerate().map(|(i, (_, v))| {
                let x = i as f64;
                Rectangle::new([(x + 0.15, 0.0), (x + 0.85, *v)], BLUE.filled())
            }))?;
        }
        GraphType::Line => {
            chart.draw_series(LineSeries::new(
                series
                    .iter()
                    .enumerate()
                    .map(|(i, (_, v))| (i as f64 + 0.5, *v)),
                &BLUE,
            ))?;
        }
    }

    root.present()?;
    Ok(())
}

fn draw_history(
    path: &Path,
    points: &[(f64, f64)],
    replacement_cost: f64,
    options: &GraphOptions,
) -> Result<(), Box<dyn Error>> {
    let root = BitMapBackend::new(path, (options.width, options.height)).into_drawing_area();
    root.fill(&WHITE)?;

    let max_x = points.last().map(|(x, _)| *x).unwrap_or(0.0).max(1.0);
    let max_total = points.iter().map(|(_, y)| *y).fold(0.0, f64::max);
    let max_y = max_total.max(replacement_cost).max(1.0) * 1.1;

    let mut chart = ChartBuilder::on(&root)
        .caption(&options.title, ("sans-serif", 30).into_font())
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(60)
        .build_cartesian_2d(0f64..max_x, 0f64..max_y)?;

    chart
        .configure_mesh()
        .x_desc(&options.x_label)
        .y_desc(&options.y_label)
        .draw()?;

    if replacement_cost > 0.0 {
        for (ratio, color) in [
            (MONITOR_RATIO, &YELLOW),
            (WARNING_RATIO, &MAGENTA),
            (REPLACE_NOW_RATIO, &RED),
        ] {
            let level = replacement_cost * ratio;
            chart.draw_series(LineSeries::new(vec![(0.0, level), (max_x, level)], color))?;
        }
    }

    chart.draw_series(LineSeries::new(points.iter().copied(), &BLUE))?;
    chart.draw_series(
        points
            .iter()
            .map(|&(x, y)| Circle::new((x, y), 3, BLUE.filled())),
    )?;

    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::TopProblem;
    use crate::record::AssetStatus;

    #[test]
    fn running_totals_accumulate_repair_costs() {
        let repairs: Vec<Repair> = [100.0, 50.0, 25.0]
            .iter()
            .enumerate()
            .map(|(i, cost)| Repair {
                repair_id: format!("R{}", i),
                asset_id: "A1".to_string(),
                repair_date: None,
                part_name: String::new(),
                part_cost: *cost,
                labor_hours: 0.0,
                labor_rate: 0.0,
                labor_cost: 0.0,
                total_cost: *cost,
                // stale snapshot, must be ignored
                running_total: 0.0,
                percent_of_replacement: 0.0,
                notes: String::new(),
                timestamp: None,
            })
            .collect();

        assert_eq!(
            running_total_series(&repairs),
            vec![(0.0, 0.0), (1.0, 100.0), (2.0, 150.0), (3.0, 175.0)]
        );
    }

    #[test]
    fn top_problem_bars_follow_dashboard_order() {
        let stats = DashboardStats {
            top_problems: vec![
                TopProblem {
                    id: "A2".to_string(),
                    name: "Oven".to_string(),
                    total_repairs: 800.0,
                    percent_of_replacement: 0.8,
                    status: AssetStatus::ReplaceNow,
                },
                TopProblem {
                    id: "A1".to_string(),
                    name: "Fryer".to_string(),
                    total_repairs: 300.0,
                    percent_of_replacement: 0.3,
                    status: AssetStatus::Good,
                },
            ],
            ..Default::default()
        };
        assert_eq!(
            top_problem_series(&stats),
            vec![("Oven".to_string(), 800.0), ("Fryer".to_string(), 300.0)]
        );
    }
}
