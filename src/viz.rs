//! Visualization functions using Plotters for cluster analysis

use crate::data::{RISK, STOCK};
use crate::model::Partition;
use crate::pipeline::CriticalReport;
use plotters::coord::types::RangedCoordf64;
use plotters::prelude::*;
use std::path::{Path, PathBuf};

/// Color palette for the clusters
const CLUSTER_COLORS: [RGBColor; 3] = [RED, BLUE, GREEN];

fn cluster_color(cluster: usize) -> RGBColor {
    CLUSTER_COLORS[cluster % CLUSTER_COLORS.len()]
}

/// Axis range covering `values` with 5% padding
fn padded_range(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if !min.is_finite() || !max.is_finite() {
        return (0.0, 1.0);
    }
    let pad = (max - min).max(1.0) * 0.05;
    (min - pad, max + pad)
}

/// Scatter plot of risk (x) against stock (y), coloured by cluster.
///
/// Members of the critical cluster are drawn larger and centroids are
/// squares. Plots carry no text: plotters is built without a font
/// backend, so captions, tick labels and legends are not drawn.
pub fn create_cluster_visualization(report: &CriticalReport, output_path: &Path) -> crate::Result<()> {
    let partition = &report.partition;
    let critical = report.selection.cluster;

    let (risk_min, risk_max) = padded_range(
        report
            .items
            .iter()
            .map(|item| item.risk)
            .chain(partition.centroids.column(RISK).iter().copied()),
    );
    let (stock_min, stock_max) = padded_range(
        report
            .items
            .iter()
            .map(|item| item.stock)
            .chain(partition.centroids.column(STOCK).iter().copied()),
    );

    let root = BitMapBackend::new(output_path, (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(20)
        .x_label_area_size(10)
        .y_label_area_size(10)
        .build_cartesian_2d(risk_min..risk_max, stock_min..stock_max)?;

    draw_axes(&mut chart)?;

    for (item, &cluster) in report.items.iter().zip(partition.labels.iter()) {
        let radius = if cluster == critical { 7 } else { 4 };
        let color = cluster_color(cluster);
        chart.draw_series(std::iter::once(Circle::new(
            (item.risk, item.stock),
            radius,
            color.filled(),
        )))?;
    }

    // Centroid squares sized relative to the axis spans
    let half_x = (risk_max - risk_min) * 0.01;
    let half_y = (stock_max - stock_min) * 0.01;
    for (cluster_id, centroid) in partition.centroids.outer_iter().enumerate() {
        let (x, y) = (centroid[RISK], centroid[STOCK]);
        let color = cluster_color(cluster_id);
        chart.draw_series(std::iter::once(Rectangle::new(
            [(x - half_x, y - half_y), (x + half_x, y + half_y)],
            color.filled(),
        )))?;

        // Black outline marks the critical centroid
        if cluster_id == critical {
            chart.draw_series(std::iter::once(Rectangle::new(
                [(x - 2.0 * half_x, y - 2.0 * half_y), (x + 2.0 * half_x, y + 2.0 * half_y)],
                BLACK.stroke_width(2),
            )))?;
        }
    }

    root.present()?;
    tracing::info!(path = %output_path.display(), "cluster visualization saved");

    Ok(())
}

/// Axis lines only; zero tick labels keeps the mesh free of text.
fn draw_axes<'a, DB: DrawingBackend>(
    chart: &mut ChartContext<'a, DB, Cartesian2d<RangedCoordf64, RangedCoordf64>>,
) -> Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
    chart
        .configure_mesh()
        .x_labels(0)
        .y_labels(0)
        .draw()
}

/// Bar chart of products per cluster
pub fn create_cluster_size_chart(partition: &Partition, output_path: &Path) -> crate::Result<()> {
    let cluster_sizes = partition.cluster_sizes();
    let max_size = *cluster_sizes.iter().max().unwrap_or(&1) as f64;

    let root = BitMapBackend::new(output_path, (600, 400)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(20)
        .x_label_area_size(10)
        .y_label_area_size(10)
        .build_cartesian_2d(
            -0.5f64..(partition.n_clusters() as f64 - 0.5),
            0f64..(max_size.max(1.0) * 1.1),
        )?;

    draw_axes(&mut chart)?;

    for (cluster_id, &size) in cluster_sizes.iter().enumerate() {
        chart.draw_series(std::iter::once(Rectangle::new(
            [(cluster_id as f64 - 0.4, 0.0), (cluster_id as f64 + 0.4, size as f64)],
            cluster_color(cluster_id).filled(),
        )))?;
    }

    root.present()?;
    tracing::info!(path = %output_path.display(), "cluster size chart saved");

    Ok(())
}

/// Render cluster statistics as a text table
pub fn format_cluster_statistics(report: &CriticalReport) -> String {
    let partition = &report.partition;
    let total = report.items.len().max(1) as f64;
    let mut out = String::new();

    out.push_str("=== Cluster Statistics ===\n");
    out.push_str(&format!("Total products: {}\n", report.items.len()));
    out.push_str(&format!(
        "Iterations: {} ({})\n",
        partition.iterations,
        if partition.converged {
            "converged"
        } else {
            "iteration cap reached"
        }
    ));
    out.push_str(&format!(
        "Within-cluster sum of squares (Inertia): {:.4}\n",
        partition.inertia
    ));
    out.push_str("  Cluster |  Size |  Risk  |   Stock   | Repetitions | Score\n");
    out.push_str("  --------|-------|--------|-----------|-------------|-------\n");

    for summary in &report.selection.ranking {
        let marker = if summary.cluster == report.selection.cluster {
            " *"
        } else {
            ""
        };
        out.push_str(&format!(
            "  {:7} | {:5} | {:6.3} | {:9.2} | {:11.2} | {:.4}{} ({:.1}%)\n",
            summary.cluster,
            summary.size,
            summary.centroid[0],
            summary.centroid[1],
            summary.centroid[2],
            summary.score,
            marker,
            summary.size as f64 / total * 100.0
        ));
    }

    out
}

/// Path of the size chart that accompanies `base`
pub fn size_chart_path(base: &Path) -> PathBuf {
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "clusters".to_string());
    base.with_file_name(format!("{}_sizes.png", stem))
}

/// Generate the scatter plot and the size chart
pub fn generate_visualization_report(report: &CriticalReport, base_output_path: &Path) -> crate::Result<()> {
    create_cluster_visualization(report, base_output_path)?;
    create_cluster_size_chart(&report.partition, &size_chart_path(base_output_path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Item;
    use crate::model::KMeansConfig;
    use crate::pipeline::suggest_items;
    use crate::selector::SelectorConfig;
    use tempfile::tempdir;

    fn create_test_report() -> CriticalReport {
        let items = vec![
            Item::new("P1", 0.9, 0.0, 10),
            Item::new("P2", 0.1, 100.0, 0),
            Item::new("P3", 0.8, 1.0, 8),
            Item::new("P4", 0.2, 90.0, 1),
            Item::new("P5", 0.5, 40.0, 3),
            Item::new("P6", 0.4, 45.0, 2),
        ];
        suggest_items(items, &KMeansConfig::default(), &SelectorConfig::default()).unwrap()
    }

    #[test]
    fn test_create_cluster_visualization() {
        let report = create_test_report();
        let temp_dir = tempdir().unwrap();
        let output_path = temp_dir.path().join("test_plot.png");

        let result = create_cluster_visualization(&report, &output_path);
        assert!(result.is_ok());
        assert!(output_path.exists());
    }

    #[test]
    fn test_create_cluster_size_chart() {
        let report = create_test_report();
        let temp_dir = tempdir().unwrap();
        let output_path = temp_dir.path().join("test_sizes.png");

        let result = create_cluster_size_chart(&report.partition, &output_path);
        assert!(result.is_ok());
        assert!(output_path.exists());
    }

    #[test]
    fn test_generate_visualization_report() {
        let report = create_test_report();
        let temp_dir = tempdir().unwrap();
        let output_path = temp_dir.path().join("report.png");

        let result = generate_visualization_report(&report, &output_path);
        assert!(result.is_ok());
        assert!(output_path.exists());
        assert!(temp_dir.path().join("report_sizes.png").exists());
    }

    #[test]
    fn test_format_cluster_statistics_marks_critical() {
        let report = create_test_report();
        let text = format_cluster_statistics(&report);

        assert!(text.contains("Total products: 6"));
        assert_eq!(text.matches(" *").count(), 1);
    }

    #[test]
    fn test_size_chart_path() {
        assert_eq!(
            size_chart_path(Path::new("out/plot.png")),
            PathBuf::from("out/plot_sizes.png")
        );
    }

    #[test]
    fn test_padded_range_handles_constant_values() {
        let (lo, hi) = padded_range([2.0, 2.0].into_iter());
        assert!(lo < 2.0 && hi > 2.0);
        assert_eq!(padded_range(std::iter::empty()), (0.0, 1.0));
    }
}
