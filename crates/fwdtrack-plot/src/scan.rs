use std::path::Path;

use fwdtrack_core::{optimize::ThresholdPoint, ThresholdScanResult};
use plotters::prelude::*;

use crate::{
    style::{EFFICIENCY_COLOR, FONT, PLOT_SIZE, PURITY_COLOR, RATIO_MAX, TITLE_SIZE},
    PlotResult,
};

/// The curves of the scan plot: label, color, line width and the value drawn.
pub(crate) const SCAN_SERIES: [(&str, RGBColor, u32, fn(&ThresholdPoint) -> f64); 3] = [
    ("Efficiency × purity", BLACK, 3, |p| p.product),
    ("Efficiency", EFFICIENCY_COLOR, 1, |p| p.efficiency),
    ("Purity", PURITY_COLOR, 1, |p| p.purity),
];

/// Efficiency, purity and their product vs the matching-χ² threshold on a log axis, with the
/// maximum of the product marked.
pub(crate) fn render_threshold_scan(path: &Path, scan: &ThresholdScanResult) -> PlotResult<()> {
    let (first, last) = match (scan.points.first(), scan.points.last()) {
        (Some(first), Some(last)) => (first.threshold, last.threshold),
        _ => return Err("threshold scan has no points".into()),
    };
    let x_min = 0.8 * first;
    let x_max = (1.25 * last).max(2.0 * x_min);

    let root = BitMapBackend::new(path, PLOT_SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(
            "Efficiency × purity vs matching χ² threshold",
            (FONT, TITLE_SIZE),
        )
        .margin(15)
        .x_label_area_size(45)
        .y_label_area_size(60)
        .build_cartesian_2d((x_min..x_max).log_scale(), 0.0..RATIO_MAX)?;
    chart
        .configure_mesh()
        .x_desc("χ² threshold")
        .y_desc("Value")
        .draw()?;

    for (label, color, width, value) in SCAN_SERIES {
        let points = scan.points.iter().map(|p| (p.threshold, value(p)));
        chart
            .draw_series(LineSeries::new(points, color.stroke_width(width)))?
            .label(label)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
    }

    chart.draw_series(std::iter::once(
        EmptyElement::at((scan.best_threshold, scan.best_product))
            + Circle::new((0, 0), 6, RED.filled())
            + Text::new(
                format!("Max: {}", scan.best_threshold),
                (8, -22),
                (FONT, 16).into_font(),
            ),
    ))?;

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::LowerRight)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    root.present()?;
    Ok(())
}
