use std::path::Path;

use fwdtrack_core::{distributions::ColumnDistributions, Histogram1D};
use plotters::coord::Shift;
use plotters::prelude::*;

use crate::{
    style::{FONT, PANEL_SIZE, PANEL_TITLE_SIZE},
    PlotResult,
};

/// Rows and columns of a panel grid holding `n` charts.
pub(crate) fn grid_shape(n: usize) -> (usize, usize) {
    match n {
        0 | 1 => (1, 1),
        2 => (1, 2),
        n => ((n + 1) / 2, 2),
    }
}

fn draw_histogram<DB>(
    area: &DrawingArea<DB, Shift>,
    hist: &Histogram1D,
    color: RGBAColor,
) -> PlotResult<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let (x_min, x_max) = hist.binning.limits();
    let y_max = if hist.maximum() > 0.0 {
        1.1 * hist.maximum()
    } else {
        1.0
    };
    let mut chart = ChartBuilder::on(area)
        .caption(&hist.title, (FONT, PANEL_TITLE_SIZE))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_min..x_max, 0.0..y_max)?;
    chart
        .configure_mesh()
        .x_desc(hist.x_label.as_str())
        .y_desc("Entries")
        .draw()?;
    chart.draw_series((0..hist.n_bins()).filter_map(|bin| {
        let count = hist.bin_content(bin);
        (count > 0.0).then(|| {
            let (low, high) = hist.binning.bin_bounds(bin);
            Rectangle::new([(low, 0.0), (high, count)], color.mix(0.6).filled())
        })
    }))?;
    Ok(())
}

/// One panel per track type for a single raw column.
pub(crate) fn render_distributions(
    path: &Path,
    distributions: &ColumnDistributions,
) -> PlotResult<()> {
    let root = BitMapBackend::new(path, PANEL_SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let panels = root.split_evenly(grid_shape(distributions.histograms.len()));
    for (slot, (panel, (_, hist))) in panels.iter().zip(&distributions.histograms).enumerate() {
        draw_histogram(panel, hist, Palette99::pick(slot).to_rgba())?;
    }
    root.present()?;
    Ok(())
}
