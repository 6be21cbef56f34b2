use std::path::Path;

use fwdtrack_core::EfficiencyMap;
use plotters::coord::{ranged1d::Ranged, types::RangedCoordf64, Shift};
use plotters::prelude::*;

use crate::{
    style::{axis_extent, heat_color, COLOR_SCALE_WIDTH, FONT, MAP_SIZE, TITLE_SIZE},
    PlotResult,
};

const SCALE_STEPS: usize = 50;

fn draw_cells<'a, DB, X>(
    chart: &mut ChartContext<'a, DB, Cartesian2d<X, RangedCoordf64>>,
    map: &EfficiencyMap,
    x_floor: f64,
) -> PlotResult<()>
where
    DB: DrawingBackend + 'a,
    DB::ErrorType: 'static,
    X: Ranged<ValueType = f64>,
{
    chart.draw_series(map.cells.iter().map(|cell| {
        let (x_low, x_high) = map.x_binning.bin_bounds(cell.ix);
        let (y_low, y_high) = map.y_binning.bin_bounds(cell.iy);
        Rectangle::new(
            [(x_low.max(x_floor), y_low), (x_high, y_high)],
            heat_color(cell.value).filled(),
        )
    }))?;
    Ok(())
}

fn draw_color_scale<DB>(area: &DrawingArea<DB, Shift>, label: &str) -> PlotResult<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let mut chart = ChartBuilder::on(area)
        .margin(15)
        .margin_top(60)
        .y_label_area_size(50)
        .build_cartesian_2d(0.0..1.0, 0.0..1.0)?;
    chart
        .configure_mesh()
        .disable_mesh()
        .disable_x_axis()
        .y_desc(label)
        .y_labels(6)
        .draw()?;
    let step = 1.0 / SCALE_STEPS as f64;
    chart.draw_series((0..SCALE_STEPS).map(|i| {
        let low = i as f64 * step;
        Rectangle::new(
            [(0.0, low), (1.0, low + step)],
            heat_color(low + 0.5 * step).filled(),
        )
    }))?;
    Ok(())
}

/// A heat map of `map` in value coordinates with a color scale on the right.
pub(crate) fn render_map(
    path: &Path,
    map: &EfficiencyMap,
    value_label: &str,
    log_x: bool,
) -> PlotResult<()> {
    let root = BitMapBackend::new(path, MAP_SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let (main, scale) = root.split_horizontally(MAP_SIZE.0 - COLOR_SCALE_WIDTH);

    let (x_min, x_max) = axis_extent(&map.x_binning, log_x);
    let (y_min, y_max) = map.y_binning.limits();
    let mut builder = ChartBuilder::on(&main);
    builder
        .caption(&map.title, (FONT, TITLE_SIZE))
        .margin(15)
        .x_label_area_size(45)
        .y_label_area_size(60);
    if log_x {
        let mut chart = builder.build_cartesian_2d((x_min..x_max).log_scale(), y_min..y_max)?;
        chart
            .configure_mesh()
            .disable_mesh()
            .x_desc(map.x_label.as_str())
            .y_desc(map.y_label.as_str())
            .draw()?;
        draw_cells(&mut chart, map, x_min)?;
    } else {
        let mut chart = builder.build_cartesian_2d(x_min..x_max, y_min..y_max)?;
        chart
            .configure_mesh()
            .disable_mesh()
            .x_desc(map.x_label.as_str())
            .y_desc(map.y_label.as_str())
            .draw()?;
        draw_cells(&mut chart, map, x_min)?;
    }
    draw_color_scale(&scale, value_label)?;
    root.present()?;
    Ok(())
}
