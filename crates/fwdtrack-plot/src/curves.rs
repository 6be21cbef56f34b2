use std::path::Path;

use fwdtrack_core::{EfficiencyCurve, TrackVariable};
use indexmap::IndexMap;
use log::warn;
use plotters::coord::{ranged1d::Ranged, types::RangedCoordf64, Shift};
use plotters::prelude::*;

use crate::{
    style::{
        axis_extent, is_log_axis, EFFICIENCY_COLOR, FONT, PANEL_SIZE, PANEL_TITLE_SIZE, PLOT_SIZE,
        PURITY_COLOR, RATIO_MAX, TITLE_SIZE,
    },
    PlotResult,
};

/// Variables of the summary panels, row by row.
pub const SUMMARY_VARIABLES: [TrackVariable; 4] = [
    TrackVariable::Pt,
    TrackVariable::Phi,
    TrackVariable::NClusters,
    TrackVariable::Chi2,
];

/// One curve to draw, with its color and legend entry.
pub(crate) struct CurveStyle<'c> {
    pub curve: &'c EfficiencyCurve,
    pub color: RGBColor,
    pub label: &'c str,
}

fn draw_curve<'a, DB, X>(
    chart: &mut ChartContext<'a, DB, Cartesian2d<X, RangedCoordf64>>,
    style: &CurveStyle,
    x_floor: f64,
) -> PlotResult<()>
where
    DB: DrawingBackend + 'a,
    DB::ErrorType: 'static,
    X: Ranged<ValueType = f64>,
{
    let color = style.color;
    let points = &style.curve.points;
    // vertical bars span the confidence interval, horizontal ones the bin width
    chart.draw_series(points.iter().map(|p| {
        ErrorBar::new_vertical(p.x.max(x_floor), p.lower, p.value, p.upper, color, 8)
    }))?;
    chart.draw_series(points.iter().map(|p| {
        PathElement::new(
            vec![(p.x_low.max(x_floor), p.value), (p.x_high, p.value)],
            color,
        )
    }))?;
    chart
        .draw_series(
            points
                .iter()
                .map(|p| Circle::new((p.x.max(x_floor), p.value), 4, color.filled())),
        )?
        .label(style.label)
        .legend(move |(x, y)| Circle::new((x + 10, y), 4, color.filled()));
    Ok(())
}

fn draw_legend<'a, DB, X>(
    chart: &mut ChartContext<'a, DB, Cartesian2d<X, RangedCoordf64>>,
) -> PlotResult<()>
where
    DB: DrawingBackend + 'a,
    DB::ErrorType: 'static,
    X: Ranged<ValueType = f64>,
{
    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::LowerRight)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    Ok(())
}

/// Draw `curves` into one chart filling `area`. All curves share the binning of the first.
pub(crate) fn draw_curves<DB>(
    area: &DrawingArea<DB, Shift>,
    title: &str,
    y_desc: &str,
    curves: &[CurveStyle],
    log_x: bool,
    title_size: u32,
) -> PlotResult<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let first = curves.first().ok_or("no curve to draw")?;
    let (x_min, x_max) = axis_extent(&first.curve.binning, log_x);
    let x_desc = first.curve.x_label.as_str();

    let mut builder = ChartBuilder::on(area);
    builder
        .caption(title, (FONT, title_size))
        .margin(15)
        .x_label_area_size(45)
        .y_label_area_size(60);
    if log_x {
        let mut chart = builder.build_cartesian_2d((x_min..x_max).log_scale(), 0.0..RATIO_MAX)?;
        chart
            .configure_mesh()
            .x_desc(x_desc)
            .y_desc(y_desc)
            .draw()?;
        for style in curves {
            draw_curve(&mut chart, style, x_min)?;
        }
        draw_legend(&mut chart)?;
    } else {
        let mut chart = builder.build_cartesian_2d(x_min..x_max, 0.0..RATIO_MAX)?;
        chart
            .configure_mesh()
            .x_desc(x_desc)
            .y_desc(y_desc)
            .draw()?;
        for style in curves {
            draw_curve(&mut chart, style, x_min)?;
        }
        draw_legend(&mut chart)?;
    }
    Ok(())
}

fn render_single(
    path: &Path,
    title: &str,
    y_desc: &str,
    curves: &[CurveStyle],
    log_x: bool,
) -> PlotResult<()> {
    let root = BitMapBackend::new(path, PLOT_SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    draw_curves(&root, title, y_desc, curves, log_x, TITLE_SIZE)?;
    root.present()?;
    Ok(())
}

/// Efficiency vs `variable` with its asymmetric intervals.
pub(crate) fn render_efficiency(
    path: &Path,
    variable: TrackVariable,
    curve: &EfficiencyCurve,
) -> PlotResult<()> {
    render_single(
        path,
        &format!("Matching efficiency vs {}", variable.axis_label()),
        "Efficiency",
        &[CurveStyle {
            curve,
            color: EFFICIENCY_COLOR,
            label: "Efficiency",
        }],
        is_log_axis(variable),
    )
}

/// Purity vs `variable` with its asymmetric intervals.
pub(crate) fn render_purity(
    path: &Path,
    variable: TrackVariable,
    curve: &EfficiencyCurve,
) -> PlotResult<()> {
    render_single(
        path,
        &format!("Matching purity vs {}", variable.axis_label()),
        "Purity",
        &[CurveStyle {
            curve,
            color: PURITY_COLOR,
            label: "Purity",
        }],
        is_log_axis(variable),
    )
}

/// Efficiency and purity vs `variable` on one chart.
pub(crate) fn render_combined(
    path: &Path,
    variable: TrackVariable,
    efficiency: &EfficiencyCurve,
    purity: &EfficiencyCurve,
) -> PlotResult<()> {
    render_single(
        path,
        &format!("Efficiency and purity vs {}", variable.axis_label()),
        "Efficiency / Purity",
        &[
            CurveStyle {
                curve: efficiency,
                color: EFFICIENCY_COLOR,
                label: "Efficiency",
            },
            CurveStyle {
                curve: purity,
                color: PURITY_COLOR,
                label: "Purity",
            },
        ],
        is_log_axis(variable),
    )
}

/// A 2×2 panel of efficiency curves over [`SUMMARY_VARIABLES`]. Panels without a curve stay
/// blank.
pub(crate) fn render_summary(
    path: &Path,
    curves: &IndexMap<TrackVariable, EfficiencyCurve>,
) -> PlotResult<()> {
    let root = BitMapBackend::new(path, PANEL_SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let panels = root.split_evenly((2, 2));
    for (panel, variable) in panels.iter().zip(SUMMARY_VARIABLES) {
        let Some(curve) = curves.get(&variable) else {
            warn!("No efficiency curve for {variable}, leaving its summary panel empty");
            continue;
        };
        draw_curves(
            panel,
            &format!("Efficiency vs {}", variable.axis_label()),
            "Efficiency",
            &[CurveStyle {
                curve,
                color: EFFICIENCY_COLOR,
                label: "Efficiency",
            }],
            is_log_axis(variable),
            PANEL_TITLE_SIZE,
        )?;
    }
    root.present()?;
    Ok(())
}
