use std::io::Cursor;
use std::sync::OnceLock;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Duration, Utc};
use image::{DynamicImage, ImageFormat, RgbImage};
use plotters::prelude::*;
use plotters::style::FontStyle;

use crate::models::Reading;

pub const CHART_WIDTH_PX: u32 = 1000;
pub const CHART_HEIGHT_PX: u32 = 500;

/// Reference glucose level drawn across the chart, in mg/dL.
pub const TARGET_MG_DL: f64 = 120.0;

/// Bundled so labels render the same on hosts without system fonts.
const CHART_FONT: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans.ttf");

fn ensure_font_registered() -> Result<()> {
    static REGISTERED: OnceLock<Result<(), String>> = OnceLock::new();
    REGISTERED
        .get_or_init(|| {
            plotters::style::register_font(
                ChartStyle::CAPTION_FONT_FAMILY,
                FontStyle::Normal,
                CHART_FONT,
            )
            .map_err(|_| "invalid font data".to_string())
        })
        .clone()
        .map_err(|error| anyhow!("chart font registration failed: {error}"))
}

struct ChartStyle;

impl ChartStyle {
    const TITLE: &'static str = "Blood Sugar Over Time";
    const MARGIN: i32 = 16;
    const CAPTION_FONT_FAMILY: &'static str = "sans-serif";
    const CAPTION_FONT_SIZE: i32 = 24;
    const X_LABEL_AREA_SIZE: u32 = 40;
    const Y_LABEL_AREA_SIZE: u32 = 56;
    const X_LABEL_COUNT: usize = 8;
    const Y_LABEL_COUNT: usize = 8;
    const Y_PADDING: f64 = 10.0;
    const LINE_WIDTH: u32 = 2;
    const MARKER_RADIUS: i32 = 4;
    const BACKGROUND: RGBColor = WHITE;
    const SERIES: RGBColor = RGBColor(0x66, 0x7e, 0xea);
    const TARGET_LINE: RGBColor = RGBColor(0xe5, 0x3e, 0x3e);
    const TARGET_ALPHA: f64 = 0.4;
    const GRID_ALPHA: f64 = 0.3;
}

/// Render readings (ascending by `measured_at`) as a PNG line chart.
///
/// Returns `Ok(None)` for an empty slice; the renderer is never invoked
/// without data.
pub fn render_reading_chart(readings: &[Reading]) -> Result<Option<Vec<u8>>> {
    let (Some(first), Some(last)) = (readings.first(), readings.last()) else {
        return Ok(None);
    };
    ensure_font_registered()?;

    let width = CHART_WIDTH_PX;
    let height = CHART_HEIGHT_PX;
    let mut rgb_buffer = vec![255u8; width as usize * height as usize * 3];

    let points: Vec<(DateTime<Utc>, f64)> = readings
        .iter()
        .map(|r| (r.measured_at.and_utc(), r.value))
        .collect();

    {
        let drawing_area =
            BitMapBackend::with_buffer(&mut rgb_buffer, (width, height)).into_drawing_area();
        drawing_area
            .fill(&ChartStyle::BACKGROUND)
            .map_err(|error| anyhow!("background fill error: {error:?}"))?;

        let mut x_start = first.measured_at.and_utc();
        let mut x_end = last.measured_at.and_utc();
        if x_start >= x_end {
            x_start -= Duration::hours(1);
            x_end += Duration::hours(1);
        }

        let (y_min, y_max) = value_range(readings);

        let mut chart = ChartBuilder::on(&drawing_area)
            .margin(ChartStyle::MARGIN)
            .caption(
                ChartStyle::TITLE,
                (ChartStyle::CAPTION_FONT_FAMILY, ChartStyle::CAPTION_FONT_SIZE),
            )
            .x_label_area_size(ChartStyle::X_LABEL_AREA_SIZE)
            .y_label_area_size(ChartStyle::Y_LABEL_AREA_SIZE)
            .build_cartesian_2d(x_start..x_end, y_min..y_max)
            .map_err(|error| anyhow!("chart build error: {error:?}"))?;

        chart
            .configure_mesh()
            .x_labels(ChartStyle::X_LABEL_COUNT)
            .y_labels(ChartStyle::Y_LABEL_COUNT)
            .x_label_formatter(&|x: &DateTime<Utc>| x.format("%m-%d %H:%M").to_string())
            .light_line_style(BLACK.mix(ChartStyle::GRID_ALPHA * 0.3))
            .bold_line_style(BLACK.mix(ChartStyle::GRID_ALPHA))
            .x_desc("Date")
            .y_desc("mg/dL")
            .draw()
            .map_err(|error| anyhow!("mesh draw error: {error:?}"))?;

        chart
            .draw_series(std::iter::once(PathElement::new(
                vec![(x_start, TARGET_MG_DL), (x_end, TARGET_MG_DL)],
                ChartStyle::TARGET_LINE.mix(ChartStyle::TARGET_ALPHA),
            )))
            .map_err(|error| anyhow!("target draw error: {error:?}"))?;

        chart
            .draw_series(std::iter::once(PathElement::new(
                points.clone(),
                ChartStyle::SERIES.stroke_width(ChartStyle::LINE_WIDTH),
            )))
            .map_err(|error| anyhow!("series draw error: {error:?}"))?;

        chart
            .draw_series(points.iter().map(|&point| {
                Circle::new(point, ChartStyle::MARKER_RADIUS, ChartStyle::SERIES.filled())
            }))
            .map_err(|error| anyhow!("marker draw error: {error:?}"))?;

        drawing_area
            .present()
            .map_err(|error| anyhow!("present error: {error:?}"))?;
    }

    let rgb_image = RgbImage::from_raw(width, height, rgb_buffer)
        .context("image buffer conversion failed")?;
    let mut output = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(rgb_image)
        .write_to(&mut output, ImageFormat::Png)
        .context("png encoding failed")?;

    let png = output.into_inner();
    log::debug!("rendered chart points={} bytes={}", readings.len(), png.len());
    Ok(Some(png))
}

/// Y axis bounds covering every value and the target line.
fn value_range(readings: &[Reading]) -> (f64, f64) {
    let (low, high) = readings.iter().fold((TARGET_MG_DL, TARGET_MG_DL), |(lo, hi), r| {
        (lo.min(r.value), hi.max(r.value))
    });
    (
        (low - ChartStyle::Y_PADDING).max(0.0),
        high + ChartStyle::Y_PADDING,
    )
}
