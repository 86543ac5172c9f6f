//! Figure orchestration: basemap, coverage overlay, measurement
//! layers and the output file.

mod style;

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use image::{imageops, imageops::FilterType, Rgba, RgbaImage};
use plotters::element::BitMapElement;
use plotters::prelude::*;
use plotters::style::{
    text_anchor::{HPos, Pos, VPos},
    FontTransform,
};
use tracing::debug;

use crate::{
    bounds::BoundingBox,
    config::Config,
    coverage::{self, Operator},
    http::Downloader,
    measurements::{DisplayInfoRecord, LocationRecord, SignalRecord},
    mercator::{self, Extent},
    model::{ImageSize, NetworkType},
    tiles,
};

pub struct RenderOptions {
    pub measurement_id: String,
    pub network_type: Option<NetworkType>,
    pub padding_degrees: f64,
    pub aspect_ratio: f64,
    pub dpi: u32,
    pub operator: Option<&'static Operator>,
    pub title: Option<String>,
    pub show_title: bool,
    pub vmin: Option<f64>,
    pub vmax: Option<f64>,
    pub plot_rsrq: bool,
    pub use_cache: bool,
}

const BAR_WIDTH: u32 = 90;
const TITLE_HEIGHT: u32 = 40;
/// Coverage images are requested at this pixel height; width follows
/// the figure's aspect ratio.
const COVERAGE_HEIGHT_PX: u32 = 2000;

pub fn run(
    opts: &RenderOptions,
    location: Option<&[LocationRecord]>,
    signal: Option<&[SignalRecord]>,
    display_info: Option<&[DisplayInfoRecord]>,
    config: &Config,
    downloader: &dyn Downloader,
) -> Result<PathBuf> {
    let points = bounding_points(location, signal, display_info)?;
    let bounds = BoundingBox::from_points(&points, opts.padding_degrees)?;
    let extent = Extent::from_bounds(&bounds).to_aspect(opts.aspect_ratio);

    let map_h = (opts.dpi as f64 * 7.2).round() as u32;
    let map_w = (map_h as f64 * opts.aspect_ratio).round() as u32;
    debug!(map_w, map_h, "figure map area in pixels");

    let mut base = tiles::basemap(
        downloader,
        &config.out_dir.join("tiles"),
        &config.tile_url,
        &extent,
        map_w,
        map_h,
    )?;

    if let Some(operator) = opts.operator {
        let network_type = opts
            .network_type
            .context("a network type is required for operator coverage")?;
        let size = ImageSize {
            width: (COVERAGE_HEIGHT_PX as f64 * opts.aspect_ratio).round() as u32,
            height: COVERAGE_HEIGHT_PX,
        };
        // Fetch for the aspect-adjusted extent, not the raw bounding
        // box, so overlay and basemap cover the same ground.
        let path = coverage::fetch(
            downloader,
            &config.out_dir,
            operator,
            network_type,
            &extent.to_bounds(),
            size,
            opts.use_cache,
        )?;
        composite_coverage(&mut base, &path, map_w, map_h)?;
    }

    let out_path = config
        .out_dir
        .join("graphs")
        .join(&opts.measurement_id)
        .join(style::output_name(
            display_info.is_some(),
            opts.operator.map(|o| o.name),
            opts.network_type,
            opts.plot_rsrq,
            opts.dpi,
        ));
    if let Some(parent) = out_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    draw(
        opts,
        &base,
        &extent,
        map_w,
        map_h,
        location,
        signal,
        display_info,
        &out_path,
    )?;

    Ok(out_path)
}

#[allow(clippy::too_many_arguments)]
fn draw(
    opts: &RenderOptions,
    base: &RgbaImage,
    extent: &Extent,
    map_w: u32,
    map_h: u32,
    location: Option<&[LocationRecord]>,
    signal: Option<&[SignalRecord]>,
    display_info: Option<&[DisplayInfoRecord]>,
    out_path: &Path,
) -> Result<()> {
    let has_signal = signal.is_some();
    let canvas_w = map_w + if has_signal { BAR_WIDTH } else { 0 };
    let canvas_h = map_h + if opts.show_title { TITLE_HEIGHT } else { 0 };

    let root = BitMapBackend::new(out_path, (canvas_w, canvas_h)).into_drawing_area();
    root.fill(&WHITE)?;

    let body = if opts.show_title {
        let (title_area, body) = root.split_vertically(TITLE_HEIGHT);
        let text = style::title(
            opts.title.as_deref(),
            opts.network_type,
            opts.operator.map(|o| o.name),
            has_signal,
            opts.plot_rsrq,
        );
        let font = ("sans-serif", 22)
            .into_font()
            .color(&BLACK)
            .pos(Pos::new(HPos::Center, VPos::Center));
        title_area.draw(&Text::new(
            text,
            ((canvas_w / 2) as i32, (TITLE_HEIGHT / 2) as i32),
            font,
        ))?;
        body
    } else {
        root.clone()
    };
    let (map_area, bar_area) = body.split_horizontally(map_w);

    // The tile pyramid's y axis points south; flip it so north is up.
    let y_bottom = 1.0 - extent.y_max;
    let y_top = 1.0 - extent.y_min;
    let mut chart = ChartBuilder::on(&map_area)
        .margin(0)
        .build_cartesian_2d(extent.x_min..extent.x_max, y_bottom..y_top)?;

    let mut flat = Vec::with_capacity((map_w * map_h) as usize * 3);
    for pixel in base.pixels() {
        flat.extend_from_slice(&pixel.0[..3]);
    }
    let bitmap: BitMapElement<'_, (f64, f64)> =
        BitMapElement::with_owned_buffer((extent.x_min, y_top), (map_w, map_h), flat)
            .context("basemap buffer does not match the plotting area")?;
    chart.draw_series(std::iter::once(bitmap))?;

    if let Some(location) = location {
        chart.draw_series(LineSeries::new(
            location.iter().map(|r| plot_xy(r.latitude, r.longitude)),
            style::TRACK.stroke_width(1),
        ))?;
    }

    if let Some(display_info) = display_info {
        chart.draw_series(display_info.iter().map(|r| {
            Circle::new(
                plot_xy(r.latitude, r.longitude),
                2,
                style::EVENT_MARKER.filled(),
            )
        }))?;

        if let Some(location) = location {
            let mut legend: BTreeMap<String, RGBColor> = BTreeMap::new();
            for event in display_info {
                let color =
                    style::override_color(&event.override_network_type, &event.network_type);
                let label =
                    style::override_label(&event.override_network_type, &event.network_type);
                legend.entry(label).or_insert(color);

                let track: Vec<(f64, f64)> = location
                    .iter()
                    .filter(|r| r.time >= event.time)
                    .map(|r| plot_xy(r.latitude, r.longitude))
                    .collect();
                chart.draw_series(LineSeries::new(track, color.stroke_width(3)))?;
            }

            // One legend entry per label, alphabetically ordered.
            for (label, color) in legend {
                chart
                    .draw_series(std::iter::once(PathElement::new(
                        Vec::new(),
                        color.stroke_width(3),
                    )))?
                    .label(label)
                    .legend(move |(x, y)| {
                        PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(3))
                    });
            }
            chart
                .configure_series_labels()
                .background_style(WHITE.mix(0.7))
                .border_style(BLACK.mix(0.3))
                .position(SeriesLabelPosition::UpperRight)
                .draw()?;
        }
    }

    if let (Some(signal), Some(network_type)) = (signal, opts.network_type) {
        let values: Vec<f64> = signal
            .iter()
            .filter_map(|r| signal_value(r, network_type, opts.plot_rsrq))
            .collect();
        let (vmin, vmax) = scale_bounds(&values, opts.vmin, opts.vmax)
            .with_context(|| format!("cannot scale {network_type} signal colors"))?;
        let span = vmax - vmin;

        let wanted = network_type.to_string();
        chart.draw_series(
            signal
                .iter()
                .filter(|r| r.network_type == wanted)
                .filter_map(|r| {
                    signal_value(r, network_type, opts.plot_rsrq)
                        .map(|v| (r.latitude, r.longitude, v))
                })
                .map(|(lat, lon, v)| {
                    let t = if span > 0.0 { (v - vmin) / span } else { 0.5 };
                    Circle::new(plot_xy(lat, lon), 4, style::signal_color(t).filled())
                }),
        )?;

        draw_colorbar(
            &bar_area,
            vmin,
            vmax,
            style::axis_label(network_type, opts.plot_rsrq),
        )?;
    }

    root.present()?;
    Ok(())
}

fn draw_colorbar<'a>(
    area: &DrawingArea<BitMapBackend<'a>, plotters::coord::Shift>,
    vmin: f64,
    vmax: f64,
    label: &str,
) -> Result<()> {
    let (w, h) = area.dim_in_pixel();
    let top = 20;
    let bottom = h as i32 - 20;
    let (x0, x1) = (12, 32);

    for y in top..bottom {
        let t = 1.0 - (y - top) as f64 / (bottom - top - 1).max(1) as f64;
        area.draw(&Rectangle::new(
            [(x0, y), (x1, y + 1)],
            style::signal_color(t).filled(),
        ))?;
    }
    area.draw(&Rectangle::new(
        [(x0, top), (x1, bottom)],
        BLACK.stroke_width(1),
    ))?;

    let font = ("sans-serif", 14).into_font().color(&BLACK);
    area.draw(&Text::new(
        format!("{vmax:.0}"),
        (x1 + 5, top),
        font.clone().pos(Pos::new(HPos::Left, VPos::Top)),
    ))?;
    area.draw(&Text::new(
        format!("{vmin:.0}"),
        (x1 + 5, bottom),
        font.pos(Pos::new(HPos::Left, VPos::Bottom)),
    ))?;

    let rotated = ("sans-serif", 14)
        .into_font()
        .transform(FontTransform::Rotate270)
        .color(&BLACK)
        .pos(Pos::new(HPos::Center, VPos::Center));
    area.draw(&Text::new(
        label.to_string(),
        (w as i32 - 10, h as i32 / 2),
        rotated,
    ))?;

    Ok(())
}

/// Composite the downloaded coverage image over the basemap: covered
/// pixels become a translucent highlight, everything else stays
/// transparent.
fn composite_coverage(base: &mut RgbaImage, path: &Path, width: u32, height: u32) -> Result<()> {
    let img = image::open(path)
        .with_context(|| format!("failed to read coverage image {}", path.display()))?
        .to_rgba8();

    let mut recolored = RgbaImage::new(img.width(), img.height());
    let [r, g, b] = style::COVERAGE_HIGHLIGHT;
    for (x, y, pixel) in img.enumerate_pixels() {
        // anything the operator painted counts as covered
        if pixel.0[3] > 16 {
            recolored.put_pixel(x, y, Rgba([r, g, b, style::COVERAGE_ALPHA]));
        }
    }

    let scaled = imageops::resize(&recolored, width, height, FilterType::Triangle);
    imageops::overlay(base, &scaled, 0, 0);
    Ok(())
}

fn bounding_points(
    location: Option<&[LocationRecord]>,
    signal: Option<&[SignalRecord]>,
    display_info: Option<&[DisplayInfoRecord]>,
) -> Result<Vec<(f64, f64)>> {
    if let Some(records) = location {
        Ok(records.iter().map(|r| (r.latitude, r.longitude)).collect())
    } else if let Some(records) = signal {
        Ok(records.iter().map(|r| (r.latitude, r.longitude)).collect())
    } else if let Some(records) = display_info {
        Ok(records.iter().map(|r| (r.latitude, r.longitude)).collect())
    } else {
        bail!("at least one measurement log is required")
    }
}

/// Unit-square position with north up, for the plotting coordinate
/// system.
fn plot_xy(latitude: f64, longitude: f64) -> (f64, f64) {
    let (x, y) = mercator::project(latitude, longitude);
    (x, 1.0 - y)
}

/// Color scale endpoints: explicit values win, the data range fills
/// the rest. Like the plotted column, the range spans the whole log,
/// not just the selected network type.
fn scale_bounds(values: &[f64], vmin: Option<f64>, vmax: Option<f64>) -> Result<(f64, f64)> {
    if values.is_empty() && (vmin.is_none() || vmax.is_none()) {
        bail!("signal log has no usable samples");
    }
    let data_min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let data_max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Ok((vmin.unwrap_or(data_min), vmax.unwrap_or(data_max)))
}

fn signal_value(
    record: &SignalRecord,
    network_type: NetworkType,
    plot_rsrq: bool,
) -> Option<f64> {
    if plot_rsrq && network_type == NetworkType::Lte {
        record.rsrq
    } else if plot_rsrq && network_type == NetworkType::Nr {
        record.ss_rsrq
    } else {
        record.dbm
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDateTime;

    use super::*;

    fn signal(network_type: &str, dbm: Option<f64>, rsrq: Option<f64>) -> SignalRecord {
        SignalRecord {
            time: "2021-05-01T12:00:00".parse::<NaiveDateTime>().unwrap(),
            latitude: 52.5,
            longitude: 13.4,
            network_type: network_type.to_string(),
            dbm,
            rsrq,
            ss_rsrq: None,
        }
    }

    #[test]
    fn signal_column_selection() {
        let record = signal("LTE", Some(-95.0), Some(-11.0));
        assert_eq!(signal_value(&record, NetworkType::Lte, false), Some(-95.0));
        assert_eq!(signal_value(&record, NetworkType::Lte, true), Some(-11.0));
        // NR quality comes from ssRsrq, which this record lacks
        assert_eq!(signal_value(&record, NetworkType::Nr, true), None);
        assert_eq!(signal_value(&record, NetworkType::Gsm, true), Some(-95.0));
    }

    #[test]
    fn bounding_source_precedence() {
        let signals = vec![signal("LTE", Some(-95.0), None)];
        let points = bounding_points(None, Some(signals.as_slice()), None).unwrap();
        assert_eq!(points, vec![(52.5, 13.4)]);
        assert!(bounding_points(None, None, None).is_err());
    }

    #[test]
    fn color_scale_defaulting() {
        let values = [-110.0, -95.0, -70.0];
        assert_eq!(scale_bounds(&values, None, None).unwrap(), (-110.0, -70.0));
        assert_eq!(
            scale_bounds(&values, Some(-120.0), None).unwrap(),
            (-120.0, -70.0)
        );
        assert_eq!(
            scale_bounds(&[], Some(-120.0), Some(-60.0)).unwrap(),
            (-120.0, -60.0)
        );
        assert!(scale_bounds(&[], None, Some(-60.0)).is_err());
    }

    #[test]
    fn north_is_up() {
        let south = plot_xy(52.0, 13.0);
        let north = plot_xy(52.1, 13.0);
        assert!(north.1 > south.1);
        assert_eq!(south.0, north.0);
    }
}
