//! Basemap assembly from a slippy-map tile pyramid: pick a zoom level
//! for the requested output width, fetch the covering tiles (cached on
//! disk, one download per tile ever), mosaic, crop and scale.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use image::{imageops, imageops::FilterType, RgbaImage};
use tracing::debug;

use crate::{http::Downloader, mercator::Extent};

pub const TILE_SIZE: u32 = 256;
const MAX_ZOOM: u8 = 19;

/// Tile column (or row) containing a unit-square coordinate at `zoom`.
/// Coordinates outside the pyramid clamp to the edge tiles.
pub fn tile_index(coord: f64, zoom: u8) -> u32 {
    let n = 1u32 << zoom;
    let index = (coord * n as f64).floor();
    if index < 0.0 {
        0
    } else {
        (index as u32).min(n - 1)
    }
}

/// Smallest zoom level whose world-pixel span renders `extent_width`
/// (unit-square units) at least `width_px` wide.
pub fn zoom_for_width(extent_width: f64, width_px: u32) -> u8 {
    let mut zoom = 0;
    while zoom < MAX_ZOOM {
        let world_px = (1u64 << zoom) as f64 * TILE_SIZE as f64;
        if extent_width * world_px >= width_px as f64 {
            break;
        }
        zoom += 1;
    }
    zoom
}

/// Basemap raster for `extent`, scaled to exactly
/// `width_px` x `height_px`.
pub fn basemap(
    downloader: &dyn Downloader,
    cache_dir: &Path,
    url_template: &str,
    extent: &Extent,
    width_px: u32,
    height_px: u32,
) -> Result<RgbaImage> {
    let zoom = zoom_for_width(extent.width(), width_px);
    let x0 = tile_index(extent.x_min, zoom);
    let x1 = tile_index(extent.x_max, zoom);
    let y0 = tile_index(extent.y_min, zoom);
    let y1 = tile_index(extent.y_max, zoom);
    debug!(zoom, tiles = (x1 - x0 + 1) * (y1 - y0 + 1), "assembling basemap");

    let mut mosaic = RgbaImage::new((x1 - x0 + 1) * TILE_SIZE, (y1 - y0 + 1) * TILE_SIZE);
    for x in x0..=x1 {
        for y in y0..=y1 {
            let tile = fetch_tile(downloader, cache_dir, url_template, zoom, x, y)?;
            imageops::replace(
                &mut mosaic,
                &tile,
                ((x - x0) * TILE_SIZE) as i64,
                ((y - y0) * TILE_SIZE) as i64,
            );
        }
    }

    // Pixel offsets of the extent inside the mosaic.
    let world_px = (1u64 << zoom) as f64 * TILE_SIZE as f64;
    let left = extent.x_min * world_px - (x0 * TILE_SIZE) as f64;
    let top = extent.y_min * world_px - (y0 * TILE_SIZE) as f64;
    let crop_w = (extent.width() * world_px).round().max(1.0) as u32;
    let crop_h = (extent.height() * world_px).round().max(1.0) as u32;

    let left = left.round().max(0.0) as u32;
    let top = top.round().max(0.0) as u32;
    let crop_w = crop_w.min(mosaic.width().saturating_sub(left)).max(1);
    let crop_h = crop_h.min(mosaic.height().saturating_sub(top)).max(1);

    let cropped = imageops::crop_imm(&mosaic, left, top, crop_w, crop_h).to_image();
    Ok(imageops::resize(
        &cropped,
        width_px,
        height_px,
        FilterType::Lanczos3,
    ))
}

fn fetch_tile(
    downloader: &dyn Downloader,
    cache_dir: &Path,
    url_template: &str,
    zoom: u8,
    x: u32,
    y: u32,
) -> Result<RgbaImage> {
    let path = cache_dir.join(format!("tile-{zoom}-{x}-{y}.png"));
    let bytes = if path.is_file() {
        fs::read(&path)?
    } else {
        let url = url_template
            .replace("{z}", &zoom.to_string())
            .replace("{x}", &x.to_string())
            .replace("{y}", &y.to_string());
        let bytes = downloader.get(&url)?;
        fs::create_dir_all(cache_dir)
            .with_context(|| format!("failed to create {}", cache_dir.display()))?;
        fs::write(&path, &bytes)?;
        bytes
    };

    let tile = image::load_from_memory(&bytes)
        .with_context(|| format!("invalid tile image {zoom}/{x}/{y}"))?;
    Ok(tile.to_rgba8())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tile_index_basics() {
        assert_eq!(tile_index(0.0, 0), 0);
        assert_eq!(tile_index(0.999, 0), 0);
        assert_eq!(tile_index(0.5, 1), 1);
        assert_eq!(tile_index(0.49, 1), 0);
        // edge coordinates stay inside the pyramid
        assert_eq!(tile_index(1.0, 1), 1);
        assert_eq!(tile_index(-0.1, 3), 0);
    }

    #[test]
    fn zoom_selection() {
        assert_eq!(zoom_for_width(1.0, 256), 0);
        assert_eq!(zoom_for_width(0.001, 1280), 13);
        // wider targets never pick a lower zoom
        let mut last = 0;
        for px in [256, 512, 1024, 2048, 4096] {
            let z = zoom_for_width(0.01, px);
            assert!(z >= last);
            last = z;
        }
    }
}
