//! Operator coverage overlays: a static operator table, deterministic
//! cache keys and a download-once fetch path.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::{
    bounds::BoundingBox,
    http::Downloader,
    model::{ImageSize, NetworkType},
};

/// A coverage map operator. Purely data: one shared fetch path is
/// parameterized by these records instead of per-operator types.
pub struct Operator {
    pub name: &'static str,
    base_url: &'static str,
    layers: &'static [(NetworkType, &'static str)],
}

pub static TELEKOM: Operator = Operator {
    name: "Telekom",
    base_url: "https://t-map.telekom.de/arcgis/rest/services/public/coverage/MapServer/export",
    layers: &[
        (NetworkType::Nr, "show:6"),
        (NetworkType::Lte, "show:3"),
        (NetworkType::Gsm, "show:5"),
    ],
};

pub static VODAFONE: Operator = Operator {
    name: "Vodafone",
    base_url:
        "https://netmap.vodafone.de/arcgis/rest/services/CoKart/netzabdeckung_mobilfunk_4x/MapServer/export",
    layers: &[
        (NetworkType::Nr, "show:123"),
        (NetworkType::Lte, "show:111"),
        (NetworkType::Gsm, "show:119"),
    ],
};

impl Operator {
    /// `layers` query parameter for the requested network type. A type
    /// missing from the operator's table is a configuration error, not
    /// a silent default.
    pub fn layer(&self, network_type: NetworkType) -> Result<&'static str> {
        self.layers
            .iter()
            .find(|(t, _)| *t == network_type)
            .map(|(_, layer)| *layer)
            .with_context(|| {
                format!("operator {} has no {network_type} coverage layer", self.name)
            })
    }

    fn export_url(
        &self,
        network_type: NetworkType,
        bounds: &BoundingBox,
        size: ImageSize,
    ) -> Result<String> {
        let (min, max) = bounds.reproject_for_export();
        let layers = self.layer(network_type)?;
        Ok(format!(
            "{}?bbox={},{},{},{}&size={},{}&dpi=100&format=png24&transparent=true&bboxSR=3857&imageSR=3857&layers={}&f=image",
            self.base_url, min.0, min.1, max.0, max.1, size.width, size.height, layers
        ))
    }
}

// Canonical cache-key document. Field order is alphabetical at every
// level so the serialization never depends on construction order.
#[derive(Serialize)]
struct KeyDoc<'a> {
    bounding_box: KeyBounds,
    network_type: &'a str,
    operator: &'a str,
    size: KeySize,
}

#[derive(Serialize)]
struct KeyBounds {
    max: KeyCorner,
    min: KeyCorner,
}

#[derive(Serialize)]
struct KeyCorner {
    latitude: f64,
    longitude: f64,
}

#[derive(Serialize)]
struct KeySize {
    height: u32,
    width: u32,
}

/// Deterministic cache key for one coverage request: SHA-256 over the
/// canonical JSON form of all request parameters, as lowercase hex.
pub fn cache_key(
    operator: &Operator,
    network_type: NetworkType,
    bounds: &BoundingBox,
    size: ImageSize,
) -> Result<String> {
    let network_type = network_type.to_string();
    let doc = KeyDoc {
        bounding_box: KeyBounds {
            max: KeyCorner {
                latitude: bounds.max_lat(),
                longitude: bounds.max_lon(),
            },
            min: KeyCorner {
                latitude: bounds.min_lat(),
                longitude: bounds.min_lon(),
            },
        },
        network_type: &network_type,
        operator: operator.name,
        size: KeySize {
            height: size.height,
            width: size.width,
        },
    };

    let json = serde_json::to_string(&doc)?;
    let digest = Sha256::digest(json.as_bytes());
    Ok(hex::encode(digest))
}

/// Return a local copy of the requested coverage image, downloading it
/// from the operator's export endpoint only when no cached file exists
/// for the same parameters. With `use_cache` disabled the image is
/// downloaded unconditionally and overwrites any cached copy.
pub fn fetch(
    downloader: &dyn Downloader,
    out_dir: &Path,
    operator: &Operator,
    network_type: NetworkType,
    bounds: &BoundingBox,
    size: ImageSize,
    use_cache: bool,
) -> Result<PathBuf> {
    let key = cache_key(operator, network_type, bounds, size)?;
    let path = out_dir
        .join("operators")
        .join(format!("coverage-{}-{}.png", operator.name, key));
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    if use_cache && path.is_file() {
        debug!(path = %path.display(), "using cached coverage image");
        return Ok(path);
    }

    let url = operator.export_url(network_type, bounds, size)?;
    info!(operator = operator.name, "downloading coverage image");
    let body = downloader.get(&url)?;
    fs::write(&path, body).with_context(|| format!("failed to write {}", path.display()))?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    struct StubDownloader {
        requests: RefCell<Vec<String>>,
    }

    impl StubDownloader {
        fn new() -> Self {
            Self {
                requests: RefCell::new(Vec::new()),
            }
        }

        fn count(&self) -> usize {
            self.requests.borrow().len()
        }
    }

    impl Downloader for StubDownloader {
        fn get(&self, url: &str) -> Result<Vec<u8>> {
            self.requests.borrow_mut().push(url.to_string());
            Ok(b"not really a png".to_vec())
        }
    }

    fn bounds() -> BoundingBox {
        BoundingBox::from_points(&[(52.0, 13.0)], 0.02).unwrap()
    }

    const SIZE: ImageSize = ImageSize {
        width: 3556,
        height: 2000,
    };

    #[test]
    fn key_is_deterministic() {
        let a = cache_key(&TELEKOM, NetworkType::Lte, &bounds(), SIZE).unwrap();
        let b = cache_key(&TELEKOM, NetworkType::Lte, &bounds(), SIZE).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn key_changes_with_any_field() {
        let base = cache_key(&TELEKOM, NetworkType::Lte, &bounds(), SIZE).unwrap();

        let other_operator = cache_key(&VODAFONE, NetworkType::Lte, &bounds(), SIZE).unwrap();
        assert_ne!(base, other_operator);

        let other_type = cache_key(&TELEKOM, NetworkType::Nr, &bounds(), SIZE).unwrap();
        assert_ne!(base, other_type);

        let other_bounds = BoundingBox::from_points(&[(52.0, 13.0)], 0.03).unwrap();
        let shifted = cache_key(&TELEKOM, NetworkType::Lte, &other_bounds, SIZE).unwrap();
        assert_ne!(base, shifted);

        let one_pixel_wider = ImageSize {
            width: SIZE.width + 1,
            height: SIZE.height,
        };
        let resized = cache_key(&TELEKOM, NetworkType::Lte, &bounds(), one_pixel_wider).unwrap();
        assert_ne!(base, resized);
    }

    #[test]
    fn layer_tables() {
        assert_eq!(TELEKOM.layer(NetworkType::Nr).unwrap(), "show:6");
        assert_eq!(TELEKOM.layer(NetworkType::Lte).unwrap(), "show:3");
        assert_eq!(TELEKOM.layer(NetworkType::Gsm).unwrap(), "show:5");
        assert_eq!(VODAFONE.layer(NetworkType::Nr).unwrap(), "show:123");
        assert_eq!(VODAFONE.layer(NetworkType::Lte).unwrap(), "show:111");
        assert_eq!(VODAFONE.layer(NetworkType::Gsm).unwrap(), "show:119");
    }

    #[test]
    fn missing_layer_is_fatal() {
        static BARE: Operator = Operator {
            name: "Bare",
            base_url: "https://example.invalid/export",
            layers: &[(NetworkType::Lte, "show:1")],
        };
        assert!(BARE.layer(NetworkType::Nr).is_err());
    }

    #[test]
    fn export_url_parameters() {
        let url = TELEKOM
            .export_url(NetworkType::Gsm, &bounds(), SIZE)
            .unwrap();
        assert!(url.starts_with(TELEKOM.base_url));
        assert!(url.contains("dpi=100"));
        assert!(url.contains("format=png24"));
        assert!(url.contains("transparent=true"));
        assert!(url.contains("bboxSR=3857"));
        assert!(url.contains("imageSR=3857"));
        assert!(url.contains("layers=show:5"));
        assert!(url.contains("f=image"));
        assert!(url.contains("size=3556,2000"));
    }

    #[test]
    fn fetch_downloads_once() {
        let dir = tempfile::tempdir().unwrap();
        let downloader = StubDownloader::new();

        let first = fetch(
            &downloader,
            dir.path(),
            &TELEKOM,
            NetworkType::Lte,
            &bounds(),
            SIZE,
            true,
        )
        .unwrap();
        let second = fetch(
            &downloader,
            dir.path(),
            &TELEKOM,
            NetworkType::Lte,
            &bounds(),
            SIZE,
            true,
        )
        .unwrap();

        assert_eq!(first, second);
        assert_eq!(downloader.count(), 1);
        let name = first.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("coverage-Telekom-"));
        assert!(name.ends_with(".png"));
    }

    #[test]
    fn cache_bypass_always_downloads() {
        let dir = tempfile::tempdir().unwrap();
        let downloader = StubDownloader::new();

        for _ in 0..2 {
            fetch(
                &downloader,
                dir.path(),
                &VODAFONE,
                NetworkType::Nr,
                &bounds(),
                SIZE,
                false,
            )
            .unwrap();
        }
        assert_eq!(downloader.count(), 2);
    }
}
