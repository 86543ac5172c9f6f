//! Typed loaders for the measurement CSV logs. Rows without a
//! position fix are dropped at load time; everything downstream can
//! rely on latitude and longitude being present.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use serde::Deserialize;

/// One GPS fix from the location-update log.
#[derive(Debug, Clone)]
pub struct LocationRecord {
    pub time: NaiveDateTime,
    pub latitude: f64,
    pub longitude: f64,
}

/// One signal-strength sample. The network type is kept as the raw
/// log string; rows are filtered against the requested type when
/// plotting. `dbm` carries RSSI (GSM) or RSRP (LTE/NR); `rsrq` and
/// `ss_rsrq` carry the quality columns for LTE and NR.
#[derive(Debug, Clone)]
pub struct SignalRecord {
    pub time: NaiveDateTime,
    pub latitude: f64,
    pub longitude: f64,
    pub network_type: String,
    pub dbm: Option<f64>,
    pub rsrq: Option<f64>,
    pub ss_rsrq: Option<f64>,
}

/// One display-info event: the network badge the phone showed,
/// possibly overriding the connected network type.
#[derive(Debug, Clone)]
pub struct DisplayInfoRecord {
    pub time: NaiveDateTime,
    pub latitude: f64,
    pub longitude: f64,
    pub network_type: String,
    pub override_network_type: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLocation {
    time: NaiveDateTime,
    latitude: Option<f64>,
    longitude: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSignal {
    time: NaiveDateTime,
    latitude: Option<f64>,
    longitude: Option<f64>,
    network_type: String,
    dbm: Option<f64>,
    rsrq: Option<f64>,
    ss_rsrq: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDisplayInfo {
    time: NaiveDateTime,
    latitude: Option<f64>,
    longitude: Option<f64>,
    network_type: String,
    override_network_type: String,
}

pub fn load_locations(path: &Path) -> Result<Vec<LocationRecord>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let mut output = Vec::new();
    for result in reader.deserialize() {
        let raw: RawLocation = result?;
        if let (Some(latitude), Some(longitude)) = (raw.latitude, raw.longitude) {
            output.push(LocationRecord {
                time: raw.time,
                latitude,
                longitude,
            });
        }
    }

    Ok(output)
}

pub fn load_signals(path: &Path) -> Result<Vec<SignalRecord>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let mut output = Vec::new();
    for result in reader.deserialize() {
        let raw: RawSignal = result?;
        if let (Some(latitude), Some(longitude)) = (raw.latitude, raw.longitude) {
            output.push(SignalRecord {
                time: raw.time,
                latitude,
                longitude,
                network_type: raw.network_type,
                dbm: raw.dbm,
                rsrq: raw.rsrq,
                ss_rsrq: raw.ss_rsrq,
            });
        }
    }

    Ok(output)
}

pub fn load_display_info(path: &Path) -> Result<Vec<DisplayInfoRecord>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let mut output = Vec::new();
    for result in reader.deserialize() {
        let raw: RawDisplayInfo = result?;
        if let (Some(latitude), Some(longitude)) = (raw.latitude, raw.longitude) {
            output.push(DisplayInfoRecord {
                time: raw.time,
                latitude,
                longitude,
                network_type: raw.network_type,
                override_network_type: raw.override_network_type,
            });
        }
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn rows_without_position_are_dropped() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "time,latitude,longitude,networkType,dbm,rsrq,ssRsrq").unwrap();
        writeln!(file, "2021-05-01T12:00:00.000,52.5,13.4,LTE,-95,-11,").unwrap();
        writeln!(file, "2021-05-01T12:00:01.000,,,LTE,-96,-12,").unwrap();
        writeln!(file, "2021-05-01T12:00:02.000,52.6,13.5,NR,-80,,-10").unwrap();
        file.flush().unwrap();

        let records = load_signals(file.path()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].network_type, "LTE");
        assert_eq!(records[0].dbm, Some(-95.0));
        assert_eq!(records[1].ss_rsrq, Some(-10.0));
        assert_eq!(records[1].rsrq, None);
    }

    #[test]
    fn location_log_round_trip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "time,latitude,longitude,altitude,speed,locationAccuracy").unwrap();
        writeln!(file, "2021-05-01T12:00:00.000,52.5,13.4,34.0,1.2,3.9").unwrap();
        file.flush().unwrap();

        let records = load_locations(file.path()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].latitude, 52.5);
        assert_eq!(
            records[0].time,
            "2021-05-01T12:00:00"
                .parse::<NaiveDateTime>()
                .unwrap()
        );
    }
}
