//! Recover missing timestamps on a location-update log.
//!
//! The measurement app writes location updates without timestamps but
//! logs the same fix (identical position, altitude, speed, accuracy)
//! in its cell-info and signal logs, which do carry timestamps. Rows
//! that match neither log get the midpoint of their neighbors' times.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocationRow {
    latitude: f64,
    longitude: f64,
    altitude: f64,
    speed: f64,
    location_accuracy: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimedRow {
    time: NaiveDateTime,
    latitude: f64,
    longitude: f64,
    altitude: f64,
    speed: f64,
    location_accuracy: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OutputRow {
    time: String,
    latitude: f64,
    longitude: f64,
    altitude: f64,
    speed: f64,
    location_accuracy: f64,
}

pub fn run(
    location_updates: &Path,
    cell_info: &Path,
    signal_strengths: &Path,
    out: &Path,
) -> Result<()> {
    let locations = read_locations(location_updates)?;
    let cells = read_timed(cell_info)?;
    let signals = read_timed(signal_strengths)?;

    let mut times: Vec<Option<NaiveDateTime>> = locations
        .iter()
        .map(|row| matching_time(&cells, row))
        .collect();

    for i in 0..times.len() {
        if times[i].is_some() {
            continue;
        }
        if let Some(time) = matching_time(&signals, &locations[i]) {
            times[i] = Some(time);
            continue;
        }
        times[i] = Some(interpolate(&times, i)?);
    }

    let mut writer = csv::Writer::from_path(out)
        .with_context(|| format!("failed to create {}", out.display()))?;
    for (row, time) in locations.iter().zip(&times) {
        let time = (*time).context("timestamp still missing after recovery")?;
        writer.serialize(OutputRow {
            time: time.format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
            latitude: row.latitude,
            longitude: row.longitude,
            altitude: row.altitude,
            speed: row.speed,
            location_accuracy: row.location_accuracy,
        })?;
    }
    writer.flush()?;

    Ok(())
}

fn read_locations(path: &Path) -> Result<Vec<LocationRow>> {
    let mut reader =
        csv::Reader::from_path(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut output = Vec::new();
    for result in reader.deserialize() {
        let row: LocationRow = result?;
        output.push(row);
    }

    Ok(output)
}

fn read_timed(path: &Path) -> Result<Vec<TimedRow>> {
    let mut reader =
        csv::Reader::from_path(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut output = Vec::new();
    for result in reader.deserialize() {
        let row: TimedRow = result?;
        output.push(row);
    }

    Ok(output)
}

/// Timestamp of the first row describing the same fix.
fn matching_time(rows: &[TimedRow], row: &LocationRow) -> Option<NaiveDateTime> {
    rows.iter()
        .find(|r| {
            r.latitude == row.latitude
                && r.longitude == row.longitude
                && r.altitude == row.altitude
                && r.speed == row.speed
                && r.location_accuracy == row.location_accuracy
        })
        .map(|r| r.time)
}

/// Midpoint of the neighboring rows' timestamps. Earlier rows have
/// already been recovered by the time this runs, so the left neighbor
/// is always usable when it exists.
fn interpolate(times: &[Option<NaiveDateTime>], i: usize) -> Result<NaiveDateTime> {
    let before = i
        .checked_sub(1)
        .and_then(|j| times[j])
        .with_context(|| format!("row {i}: no earlier timestamp to interpolate from"))?;
    let after = times
        .get(i + 1)
        .copied()
        .flatten()
        .with_context(|| format!("row {i}: no later timestamp to interpolate from"))?;

    let guessed = before + (after - before) / 2;
    warn!(row = i, %guessed, "guessed a missing timestamp");
    Ok(guessed)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn parse(s: &str) -> NaiveDateTime {
        s.parse().unwrap()
    }

    #[test]
    fn midpoint_interpolation() {
        let times = vec![
            Some(parse("2021-05-01T12:00:00")),
            None,
            Some(parse("2021-05-01T12:00:10")),
        ];
        assert_eq!(interpolate(&times, 1).unwrap(), parse("2021-05-01T12:00:05"));
    }

    #[test]
    fn interpolation_needs_both_neighbors() {
        let times = vec![None, Some(parse("2021-05-01T12:00:10"))];
        assert!(interpolate(&times, 0).is_err());
        let times = vec![Some(parse("2021-05-01T12:00:10")), None];
        assert!(interpolate(&times, 1).is_err());
    }

    #[test]
    fn recovers_from_cell_and_signal_logs() {
        let dir = tempfile::tempdir().unwrap();
        let loc = dir.path().join("loc.csv");
        let cell = dir.path().join("cell.csv");
        let sig = dir.path().join("sig.csv");
        let out = dir.path().join("out.csv");

        let header = "time,latitude,longitude,altitude,speed,locationAccuracy";
        let mut f = std::fs::File::create(&loc).unwrap();
        writeln!(f, "latitude,longitude,altitude,speed,locationAccuracy").unwrap();
        writeln!(f, "52.5,13.4,34.0,1.0,3.0").unwrap();
        writeln!(f, "52.6,13.5,35.0,1.1,3.1").unwrap();
        writeln!(f, "52.7,13.6,36.0,1.2,3.2").unwrap();

        let mut f = std::fs::File::create(&cell).unwrap();
        writeln!(f, "{header}").unwrap();
        writeln!(f, "2021-05-01T12:00:00.000,52.5,13.4,34.0,1.0,3.0").unwrap();
        writeln!(f, "2021-05-01T12:00:10.000,52.7,13.6,36.0,1.2,3.2").unwrap();

        let mut f = std::fs::File::create(&sig).unwrap();
        writeln!(f, "{header}").unwrap();
        writeln!(f, "2021-05-01T12:00:04.000,52.6,13.5,35.0,1.1,3.1").unwrap();

        run(&loc, &cell, &sig, &out).unwrap();

        let data = std::fs::read_to_string(&out).unwrap();
        let lines: Vec<&str> = data.lines().collect();
        assert_eq!(lines[0], header);
        assert!(lines[1].starts_with("2021-05-01T12:00:00.000000,52.5"));
        assert!(lines[2].starts_with("2021-05-01T12:00:04.000000,52.6"));
        assert!(lines[3].starts_with("2021-05-01T12:00:10.000000,52.7"));
    }
}
