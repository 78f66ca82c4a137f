use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::converter::EnrichedRecord;
use crate::error::Result;

pub const HEADER: [&str; 14] = [
    "latitude",
    "longitude",
    "elevation",
    "temperature",
    "heart_rate",
    "cadence",
    "power",
    "speed_ms",
    "sun_altitude",
    "sun_azimuth",
    "sun_radiation",
    "date",
    "timestamp",
    "time_offset",
];

/// `<dir>/<stem>.csv` for an input track file, where the stem is the file
/// name up to its last `.`. A file named `.gpx` therefore becomes `.csv`.
pub fn output_path_for(input: &Path) -> PathBuf {
    let name = input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = name.rsplit_once('.').map_or(name.as_str(), |(stem, _)| stem);
    input.with_file_name(format!("{stem}.csv"))
}

/// Write records as CSV to `path`, replacing any existing file.
pub fn write_records(records: &[EnrichedRecord], path: &Path) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = csv::Writer::from_writer(file);
    write_rows(records, &mut writer)
}

/// Write the header followed by one row per record.
pub fn write_rows<W: Write>(records: &[EnrichedRecord], writer: &mut csv::Writer<W>) -> Result<()> {
    writer.write_record(HEADER)?;

    for record in records {
        writer.write_record([
            record.latitude.to_string(),
            record.longitude.to_string(),
            optional_number(record.elevation),
            optional_text(record.sensors.temperature.as_deref()),
            optional_text(record.sensors.heart_rate.as_deref()),
            optional_text(record.sensors.cadence.as_deref()),
            optional_text(record.sensors.power.as_deref()),
            optional_number(record.speed_ms),
            record.sun_altitude.to_string(),
            record.sun_azimuth.to_string(),
            record.sun_radiation.to_string(),
            record.date.clone(),
            record.timestamp.to_string(),
            record.time_offset.to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

fn optional_number(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn optional_text(value: Option<&str>) -> String {
    value.unwrap_or_default().to_string()
}
