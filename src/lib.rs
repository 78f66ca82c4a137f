pub mod converter;
pub mod error;
pub mod gpx_types;
pub mod options;
pub mod parser;
pub mod radiation;
pub mod selector;
pub mod solar;
pub mod writer;

use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::info;

use crate::converter::EnrichedRecord;
use crate::error::Result;
use crate::options::ConvertOptions;

/// Parse a GPX string and enrich every track point.
pub fn convert_str(gpx_string: &str, opts: &ConvertOptions) -> Result<Vec<EnrichedRecord>> {
    let gpx_data = parser::parse_gpx(gpx_string)?;
    converter::enrich(&gpx_data, opts)
}

/// Convert one GPX file into a CSV table next to it. Returns the path written.
pub fn convert_file(path: &Path, opts: &ConvertOptions) -> Result<PathBuf> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    info!("Starting conversion of {file_name}.");
    let start = Instant::now();

    let gpx_string = std::fs::read_to_string(path)?;
    let records = convert_str(&gpx_string, opts)?;
    let output = writer::output_path_for(path);
    writer::write_records(&records, &output)?;

    let minutes = start.elapsed().as_secs_f64() / 60.0;
    info!(rows = records.len(), output = %output.display(), "Finished converting {file_name}");
    info!("Processing time: {minutes:.6} minutes");
    Ok(output)
}
