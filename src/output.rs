use anyhow::{Context, Result};
use log::info;
use std::fs;
use std::path::Path;

use crate::models::AddressRecord;

/// Writes the records as a pretty-printed JSON array (UTF-8, no ASCII escaping).
pub fn write_json(output_path: &Path, records: &[AddressRecord]) -> Result<()> {
    let json = serde_json::to_string_pretty(records).context("Failed to serialize address records")?;
    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory {:?}", parent))?;
    }
    fs::write(output_path, json)
        .with_context(|| format!("Failed to write output file {:?}", output_path))?;
    info!("JSON file written: {:?} ({} addresses)", output_path, records.len());
    Ok(())
}
