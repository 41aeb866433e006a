use anyhow::{Context, Result};
use chrono::Utc;
use log::{info, warn};

use crate::config::ExportConfig;
use crate::excel_writer;
use crate::geocoding::{EnrichmentSummary, Geocoder, GeocodingEnricher, NominatimGeocoder};
use crate::models::AddressRecord;
use crate::org_units::load_org_unit_mapping;
use crate::output;
use crate::record_builder::{annotate_formatted_names, build_records};
use crate::tabular::{TabularSource, XlsxSource};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub records: usize,
    pub with_org_unit: usize,
    pub with_coordinates: usize,
    pub geocoding: Option<EnrichmentSummary>,
}

/// Full run against the files named in the configuration.
pub async fn run(config: &ExportConfig) -> Result<RunSummary> {
    let primary = XlsxSource::new(&config.address_sheet_path);
    let hr_export = XlsxSource::new(&config.hr_export_path);
    let geocoder = if config.geocoding.enabled {
        Some(NominatimGeocoder::new(&config.geocoding)?)
    } else {
        info!("Geocoding disabled by configuration");
        None
    };

    let document = build_address_document(
        config,
        &primary,
        &hr_export,
        geocoder.as_ref().map(|g| g as &dyn Geocoder),
    )
    .await?;

    output::write_json(&config.output_path, &document.records)?;
    let summary = summarize(&document.records, document.geocoding);
    info!(
        "Export finished: {} addresses, {} with org unit, {} with coordinates",
        summary.records, summary.with_org_unit, summary.with_coordinates
    );
    Ok(summary)
}

/// Records ready for output plus what the geocoding pass did, if it ran.
#[derive(Debug, Clone)]
pub struct AddressDocument {
    pub records: Vec<AddressRecord>,
    pub geocoding: Option<EnrichmentSummary>,
}

/// Reads both sources and produces the enriched record list. Only a failure
/// to read the primary sheet is fatal.
pub async fn build_address_document(
    config: &ExportConfig,
    primary: &XlsxSource,
    hr_export: &dyn TabularSource,
    geocoder: Option<&dyn Geocoder>,
) -> Result<AddressDocument> {
    let mapping = load_org_unit_mapping(hr_export);

    let mut table = primary
        .read_table()
        .with_context(|| format!("Failed to read address sheet {}", primary.describe()))?;
    info!("Columns found: {:?}", table.headers());

    if annotate_formatted_names(&mut table) {
        if config.write_back_formatted_names {
            if let Err(e) = excel_writer::write_table(primary.path(), &table) {
                warn!(
                    "Could not save formatted names to {:?}: {:#}; they are still used for the JSON output",
                    primary.path(),
                    e
                );
            }
        }
    } else {
        warn!("No name column found; cannot add formatted names");
    }

    let mut records = build_records(&table, &mapping, &config.matching, Utc::now());

    let geocoding = match geocoder {
        Some(geocoder) => Some(
            GeocodingEnricher::new(geocoder, &config.geocoding)
                .enrich(&mut records)
                .await,
        ),
        None => None,
    };

    Ok(AddressDocument { records, geocoding })
}

pub fn summarize(records: &[AddressRecord], geocoding: Option<EnrichmentSummary>) -> RunSummary {
    RunSummary {
        records: records.len(),
        with_org_unit: records.iter().filter(|r| r.organizational_unit.is_some()).count(),
        with_coordinates: records.iter().filter(|r| r.coordinates().is_some()).count(),
        geocoding,
    }
}
