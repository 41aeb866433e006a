use chrono::{DateTime, Utc};
use log::{debug, info};

use crate::address_parser::parse_address;
use crate::columns::{ColumnMap, FORMATTED_NAME_HEADER};
use crate::config::MatchSettings;
use crate::models::{AddressRecord, ParsedAddress, RECORD_SOURCE};
use crate::name_matching::format_name;
use crate::org_units::{merge_org_unit, OrgUnitMapping};
use crate::tabular::{Row, Table};

// Matches filling an empty unit below this score are logged for review
const REVIEW_SCORE: f64 = 0.9;

/// Display names for every row of the address sheet, in row order.
pub fn formatted_names(table: &Table, columns: &ColumnMap) -> Vec<Option<String>> {
    table
        .rows()
        .map(|row| columns.name.and_then(|c| row.text(c)).and_then(|raw| format_name(Some(raw))))
        .collect()
}

/// Adds (or refreshes) the "Naam Geformatteerd" column. Returns false when
/// the sheet has no recognisable name column.
pub fn annotate_formatted_names(table: &mut Table) -> bool {
    let columns = ColumnMap::detect(table.headers());
    if columns.name.is_none() {
        return false;
    }
    let names = formatted_names(table, &columns);
    table.set_text_column(FORMATTED_NAME_HEADER, names);
    true
}

/// One record per non-blank row, in sheet order.
pub fn build_records(
    table: &Table,
    mapping: &OrgUnitMapping,
    settings: &MatchSettings,
    created_at: DateTime<Utc>,
) -> Vec<AddressRecord> {
    let columns = ColumnMap::detect(table.headers());
    columns.log_mapping(table.headers());

    let mut records = Vec::new();
    for (index, row) in table.rows().enumerate() {
        if row.is_blank() {
            debug!("Skipping blank row {}", index + 1);
            continue;
        }
        records.push(build_record(index, row, &columns, mapping, settings, created_at));
    }

    info!("Built {} address records from {} rows", records.len(), table.row_count());
    records
}

fn build_record(
    index: usize,
    row: Row<'_>,
    columns: &ColumnMap,
    mapping: &OrgUnitMapping,
    settings: &MatchSettings,
    created_at: DateTime<Utc>,
) -> AddressRecord {
    let text = |column: Option<usize>| column.and_then(|c| row.text(c));

    let mut address = ParsedAddress::default();
    let full_address = text(columns.full_address);

    // A full-address column is only authoritative when no part has its own column
    if let Some(full) = full_address {
        if !columns.has_separate_columns() {
            merge_parsed(&mut address, parse_address(Some(full)));
        }
    }

    let mut name = text(columns.formatted_name)
        .map(str::to_string)
        .or_else(|| format_name(text(columns.name)));

    if let Some(street) = text(columns.separate_street()) {
        address.street = Some(street.to_string());
    } else if let Some(full) = full_address {
        if address.street.is_none() {
            merge_parsed(&mut address, parse_address(Some(full)));
        }
    }

    if let Some(house_number) = text(columns.house_number) {
        address.house_number = Some(house_number.to_string());
    }
    if let Some(postal_code) = text(columns.postal_code) {
        address.postal_code = Some(postal_code.to_string());
    }
    if let Some(city) = text(columns.city) {
        address.city = Some(city.to_string());
    }
    let mut organizational_unit = text(columns.business_unit).map(str::to_string);

    if !mapping.is_empty() {
        if let Some(display_name) = name.as_deref() {
            organizational_unit =
                enrich_org_unit(display_name, organizational_unit, mapping, settings);
        }
    }

    let latitude = columns.latitude.and_then(|c| coordinate(&row, c));
    let longitude = columns.longitude.and_then(|c| coordinate(&row, c));
    let (latitude, longitude) = match (latitude, longitude) {
        (Some(lat), Some(lon)) => (Some(lat), Some(lon)),
        _ => (None, None),
    };

    if name.is_none() {
        name = fallback_name(&row, columns);
    }

    let city = address.city.unwrap_or_default();
    AddressRecord {
        id: format!("shared-{}", index + 1),
        name: name.unwrap_or_else(|| format!("Adres {}", index + 1)),
        street: address.street.unwrap_or_default(),
        house_number: address.house_number.unwrap_or_default(),
        postcode: address.postal_code.unwrap_or_default(),
        original_city: city.clone(),
        city,
        source: RECORD_SOURCE.to_string(),
        created_at,
        organizational_unit,
        latitude,
        longitude,
    }
}

fn merge_parsed(target: &mut ParsedAddress, parsed: ParsedAddress) {
    if parsed.street.is_some() {
        target.street = parsed.street;
    }
    if parsed.house_number.is_some() {
        target.house_number = parsed.house_number;
    }
    if parsed.postal_code.is_some() {
        target.postal_code = parsed.postal_code;
    }
    if parsed.city.is_some() {
        target.city = parsed.city;
    }
}

fn enrich_org_unit(
    display_name: &str,
    current: Option<String>,
    mapping: &OrgUnitMapping,
    settings: &MatchSettings,
) -> Option<String> {
    let found = mapping.resolve(display_name, settings.min_similarity);
    let Some(label) = found.label else {
        debug!(
            "No org unit for '{}' (best score {:.2})",
            display_name, found.score
        );
        return current;
    };

    let was_empty = current.as_deref().map_or(true, |c| c.trim().is_empty());
    if was_empty && found.score < REVIEW_SCORE {
        let short: String = display_name.chars().take(50).collect();
        info!(
            "Org unit linked for '{}' -> '{}' (match score: {:.2})",
            short, label, found.score
        );
    }
    merge_org_unit(current, &label, found.score, settings.override_similarity)
}

fn coordinate(row: &Row<'_>, column: usize) -> Option<f64> {
    let cell = row.cell(column)?;
    cell.number
        .or_else(|| cell.text.trim().replace(',', ".").parse::<f64>().ok())
        .filter(|value| value.is_finite())
}

// First non-empty cell outside the address columns, then any non-empty cell
fn fallback_name(row: &Row<'_>, columns: &ColumnMap) -> Option<String> {
    let first_in = |skip_data_columns: bool| {
        (0..row.width())
            .filter(|c| !(skip_data_columns && columns.is_data_column(*c)))
            .find_map(|c| row.text(c))
            .and_then(|text| format_name(Some(text)))
    };
    first_in(true).or_else(|| first_in(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap()
    }

    fn build(table: &Table, mapping: &OrgUnitMapping) -> Vec<AddressRecord> {
        build_records(table, mapping, &MatchSettings::default(), now())
    }

    fn hr_mapping(rows: &[(&str, &str)]) -> OrgUnitMapping {
        let mut headers: Vec<String> = (0..12).map(|i| format!("Kolom {}", i)).collect();
        headers[1] = "Medewerker".into();
        headers[2] = "Status dienstverband".into();
        headers[11] = "OE naam".into();
        let header_refs: Vec<&str> = headers.iter().map(String::as_str).collect();
        let cells: Vec<Vec<&str>> = rows
            .iter()
            .map(|&(name, unit)| {
                let mut row = vec![""; 12];
                row[1] = name;
                row[2] = "In dienst";
                row[11] = unit;
                row
            })
            .collect();
        let row_refs: Vec<&[&str]> = cells.iter().map(Vec::as_slice).collect();
        OrgUnitMapping::from_hr_table(&Table::from_text_rows(&header_refs, &row_refs))
    }

    #[test]
    fn test_full_address_row_with_org_unit() {
        let table = Table::from_text_rows(
            &["Naam", "Adres"],
            &[&["Jansen (Piet)", "Hoofdweg 1, 1011 AB Amsterdam"]],
        );
        let mapping = hr_mapping(&[("Jansen (Piet)", "Finance")]);

        let records = build(&table, &mapping);
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.id, "shared-1");
        assert_eq!(record.name, "Piet Jansen");
        assert_eq!(record.street, "Hoofdweg");
        assert_eq!(record.house_number, "1");
        assert_eq!(record.postcode, "1011 AB");
        assert_eq!(record.city, "Amsterdam");
        assert_eq!(record.original_city, "Amsterdam");
        assert_eq!(record.organizational_unit.as_deref(), Some("Finance"));
        assert_eq!(record.source, "shared");
        assert_eq!(record.created_at, now());
    }

    #[test]
    fn test_explicit_columns_win() {
        let table = Table::from_text_rows(
            &["Medewerker", "Straat", "Huisnummer", "Postcode", "Plaats", "BU"],
            &[&["Rietschoten, T.A.J. van (Tijn)", "Kerkstraat", "12a", "1234 AB", "Utrecht", "ICT"]],
        );

        let record = &build(&table, &OrgUnitMapping::default())[0];
        assert_eq!(record.name, "Tijn van Rietschoten");
        assert_eq!(record.street, "Kerkstraat");
        assert_eq!(record.house_number, "12a");
        assert_eq!(record.postcode, "1234 AB");
        assert_eq!(record.city, "Utrecht");
        assert_eq!(record.organizational_unit.as_deref(), Some("ICT"));
    }

    #[test]
    fn test_full_address_with_only_city_column() {
        // The city column makes the sheet count as having separate columns, so
        // the full address is only parsed because the street is still unknown.
        let table = Table::from_text_rows(
            &["Naam", "Volledig adres", "Plaats"],
            &[
                &["Jansen (Piet)", "Hoofdweg 1, 1011 AB Amsterdam", "Amstelveen"],
                &["Bakker (Anna)", "Dorpsstraat 5, 1234 AB Ede GLD", ""],
            ],
        );

        let records = build(&table, &OrgUnitMapping::default());
        assert_eq!(records[0].street, "Hoofdweg");
        assert_eq!(records[0].house_number, "1");
        assert_eq!(records[0].postcode, "1011 AB");
        assert_eq!(records[0].city, "Amstelveen");

        assert_eq!(records[1].street, "Dorpsstraat");
        assert_eq!(records[1].city, "Ede GLD");
    }

    #[test]
    fn test_full_address_ignored_when_street_column_filled() {
        let table = Table::from_text_rows(
            &["Naam", "Straat", "Volledig adres"],
            &[
                &["Jansen (Piet)", "Kerkstraat", "Hoofdweg 1, 1011 AB Amsterdam"],
                &["Bakker (Anna)", "", "Hoofdweg 3, 1011 AB Amsterdam"],
            ],
        );

        let records = build(&table, &OrgUnitMapping::default());
        assert_eq!(records[0].street, "Kerkstraat");
        assert_eq!(records[0].house_number, "");
        assert_eq!(records[0].postcode, "");

        assert_eq!(records[1].street, "Hoofdweg");
        assert_eq!(records[1].house_number, "3");
        assert_eq!(records[1].postcode, "1011 AB");
    }

    #[test]
    fn test_blank_rows_are_skipped_and_ids_stay_stable() {
        let table = Table::from_text_rows(
            &["Naam", "Adres"],
            &[
                &["Jansen (Piet)", "Hoofdweg 1, 1011 AB Amsterdam"],
                &["", ""],
                &["Bakker (Anna)", "Dorpsstraat 5"],
            ],
        );

        let records = build(&table, &OrgUnitMapping::default());
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["shared-1", "shared-3"]);
    }

    #[test]
    fn test_name_fallbacks() {
        let table = Table::from_text_rows(
            &["Naam", "Opmerking", "Adres"],
            &[
                &["", "Vries, K. de (Kees)", "Hoofdweg 1"],
                &["", "", "Dorpsstraat 5"],
            ],
        );

        let records = build(&table, &OrgUnitMapping::default());
        assert_eq!(records[0].name, "Kees de Vries");
        // Only the address cell is filled, so it becomes the name
        assert_eq!(records[1].name, "Dorpsstraat 5");
    }

    #[test]
    fn test_placeholder_name_when_no_name_found() {
        let table = Table::from_text_rows(&["Naam", "Latitude", "Longitude"], &[&["", "", ""], &["", "52.1", ""]]);
        let records = build(&table, &OrgUnitMapping::default());

        assert_eq!(records.len(), 1);
        // "52.1" is the only value, so it is used before the placeholder
        assert_eq!(records[0].name, "52.1");

        let table = Table::new(vec!["Naam".into()], vec![vec![None, None]]);
        assert!(build(&table, &OrgUnitMapping::default()).is_empty());
    }

    #[test]
    fn test_placeholder_name_from_row_index() {
        let mut record = build(
            &Table::from_text_rows(&["Naam", "Adres"], &[&["x", ""]]),
            &OrgUnitMapping::default(),
        )
        .remove(0);
        assert_eq!(record.name, "x");

        let columns = ColumnMap::detect(&["Naam".to_string()]);
        let empty_row_table = Table::from_text_rows(&["Naam"], &[&[""]]);
        let row = empty_row_table.rows().next().unwrap();
        record = build_record(4, row, &columns, &OrgUnitMapping::default(), &MatchSettings::default(), now());
        assert_eq!(record.name, "Adres 5");
        assert_eq!(record.id, "shared-5");
    }

    #[test]
    fn test_coordinates_need_both_values() {
        let table = Table::from_text_rows(
            &["Naam", "Latitude", "Longitude"],
            &[
                &["Jansen (Piet)", "52,3702", "4.8952"],
                &["Bakker (Anna)", "52.1", ""],
                &["Vries (Kees)", "noord", "5.1"],
            ],
        );

        let records = build(&table, &OrgUnitMapping::default());
        assert_eq!(records[0].latitude, Some(52.3702));
        assert_eq!(records[0].longitude, Some(4.8952));
        assert_eq!(records[1].coordinates(), None);
        assert_eq!(records[1].latitude, None);
        assert_eq!(records[2].coordinates(), None);
        assert_eq!(records[2].longitude, None);
    }

    #[test]
    fn test_existing_unit_only_overridden_by_strong_match() {
        let table = Table::from_text_rows(
            &["Naam", "BU"],
            &[&["Jansen (Piet)", "Sales"], &["Janssen (Piet)", "Sales"], &["Bakker (Anna)", ""]],
        );
        let mapping = hr_mapping(&[("Jansen (Piet)", "Finance"), ("Bakker (Anne)", "HR")]);

        let records = build(&table, &mapping);
        assert_eq!(records[0].organizational_unit.as_deref(), Some("Finance"));
        // "piet janssen" vs "piet jansen" scores ~0.96
        assert_eq!(records[1].organizational_unit.as_deref(), Some("Finance"));
        // "anna bakker" vs "anne bakker" fills the empty unit
        assert_eq!(records[2].organizational_unit.as_deref(), Some("HR"));
    }

    #[test]
    fn test_weak_match_keeps_existing_unit() {
        let table = Table::from_text_rows(&["Naam", "BU"], &[&["Jansen (Pieter)", "Sales"]]);
        let mapping = hr_mapping(&[("Jansen (Piet)", "Finance")]);

        let records = build(&table, &mapping);
        assert_eq!(records[0].organizational_unit.as_deref(), Some("Sales"));
    }

    #[test]
    fn test_unmatched_name_has_no_unit() {
        let table = Table::from_text_rows(&["Naam"], &[&["Xu (Li)"]]);
        let mapping = hr_mapping(&[("Rietschoten, T.A.J. van (Tijn)", "IT")]);

        let records = build(&table, &mapping);
        assert_eq!(records[0].organizational_unit, None);
    }

    #[test]
    fn test_cached_formatted_name_is_preferred() {
        let table = Table::from_text_rows(
            &["Naam", "Adres", FORMATTED_NAME_HEADER],
            &[&["Jansen (Piet)", "Hoofdweg 1", "P. Jansen"], &["Bakker (Anna)", "Dorpsstraat 5", ""]],
        );

        let records = build(&table, &OrgUnitMapping::default());
        assert_eq!(records[0].name, "P. Jansen");
        assert_eq!(records[1].name, "Anna Bakker");
    }

    #[test]
    fn test_annotate_formatted_names() {
        let mut table = Table::from_text_rows(
            &["Naam", "Adres"],
            &[&["Rietschoten, T.A.J. van (Tijn)", "Hoofdweg 1"], &["", "Dorpsstraat 5"]],
        );

        assert!(annotate_formatted_names(&mut table));
        let column = table.column_index(FORMATTED_NAME_HEADER).unwrap();
        let values: Vec<Option<&str>> = table.rows().map(|r| r.text(column)).collect();
        assert_eq!(values, [Some("Tijn van Rietschoten"), None]);

        let mut no_names = Table::from_text_rows(&["Adres"], &[&["Hoofdweg 1"]]);
        assert!(!annotate_formatted_names(&mut no_names));
        assert_eq!(no_names.column_count(), 1);
    }

    #[test]
    fn test_building_twice_is_idempotent() {
        let table = Table::from_text_rows(
            &["Naam", "Adres", "BU"],
            &[
                &["Jansen (Piet)", "Hoofdweg 1, 1011 AB Amsterdam", ""],
                &["Bakker (Anna)", "Dorpsstraat 5", "HR"],
            ],
        );
        let mapping = hr_mapping(&[("Jansen (Piet)", "Finance")]);

        assert_eq!(build(&table, &mapping), build(&table, &mapping));
    }
}
