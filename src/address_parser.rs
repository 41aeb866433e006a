use regex::Regex;
use std::sync::LazyLock;

use crate::models::ParsedAddress;

// Dutch postcode: 4 digits, whitespace, 2 letters
static POSTCODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d{4}\s+[A-Z]{2})\b").unwrap());
// Trailing house number with optional letter and optional separate suffix word ("24 b")
static HOUSE_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s+(\d+[a-zA-Z]?)(?:\s+([a-z]+))?\s*$").unwrap());
static HOUSE_NUMBER_FALLBACK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+(\d+[a-zA-Z]?)\s*$").unwrap());

/// Parses "Straatnaam Huisnummer, Postcode Plaats" into its parts.
///
/// The postcode is the anchor: what follows it is the city, what precedes
/// it is street plus house number. Any part that cannot be found is `None`.
pub fn parse_address(full_address: Option<&str>) -> ParsedAddress {
    let Some(full_address) = full_address.map(str::trim).filter(|a| !a.is_empty()) else {
        return ParsedAddress::default();
    };

    let mut parsed = ParsedAddress::default();
    let mut address_part = full_address;

    if let Some(postcode) = POSTCODE_RE.captures(full_address).and_then(|c| c.get(1)) {
        parsed.postal_code = Some(postcode.as_str().trim().to_uppercase());
        parsed.city = non_empty(&full_address[postcode.end()..]);
        address_part = full_address[..postcode.start()].trim();
    }

    let address_part = address_part.trim_end_matches(',');
    let (street, house_number) = split_house_number(address_part);
    parsed.street = non_empty(street);
    parsed.house_number = house_number;

    parsed
}

fn split_house_number(address_part: &str) -> (&str, Option<String>) {
    if let Some(captures) = HOUSE_NUMBER_RE.captures(address_part) {
        if let (Some(whole), Some(number)) = (captures.get(0), captures.get(1)) {
            let house_number = match captures.get(2) {
                Some(suffix) => format!("{} {}", number.as_str(), suffix.as_str()),
                None => number.as_str().to_string(),
            };
            return (&address_part[..whole.start()], Some(house_number));
        }
    }

    if let Some(captures) = HOUSE_NUMBER_FALLBACK_RE.captures(address_part) {
        if let (Some(whole), Some(number)) = (captures.get(0), captures.get(1)) {
            return (&address_part[..whole.start()], Some(number.as_str().to_string()));
        }
    }

    (address_part, None)
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
