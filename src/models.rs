use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tag written into every record produced by this export.
pub const RECORD_SOURCE: &str = "shared";

/// Name split into its display parts, e.g. "Tijn" / "van" / "Rietschoten".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedName {
    pub first_name: String,
    pub prefix: String, // tussenvoegsel, empty when absent
    pub last_name: String,
}

// Intermediate result of splitting a free-text address
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedAddress {
    pub street: Option<String>,
    pub house_number: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

// Final export row, serialized with the field names the web app reads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressRecord {
    pub id: String,
    #[serde(rename = "naam")]
    pub name: String,
    #[serde(rename = "straat")]
    pub street: String,
    #[serde(rename = "huisnummer")]
    pub house_number: String,
    pub postcode: String,
    #[serde(rename = "plaats")]
    pub city: String,
    #[serde(skip)]
    pub original_city: String, // Only used for geocoding retries
    pub source: String,
    #[serde(rename = "toegevoegdOp")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "bu", skip_serializing_if = "Option::is_none", default)]
    pub organizational_unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub longitude: Option<f64>,
}

impl AddressRecord {
    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinates { latitude, longitude }),
            _ => None,
        }
    }

    /// Sets both coordinates at once so they are never half-present.
    pub fn set_coordinates(&mut self, coordinates: Option<Coordinates>) {
        self.latitude = coordinates.map(|c| c.latitude);
        self.longitude = coordinates.map(|c| c.longitude);
    }

    pub fn has_address_parts(&self) -> bool {
        !self.street.is_empty() || !self.postcode.is_empty() || !self.original_city.is_empty()
    }

    /// Human readable "Straat 1, 1234 AB, Plaats" used in progress output.
    pub fn display_address(&self) -> String {
        let mut parts = Vec::new();
        if !self.street.is_empty() {
            if self.house_number.is_empty() {
                parts.push(self.street.clone());
            } else {
                parts.push(format!("{} {}", self.street, self.house_number));
            }
        }
        if !self.postcode.is_empty() {
            parts.push(self.postcode.clone());
        }
        if !self.original_city.is_empty() {
            parts.push(self.original_city.clone());
        }
        if parts.is_empty() {
            "onbekend".to_string()
        } else {
            parts.join(", ")
        }
    }
}
