use log::info;

/// Header of the cached display-name column written back to the address sheet.
pub const FORMATTED_NAME_HEADER: &str = "Naam Geformatteerd";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Name,
    Street,
    HouseNumber,
    PostalCode,
    City,
    FullAddress,
    BusinessUnit,
    Latitude,
    Longitude,
}

// Evaluated once against the header row; first matching column wins per field.
const DETECTION_RULES: [(Field, &[&str]); 9] = [
    (Field::Name, &["naam", "name", "label", "medewerker", "persoon"]),
    (Field::Street, &["straat", "street", "adres", "address"]),
    (Field::HouseNumber, &["huisnummer", "huis", "nummer", "number", "nr"]),
    (Field::PostalCode, &["postcode", "post", "zip", "pc"]),
    (Field::City, &["plaats", "stad", "city", "gemeente"]),
    (Field::FullAddress, &["volledig", "adres", "address", "volledige"]),
    (Field::BusinessUnit, &["bu", "business unit", "businessunit"]),
    (Field::Latitude, &["latitude", "lat"]),
    (Field::Longitude, &["longitude", "lng", "lon"]),
];

/// Field → column index map for the address sheet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    pub name: Option<usize>,
    pub street: Option<usize>,
    pub house_number: Option<usize>,
    pub postal_code: Option<usize>,
    pub city: Option<usize>,
    pub full_address: Option<usize>,
    pub business_unit: Option<usize>,
    pub latitude: Option<usize>,
    pub longitude: Option<usize>,
    pub formatted_name: Option<usize>,
}

impl ColumnMap {
    pub fn detect(headers: &[String]) -> Self {
        let lowered: Vec<String> = headers.iter().map(|h| h.to_lowercase()).collect();
        let find = |keywords: &[&str]| {
            lowered
                .iter()
                .position(|header| keywords.iter().any(|k| header.contains(&k.to_lowercase())))
        };

        let mut map = ColumnMap {
            formatted_name: headers.iter().position(|h| h == FORMATTED_NAME_HEADER),
            ..ColumnMap::default()
        };
        for (field, keywords) in DETECTION_RULES {
            *map.slot(field) = find(keywords);
        }
        map
    }

    fn slot(&mut self, field: Field) -> &mut Option<usize> {
        match field {
            Field::Name => &mut self.name,
            Field::Street => &mut self.street,
            Field::HouseNumber => &mut self.house_number,
            Field::PostalCode => &mut self.postal_code,
            Field::City => &mut self.city,
            Field::FullAddress => &mut self.full_address,
            Field::BusinessUnit => &mut self.business_unit,
            Field::Latitude => &mut self.latitude,
            Field::Longitude => &mut self.longitude,
        }
    }

    /// Street column that is not simply the full-address column under another rule.
    pub fn separate_street(&self) -> Option<usize> {
        self.street.filter(|street| Some(*street) != self.full_address)
    }

    /// True when any address part has its own column. A city column alone
    /// counts, even without a street column.
    pub fn has_separate_columns(&self) -> bool {
        self.separate_street().is_some()
            || self.house_number.is_some()
            || self.postal_code.is_some()
            || self.city.is_some()
    }

    /// Columns consumed by address, unit or coordinate fields.
    pub fn is_data_column(&self, column: usize) -> bool {
        [
            self.street,
            self.house_number,
            self.postal_code,
            self.city,
            self.full_address,
            self.business_unit,
            self.latitude,
            self.longitude,
        ]
        .contains(&Some(column))
    }

    pub fn log_mapping(&self, headers: &[String]) {
        let label = |column: Option<usize>| {
            column
                .and_then(|c| headers.get(c))
                .map(|h| format!("'{}'", h))
                .unwrap_or_else(|| "-".to_string())
        };
        info!("Detected column mapping:");
        info!("   Name: {}", label(self.name));
        info!("   Street: {}", label(self.street));
        info!("   House number: {}", label(self.house_number));
        info!("   Postal code: {}", label(self.postal_code));
        info!("   City: {}", label(self.city));
        info!("   Full address: {}", label(self.full_address));
        info!("   Business unit: {}", label(self.business_unit));
        info!("   Latitude: {}", label(self.latitude));
        info!("   Longitude: {}", label(self.longitude));
    }
}
