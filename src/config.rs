use log::{info, warn};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Similarity thresholds for org-unit matching.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchSettings {
    /// Minimum score for a label to be accepted at all.
    pub min_similarity: f64,
    /// Score at which a match may replace a unit already present on the row.
    pub override_similarity: f64,
}

impl Default for MatchSettings {
    fn default() -> Self {
        MatchSettings {
            min_similarity: 0.5,
            override_similarity: 0.95,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeocodingConfig {
    pub enabled: bool,
    pub base_url: String,
    pub user_agent: String, // Nominatim rejects requests without one
    pub country_code: String,
    pub country_name: String,
    pub timeout: Duration,
    pub delay: Duration,
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        GeocodingConfig {
            enabled: true,
            base_url: "https://nominatim.openstreetmap.org".to_string(),
            user_agent: "AdresAfstandTool/1.0".to_string(),
            country_code: "nl".to_string(),
            country_name: "Nederland".to_string(),
            timeout: Duration::from_secs(10),
            delay: Duration::from_secs(1),
        }
    }
}

/// Everything a run needs; defaults match the files the tool has always used.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportConfig {
    pub address_sheet_path: PathBuf,
    pub hr_export_path: PathBuf,
    pub output_path: PathBuf,
    pub write_back_formatted_names: bool,
    pub matching: MatchSettings,
    pub geocoding: GeocodingConfig,
}

impl Default for ExportConfig {
    fn default() -> Self {
        ExportConfig {
            address_sheet_path: PathBuf::from("alle medewerker adressen.xlsx"),
            hr_export_path: PathBuf::from("afas export.xlsx"),
            output_path: PathBuf::from("adressen.json"),
            write_back_formatted_names: true,
            matching: MatchSettings::default(),
            geocoding: GeocodingConfig::default(),
        }
    }
}

impl ExportConfig {
    /// Defaults overridden by environment variables (see `.env`).
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ExportConfig::from_env`] with an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = ExportConfig::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let config = ExportConfig {
            address_sheet_path: get("ADDRESS_SHEET_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.address_sheet_path),
            hr_export_path: get("HR_EXPORT_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.hr_export_path),
            output_path: get("OUTPUT_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_path),
            write_back_formatted_names: parse_or(
                "WRITE_BACK_FORMATTED_NAMES",
                get("WRITE_BACK_FORMATTED_NAMES"),
                defaults.write_back_formatted_names,
            ),
            matching: MatchSettings {
                min_similarity: parse_or(
                    "OE_MIN_SIMILARITY",
                    get("OE_MIN_SIMILARITY"),
                    defaults.matching.min_similarity,
                ),
                override_similarity: parse_or(
                    "OE_OVERRIDE_SIMILARITY",
                    get("OE_OVERRIDE_SIMILARITY"),
                    defaults.matching.override_similarity,
                ),
            },
            geocoding: GeocodingConfig {
                enabled: parse_or("GEOCODING_ENABLED", get("GEOCODING_ENABLED"), defaults.geocoding.enabled),
                base_url: get("GEOCODER_URL").unwrap_or(defaults.geocoding.base_url),
                user_agent: get("GEOCODER_USER_AGENT").unwrap_or(defaults.geocoding.user_agent),
                country_code: get("GEOCODER_COUNTRY_CODE").unwrap_or(defaults.geocoding.country_code),
                country_name: get("GEOCODER_COUNTRY_NAME").unwrap_or(defaults.geocoding.country_name),
                timeout: Duration::from_secs(parse_or(
                    "GEOCODER_TIMEOUT_SECS",
                    get("GEOCODER_TIMEOUT_SECS"),
                    defaults.geocoding.timeout.as_secs(),
                )),
                delay: Duration::from_millis(parse_or(
                    "GEOCODER_DELAY_MS",
                    get("GEOCODER_DELAY_MS"),
                    defaults.geocoding.delay.as_millis() as u64,
                )),
            },
        };

        info!(
            "Config: addresses={:?}, hr_export={:?}, output={:?}, geocoding={}",
            config.address_sheet_path,
            config.hr_export_path,
            config.output_path,
            config.geocoding.enabled
        );
        config
    }
}

fn parse_or<T: FromStr + Copy>(key: &str, value: Option<String>, default: T) -> T {
    match value {
        Some(raw) => raw.parse::<T>().unwrap_or_else(|_| {
            warn!("Ignoring invalid value '{}' for {}; using default", raw, key);
            default
        }),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> ExportConfig {
        let vars: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        ExportConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);
        assert_eq!(config, ExportConfig::default());
        assert_eq!(config.matching.min_similarity, 0.5);
        assert_eq!(config.matching.override_similarity, 0.95);
        assert_eq!(config.geocoding.delay, Duration::from_secs(1));
        assert_eq!(config.geocoding.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("OUTPUT_PATH", "out/adressen.json"),
            ("OE_MIN_SIMILARITY", "0.7"),
            ("GEOCODING_ENABLED", "false"),
            ("GEOCODER_DELAY_MS", "250"),
        ]);

        assert_eq!(config.output_path, PathBuf::from("out/adressen.json"));
        assert_eq!(config.matching.min_similarity, 0.7);
        assert!(!config.geocoding.enabled);
        assert_eq!(config.geocoding.delay, Duration::from_millis(250));
    }

    #[test]
    fn test_invalid_values_fall_back_to_default() {
        let config = config_from(&[("OE_OVERRIDE_SIMILARITY", "hoog"), ("GEOCODER_TIMEOUT_SECS", " ")]);
        assert_eq!(config.matching.override_similarity, 0.95);
        assert_eq!(config.geocoding.timeout, Duration::from_secs(10));
    }
}
