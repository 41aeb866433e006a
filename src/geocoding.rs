//! Coordinates for address records through Nominatim (OpenStreetMap).

use anyhow::{Context, Result};
use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::config::GeocodingConfig;
use crate::models::{AddressRecord, Coordinates};

/// Resolves a free-text address to at most one coordinate pair.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, query: &str, country_code: &str) -> Result<Option<Coordinates>>;
}

pub struct NominatimGeocoder {
    client: Client,
    search_url: String,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    lat: String,
    lon: String,
}

impl NominatimGeocoder {
    pub fn new(config: &GeocodingConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout)
            .build()
            .context("Failed to create HTTP client for geocoding")?;
        Ok(Self {
            client,
            search_url: format!("{}/search", config.base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn geocode(&self, query: &str, country_code: &str) -> Result<Option<Coordinates>> {
        let results: Vec<SearchResult> = self
            .client
            .get(&self.search_url)
            .query(&[
                ("q", query),
                ("format", "json"),
                ("limit", "1"),
                ("countrycodes", country_code),
            ])
            .send()
            .await
            .context("Geocoding request failed")?
            .error_for_status()
            .context("Geocoding service returned an error status")?
            .json()
            .await
            .context("Failed to decode geocoding response")?;

        let Some(first) = results.into_iter().next() else {
            return Ok(None);
        };
        let latitude: f64 = first.lat.parse().context("Invalid latitude in geocoding response")?;
        let longitude: f64 = first.lon.parse().context("Invalid longitude in geocoding response")?;
        Ok(Some(Coordinates { latitude, longitude }))
    }
}

/// "Straat 1, 1234 AB, Plaats, Nederland". `None` when there is nothing to look up.
pub fn build_query(
    street: &str,
    house_number: &str,
    postal_code: &str,
    city: &str,
    country_name: &str,
) -> Option<String> {
    let mut parts: Vec<String> = Vec::new();
    if !street.is_empty() {
        if house_number.is_empty() {
            parts.push(street.to_string());
        } else {
            parts.push(format!("{} {}", street, house_number));
        }
    }
    if !postal_code.is_empty() {
        parts.push(postal_code.to_string());
    }
    if !city.is_empty() {
        parts.push(city.to_string());
    }
    if parts.is_empty() {
        return None;
    }
    if !country_name.is_empty() {
        parts.push(country_name.to_string());
    }
    Some(parts.join(", "))
}

/// City without its last word ("Arnhem GLD" -> "Arnhem"); `None` for single words.
pub fn drop_last_word(city: &str) -> Option<String> {
    let words: Vec<&str> = city.split_whitespace().collect();
    if words.len() > 1 {
        Some(words[..words.len() - 1].join(" "))
    } else {
        None
    }
}

/// Queries to try in order, from the full address down to postcode + city.
pub fn query_sequence(record: &AddressRecord, country_name: &str) -> Vec<String> {
    let street = record.street.trim();
    let house_number = record.house_number.trim();
    let postal_code = record.postcode.trim();
    let city = record.original_city.trim();
    let shorter_city = drop_last_word(city);

    let mut queries = Vec::new();
    let mut push = |query: Option<String>| {
        if let Some(query) = query {
            queries.push(query);
        }
    };

    push(build_query(street, house_number, postal_code, city, country_name));
    if let Some(shorter) = shorter_city.as_deref() {
        push(build_query(street, house_number, postal_code, shorter, country_name));
    }
    if !street.is_empty() && !postal_code.is_empty() && !city.is_empty() {
        let fallback_city = shorter_city.as_deref().unwrap_or(city);
        push(build_query("", "", postal_code, fallback_city, country_name));
    }
    queries
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichmentSummary {
    pub attempted: usize,
    pub geocoded: usize,
    pub skipped: usize,
}

/// Keeps at least `delay` between consecutive requests.
struct Pacer {
    delay: Duration,
    requested_before: bool,
}

impl Pacer {
    async fn wait_turn(&mut self) {
        if self.requested_before && !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.requested_before = true;
    }
}

pub struct GeocodingEnricher<'a> {
    geocoder: &'a dyn Geocoder,
    country_code: String,
    country_name: String,
    delay: Duration,
}

impl<'a> GeocodingEnricher<'a> {
    pub fn new(geocoder: &'a dyn Geocoder, config: &GeocodingConfig) -> Self {
        Self {
            geocoder,
            country_code: config.country_code.clone(),
            country_name: config.country_name.clone(),
            delay: config.delay,
        }
    }

    /// Fills coordinates for every record that lacks them. Misses and
    /// request failures leave the record without coordinates.
    pub async fn enrich(&self, records: &mut [AddressRecord]) -> EnrichmentSummary {
        let mut summary = EnrichmentSummary::default();
        let pending: Vec<usize> = records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.coordinates().is_none())
            .map(|(i, _)| i)
            .collect();

        if pending.is_empty() {
            info!("All addresses already have coordinates");
            return summary;
        }
        info!(
            "{} addresses without coordinates; geocoding at one request per {:?}",
            pending.len(),
            self.delay
        );

        let progress = ProgressBar::new(pending.len() as u64);
        progress.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );

        let mut pacer = Pacer { delay: self.delay, requested_before: false };
        for (position, &index) in pending.iter().enumerate() {
            let record = &mut records[index];
            let queries = query_sequence(record, &self.country_name);
            if queries.is_empty() {
                info!(
                    "[{}/{}] Address incomplete for '{}', skipped",
                    position + 1,
                    pending.len(),
                    record.name
                );
                summary.skipped += 1;
                progress.inc(1);
                continue;
            }

            summary.attempted += 1;
            progress.set_message(record.display_address());
            let found = self.first_hit(&queries, &mut pacer).await;
            match found {
                Some(coordinates) => {
                    info!(
                        "[{}/{}] {} -> {}, {}",
                        position + 1,
                        pending.len(),
                        record.display_address(),
                        coordinates.latitude,
                        coordinates.longitude
                    );
                    record.set_coordinates(Some(coordinates));
                    summary.geocoded += 1;
                }
                None => {
                    warn!(
                        "[{}/{}] No coordinates found for '{}'",
                        position + 1,
                        pending.len(),
                        record.display_address()
                    );
                }
            }
            progress.inc(1);
        }
        progress.finish_and_clear();

        info!(
            "Geocoding finished: {} of {} attempted addresses geocoded, {} skipped",
            summary.geocoded, summary.attempted, summary.skipped
        );
        summary
    }

    async fn first_hit(&self, queries: &[String], pacer: &mut Pacer) -> Option<Coordinates> {
        for (attempt, query) in queries.iter().enumerate() {
            pacer.wait_turn().await;
            if attempt > 0 {
                debug!("Retrying with '{}'", query);
            }
            match self.geocoder.geocode(query, &self.country_code).await {
                Ok(Some(coordinates)) => return Some(coordinates),
                Ok(None) => debug!("No result for '{}'", query),
                Err(e) => warn!("Geocoding failed for '{}': {:#}", query, e),
            }
        }
        None
    }
}
