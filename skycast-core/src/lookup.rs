use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

use crate::model::WeatherRecord;

/// Failure modes of a city lookup. None of these are fatal; the
/// presentation layer turns them into user-visible messages.
#[derive(Debug, Error)]
pub enum LookupError {
    /// The directory returned no matches for the query.
    #[error("no city matched the query")]
    NotFound,
    #[error("city lookup request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("city lookup failed with status {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("failed to parse city lookup response: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Async city search, consumed by the presentation layer.
///
/// The store never calls this itself; a chosen result is fed into
/// [`WeatherStore::set_current_weather`](crate::store::WeatherStore::set_current_weather).
#[async_trait]
pub trait CityLookup: Send + Sync {
    /// Search the city directory by (partial) name. Matches are returned in
    /// directory order; an empty response surfaces as [`LookupError::NotFound`].
    async fn search(&self, query: &str) -> Result<Vec<WeatherRecord>, LookupError>;
}

/// Lookup against the city directory HTTP service.
#[derive(Debug, Clone)]
pub struct HttpCityLookup {
    base_url: String,
    http: Client,
}

impl HttpCityLookup {
    pub fn new(base_url: impl Into<String>) -> Result<Self, LookupError> {
        let http = Client::builder().timeout(Duration::from_secs(10)).build()?;

        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }

        Ok(Self { base_url, http })
    }
}

#[async_trait]
impl CityLookup for HttpCityLookup {
    async fn search(&self, query: &str) -> Result<Vec<WeatherRecord>, LookupError> {
        let url = format!("{}/cities", self.base_url);

        let res = self.http.get(&url).query(&[("city_like", query)]).send().await?;

        let status = res.status();
        let body = res.text().await?;

        if !status.is_success() {
            return Err(LookupError::Status { status, body: truncate_body(&body) });
        }

        parse_search_body(&body)
    }
}

/// Decode a directory response body, mapping an empty match list to
/// [`LookupError::NotFound`].
fn parse_search_body(body: &str) -> Result<Vec<WeatherRecord>, LookupError> {
    let records: Vec<WeatherRecord> = serde_json::from_str(body)?;
    if records.is_empty() {
        return Err(LookupError::NotFound);
    }
    Ok(records)
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX { format!("{}...", &body[..MAX]) } else { body.to_string() }
}
