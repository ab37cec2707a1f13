//! Outcome source contract and the HTTP results adapter
//!
//! The upstream endpoint serves one JSON document for all tables:
//! `{ "<table>": { "results": [ { "number": "17", ... }, ... ] }, ... }`
//! with results ordered newest-first and already deduplicated.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

use crate::pattern::{Outcome, DOMAIN_SIZE};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Deserialize)]
pub struct ResultEntry {
    #[serde(default)]
    pub number: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct TableResults {
    #[serde(default)]
    pub results: Vec<ResultEntry>,
}

/// Provider of the most recent outcomes for a table, newest-first.
/// Implementations must be safely retryable.
#[async_trait]
pub trait OutcomeSource: Send + Sync {
    async fn fetch(&self, table: &str) -> Result<Vec<Outcome>, FetchError>;
}

/// Fetches the shared results document and extracts one table's outcomes.
pub struct HttpOutcomeSource {
    client: reqwest::Client,
    url: String,
}

impl HttpOutcomeSource {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl OutcomeSource for HttpOutcomeSource {
    async fn fetch(&self, table: &str) -> Result<Vec<Outcome>, FetchError> {
        let payload: HashMap<String, TableResults> = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        // A table missing from the document is "no new data", not an error.
        Ok(payload
            .get(table)
            .map(parse_outcomes)
            .unwrap_or_default())
    }
}

/// Extract valid outcomes, dropping non-numeric or out-of-domain entries
/// while keeping the rest.
pub fn parse_outcomes(results: &TableResults) -> Vec<Outcome> {
    results
        .results
        .iter()
        .filter_map(|entry| entry.number.trim().parse::<Outcome>().ok())
        .filter(|&n| (n as usize) < DOMAIN_SIZE)
        .collect()
}
