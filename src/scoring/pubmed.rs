//! Literature scorer backed by the NCBI E-utilities `esearch` endpoint.
//!
//! Only the hit count matters: many co-mentions under the Drug Interactions
//! heading mean a documented interaction, a few mean one worth reviewing.

use std::time::Duration;

use serde::Deserialize;

use super::summary::interaction_summary;
use super::ScoringError;
use crate::models::LiteratureVerdict;
use crate::pipeline::audit::LiteratureScorer;

pub const DEFAULT_ESEARCH_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi";

/// Citation count above which an interaction counts as known.
pub const KNOWN_RISK_CITATIONS: u32 = 5;

const RETMAX: &str = "5";

pub struct PubMedClient {
    client: reqwest::blocking::Client,
    url: String,
    api_key: Option<String>,
    timeout_secs: u64,
}

impl PubMedClient {
    pub fn new(url: &str, timeout_secs: u64, api_key: Option<String>) -> Result<Self, ScoringError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("ddi-audit/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ScoringError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            url: url.to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            timeout_secs,
        })
    }

    /// Number of PubMed articles co-mentioning both drugs.
    pub fn citation_count(&self, drug_a: &str, drug_b: &str) -> Result<u32, ScoringError> {
        let term = search_term(drug_a, drug_b);
        let mut query: Vec<(&str, &str)> = vec![
            ("db", "pubmed"),
            ("term", term.as_str()),
            ("retmode", "json"),
            ("retmax", RETMAX),
        ];
        if let Some(key) = &self.api_key {
            query.push(("api_key", key.as_str()));
        }

        let response = self.client.get(&self.url).query(&query).send().map_err(|e| {
            if e.is_connect() {
                ScoringError::Connection(self.url.clone())
            } else if e.is_timeout() {
                ScoringError::Timeout(self.timeout_secs)
            } else {
                ScoringError::HttpClient(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ScoringError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .text()
            .map_err(|e| ScoringError::ResponseParsing(e.to_string()))?;
        parse_search_count(&body)
    }
}

impl LiteratureScorer for PubMedClient {
    fn score(&self, drug_a: &str, drug_b: &str) -> LiteratureVerdict {
        tracing::debug!(drug_a, drug_b, "Searching literature");
        match self.citation_count(drug_a, drug_b) {
            Ok(count) => verdict_for_count(drug_a, drug_b, count),
            Err(e) => {
                tracing::warn!(drug_a, drug_b, error = %e, "Literature search failed");
                verdict_for_error(e)
            }
        }
    }
}

/// Search term restricting both names to title/abstract and the result to
/// the Drug Interactions MeSH heading.
pub fn search_term(drug_a: &str, drug_b: &str) -> String {
    format!("{drug_a}[Title/Abstract] AND {drug_b}[Title/Abstract] AND Drug Interactions[MeSH]")
}

#[derive(Deserialize)]
struct ESearchResponse {
    esearchresult: ESearchResult,
}

#[derive(Deserialize)]
struct ESearchResult {
    count: String,
}

/// Extract `esearchresult.count`, which the service sends as a string.
pub fn parse_search_count(body: &str) -> Result<u32, ScoringError> {
    let parsed: ESearchResponse =
        serde_json::from_str(body).map_err(|e| ScoringError::ResponseParsing(e.to_string()))?;
    parsed
        .esearchresult
        .count
        .trim()
        .parse()
        .map_err(|_| ScoringError::ResponseParsing(format!("count is not a number: {}", parsed.esearchresult.count)))
}

pub fn verdict_for_count(drug_a: &str, drug_b: &str, count: u32) -> LiteratureVerdict {
    if count > KNOWN_RISK_CITATIONS {
        LiteratureVerdict::KnownRisk {
            citations: count,
            summary: interaction_summary(drug_a, drug_b).to_string(),
        }
    } else if count > 0 {
        LiteratureVerdict::PotentialRisk { citations: count }
    } else {
        LiteratureVerdict::NoFlag
    }
}

fn verdict_for_error(error: ScoringError) -> LiteratureVerdict {
    match error {
        ScoringError::Connection(_) | ScoringError::Timeout(_) => LiteratureVerdict::Unavailable {
            message: error.to_string(),
        },
        ScoringError::Http { status, .. } => LiteratureVerdict::ApiError {
            status: Some(status),
            message: error.to_string(),
        },
        other => LiteratureVerdict::ApiError {
            status: None,
            message: other.to_string(),
        },
    }
}
