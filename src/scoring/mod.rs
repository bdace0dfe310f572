//! Pair risk scorers: literature co-mentions and structural similarity.

pub mod chemistry;
pub mod fingerprint;
pub mod pubmed;
pub mod structures;
pub mod summary;

pub use chemistry::StructureSimilarityScorer;
pub use pubmed::PubMedClient;
pub use structures::{StructureLookup, StructureTable};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScoringError {
    #[error("Cannot connect to {0}")]
    Connection(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Search service returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Unexpected response body: {0}")]
    ResponseParsing(String),

    #[error("Invalid SMILES: {0}")]
    InvalidSmiles(#[from] fingerprint::SmilesError),

    #[error("Structure table is invalid: {0}")]
    ReferenceData(String),
}
