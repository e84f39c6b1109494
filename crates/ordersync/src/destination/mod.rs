//! Search-index destination
//!
//! The pipeline talks to the index store through [`Destination`]: one call
//! to read an index mapping, one to submit a bulk request. The production
//! implementation is [`ElasticsearchClient`].

pub mod elasticsearch;
pub mod types;

use async_trait::async_trait;
use thiserror::Error;

pub use elasticsearch::ElasticsearchClient;
pub use types::{
    BulkItemError, BulkItemResult, BulkResponse, BulkResponseItem, BulkUpdate, FieldMapping,
    IndexMapping, MappingResponse, TypeMapping,
};

#[derive(Error, Debug)]
pub enum DestinationError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("Index '{0}' does not exist")]
    IndexNotFound(String),

    #[error("Unexpected response body: {0}")]
    Decode(String),
}

#[async_trait]
pub trait Destination: Send + Sync {
    /// Read the mapping of an index (or alias)
    async fn get_mapping(&self, index: &str) -> Result<MappingResponse, DestinationError>;

    /// Submit one bulk request; item-level failures are part of the response
    async fn bulk(&self, updates: &[BulkUpdate]) -> Result<BulkResponse, DestinationError>;
}
