use std::time::Duration;

use crate::domain::SubscriptionKey;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // Input validation errors
    #[error("{0}")]
    Validation(String),
    // Store errors
    #[error("No subscription found for {0}")]
    NotFound(SubscriptionKey),
    #[error("Storage operation timed out after {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    // Catalog client errors
    #[error("Catalog request failed: {0}")]
    Catalog(#[from] reqwest::Error),
    #[error("Unexpected catalog response: {0}")]
    CatalogResponse(String),
    // Lifecycle errors
    #[error("{0} has already been started")]
    AlreadyStarted(&'static str),
}
