//! AFib Dashboard store: one facade over the hosted PostgREST backend and a
//! local SQLite database.

pub mod rest;
pub mod schema;
pub mod sqlite;
pub mod types;
mod views;

use afibdash_core::{ElementType, Result, StoreBackend};
use tracing::info;

pub use rest::RestStore;
pub use sqlite::SqliteStore;
pub use types::*;

/// Persistence backend selected at startup.
pub enum Store {
    Rest(RestStore),
    Sqlite(SqliteStore),
}

impl Store {
    /// Connect to the backend described by the configuration.
    pub fn open(backend: &StoreBackend) -> Result<Self> {
        let store = match backend {
            StoreBackend::Rest { url, api_key } => Self::Rest(RestStore::new(url, api_key)?),
            StoreBackend::Sqlite { path: Some(path) } => Self::Sqlite(SqliteStore::open(path)?),
            StoreBackend::Sqlite { path: None } => Self::Sqlite(SqliteStore::open_in_memory()?),
        };
        info!("Store backend: {}", backend.name());
        Ok(store)
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            Self::Rest(_) => "rest",
            Self::Sqlite(_) => "sqlite",
        }
    }

    pub async fn insert_element(&self, element: &NewElement) -> Result<i64> {
        match self {
            Self::Rest(s) => s.insert_element(element).await,
            Self::Sqlite(s) => s.insert_element(element),
        }
    }

    pub async fn delete_element(&self, id: i64) -> Result<()> {
        match self {
            Self::Rest(s) => s.delete_element(id).await,
            Self::Sqlite(s) => s.delete_element(id),
        }
    }

    pub async fn list_elements(&self, element_type: ElementType) -> Result<Vec<ElementRow>> {
        match self {
            Self::Rest(s) => s.list_elements(element_type).await,
            Self::Sqlite(s) => s.list_elements(element_type),
        }
    }

    pub async fn element_types(&self, ids: &[i64]) -> Result<Vec<ElementTypeRow>> {
        match self {
            Self::Rest(s) => s.element_types(ids).await,
            Self::Sqlite(s) => s.element_types(ids),
        }
    }

    pub async fn insert_answers(&self, answers: &[NewAnswer]) -> Result<()> {
        match self {
            Self::Rest(s) => s.insert_answers(answers).await,
            Self::Sqlite(s) => s.insert_answers(answers),
        }
    }

    pub async fn count_answers_by_elements(&self, ids: &[i64]) -> Result<Vec<AnswerAggregate>> {
        match self {
            Self::Rest(s) => s.count_answers_by_elements(ids).await,
            Self::Sqlite(s) => s.count_answers_by_elements(ids),
        }
    }

    pub async fn count_answers(&self, element_type: Option<ElementType>) -> Result<u64> {
        match self {
            Self::Rest(s) => s.count_answers(element_type).await,
            Self::Sqlite(s) => s.count_answers(element_type),
        }
    }

    pub async fn insert_clinical_picture(&self, picture: &NewClinicalPicture) -> Result<()> {
        match self {
            Self::Rest(s) => s.insert_clinical_picture(picture).await,
            Self::Sqlite(s) => s.insert_clinical_picture(picture).map(|_| ()),
        }
    }

    pub async fn recent_clinical_pictures(&self, limit: usize) -> Result<Vec<ClinicalPictureRow>> {
        match self {
            Self::Rest(s) => s.recent_clinical_pictures(limit).await,
            Self::Sqlite(s) => s.recent_clinical_pictures(limit),
        }
    }

    pub async fn count_clinical_pictures(&self) -> Result<u64> {
        match self {
            Self::Rest(s) => s.count_clinical_pictures().await,
            Self::Sqlite(s) => s.count_clinical_pictures(),
        }
    }

    pub async fn insert_summary(&self, summary: &NewSummary) -> Result<()> {
        match self {
            Self::Rest(s) => s.insert_summary(summary).await,
            Self::Sqlite(s) => s.insert_summary(summary),
        }
    }

    pub async fn latest_summary(&self) -> Result<Option<SummaryRow>> {
        match self {
            Self::Rest(s) => s.latest_summary().await,
            Self::Sqlite(s) => s.latest_summary(),
        }
    }
}
