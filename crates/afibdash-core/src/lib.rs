//! AFib Dashboard core: element categories, configuration, text helpers.

pub mod category;
pub mod config;
pub mod error;
pub mod text;

pub use category::{Category, ElementType, SurveyCard};
pub use config::{AppConfig, StoreBackend};
pub use error::{Error, Result};
