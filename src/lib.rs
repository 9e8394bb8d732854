//! Used-car price estimation behind a single web form.
//!
//! A pre-trained XGBoost regression model is loaded once at startup
//! ([`model::ModelLoader`]) and injected into the HTTP server. Each form
//! submission runs through a [`session::PredictorSession`]: widget values are
//! collected, assembled into a [`types::CarInputRecord`] with its categorical
//! columns tagged, priced by the model, and rendered back into the page.

pub mod config;
pub mod error;
pub mod model;
pub mod page;
pub mod schema;
pub mod server;
pub mod session;
pub mod types;

pub use error::{ConfigError, FormError, ModelLoadError, PredictionError};
pub use model::{LoadedModel, ModelLoader, PredictionService};
pub use schema::{Category, CategoryTable, CellValue, Column, ColumnKind, UnseenCategoryPolicy};
pub use session::{build_record, collect_input, predict, render, FormFields, Outcome, PredictorSession};
pub use types::{CarFormInput, CarInputRecord, PriceEstimate};
