pub mod catalog;
pub mod classifier;
pub mod config;
pub mod error;
pub mod models;
pub mod server;
pub mod store;

pub use catalog::MovieCatalog;
pub use classifier::{LinearClassifier, SentimentClassifier, SentimentModel};
pub use config::Config;
pub use error::StoreError;
pub use models::*;
pub use server::AppState;
pub use store::ReviewStore;
