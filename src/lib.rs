//! ChurnForge: churn prediction for bank customers
//!
//! The library holds both halves of the system: a scoring service that routes
//! each customer to a per-country classifier bundle and applies that bundle's
//! decision threshold, and a terminal dashboard that validates a customer CSV,
//! calls the service and summarizes the results.

pub mod analytics;
pub mod bundle;
pub mod cli;
pub mod client;
pub mod data;
pub mod error;
pub mod features;
pub mod geography;
pub mod model;
pub mod report;
pub mod schema;
pub mod scoring;
pub mod server;

// Re-export public items for easier access
pub use bundle::{BundleFile, ModelBundle, ModelRegistry};
pub use cli::Args;
pub use client::ScoringClient;
pub use data::{load_customer_data, CustomerData};
pub use error::{BundleError, DashboardError, ModelError, ScoringError};
pub use geography::Geography;
pub use schema::{normalize_gender, validate_and_preprocess, CustomerRecord};
pub use scoring::{feature_importances, score_batch, FeatureImportanceMap, PredictionResult};

/// Common result type used throughout the application
pub type Result<T> = anyhow::Result<T>;
