//! Waste classification web service
//!
//! Users sign in with Google, spend tokens to classify photos of waste into
//! one of twelve categories, and see the local air-quality index on the home
//! page.

pub mod air_quality;
pub mod classifier;
pub mod config;
pub mod error;
pub mod identity;
pub mod models;
pub mod oauth;
pub mod repositories;
pub mod routes;
pub mod session;
pub mod state;
pub mod uploads;
pub mod validation;
pub mod views;

pub use state::AppState;
