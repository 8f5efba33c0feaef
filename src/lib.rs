//! Wardrobe backend: garment photos in, background-removed and AI-classified
//! wardrobe records out, plus wardrobe-aware styling advice.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
