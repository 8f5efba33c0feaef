//! Core data models for the wardrobe backend.
//!
//! `garment` maps the `prendas` table via `sqlx::FromRow`; `detection`
//! holds what the vision model reports about an image.

pub mod detection;
pub mod garment;
