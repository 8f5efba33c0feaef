//! HTTP handlers. Each one extracts its inputs and delegates to
//! `WardrobeService`; errors render through `AppError`.

pub mod fashion_handlers;
pub mod file_handlers;
pub mod garment_handlers;
pub mod health_handlers;
