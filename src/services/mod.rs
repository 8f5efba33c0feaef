//! Service layer: the external collaborators behind traits, and the
//! wardrobe pipeline that orchestrates them.

pub mod background_removal;
pub mod completion;
pub mod garment_store;
pub mod storage_service;
pub mod supabase_storage;
pub mod wardrobe_service;
