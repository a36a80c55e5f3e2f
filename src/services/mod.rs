pub mod image_store;
pub mod stamp_service;
