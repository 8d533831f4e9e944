pub mod composition;
pub mod layer;
pub mod media;
pub mod settings;
