pub mod health;
pub mod integrity;
pub mod sessions;
