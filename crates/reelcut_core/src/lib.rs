pub mod allocate;
pub mod classify;
pub mod error;
pub mod layout;
pub mod manifest;
pub mod settings;
pub mod store;
pub mod types;
