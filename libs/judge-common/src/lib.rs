pub mod accounts;
pub mod catalog;
pub mod config;
pub mod error;
pub mod types;

pub use error::StoreError;
