//! Shared services

mod store;

pub use store::LocalStore;
