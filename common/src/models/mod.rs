//! Shared data models.

pub mod backend;

pub use backend::Backend;
