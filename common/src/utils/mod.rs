//! Query helpers.

pub mod like_filter;
pub mod pagination;

// Re-export commonly used items
pub use like_filter::build_like_filter;
pub use pagination::{Page, Paginate};
