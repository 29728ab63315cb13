pub mod client;
pub mod pager;

pub use client::{SearchPage, TmdbClient};
pub use pager::CatalogPager;
