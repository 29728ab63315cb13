pub mod api;
pub mod client;
pub mod feed;

pub use client::{RestRemoteStore, RestStoreSettings};
