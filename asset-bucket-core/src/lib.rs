#![doc = "asset-bucket-core: core logic library for asset-bucket."]

//! This crate contains the scanning, migration and batch logic for asset-bucket.
//! Transport (the concrete object-store client) is not included here; it plugs in
//! through the [`contract::AssetStore`] trait.
//!
//! # Usage
//! Add this as a dependency for all shared scan, migrate and batch code.

pub mod batch;
pub mod config;
pub mod contract;
pub mod legacy;
pub mod migrate;
pub mod scan;
