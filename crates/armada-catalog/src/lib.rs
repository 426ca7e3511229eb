//! `armada-catalog` – Persistent resource bookkeeping.
//!
//! # Modules
//!
//! - [`catalog`] – [`ResourceCatalog`][catalog::ResourceCatalog]: a SQLite
//!   mirror of every resource a coordinator has allocated, used to release
//!   orphans left behind by a crashed run.

pub mod catalog;

pub use catalog::{CatalogEntry, CatalogError, ResourceCatalog};
