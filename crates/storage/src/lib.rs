//! Object store interface for record segments and cooked outputs.
//!
//! Remote tiers are addressed by flat string keys (`1234.ogg.data`,
//! `1234.zip`). The [`ObjectStore`] trait is deliberately narrow: list by
//! prefix, fetch, upload local files, delete.

pub mod backend;
pub mod error;
mod key;

pub use crate::backend::ObjectStore;
pub use crate::key::validate as validate_key;
use std::sync::Arc;

pub type StoreHandle = Arc<dyn ObjectStore + Send + Sync>;
