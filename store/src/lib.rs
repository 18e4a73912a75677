//! somrate Settings Store
//!
//! Persistence for the converter settings and the cached live rate.
//!
//! The store is layered: a [`KeyValueStore`] backend holds raw JSON values
//! under the keys in [`keys`], and [`SettingsStore`] maps those keys to the
//! typed [`Settings`](somrate_common::Settings) and
//! [`LiveRate`](somrate_common::LiveRate) model. Every write goes through a
//! single `set_all` call, so related keys change together.
//!
//! # Example
//!
//! ```rust,ignore
//! use somrate_store::{JsonFileStore, SettingsStore};
//!
//! let store = SettingsStore::new(Arc::new(JsonFileStore::open("somrate.json")?));
//! let settings = store.settings()?;
//! ```

pub mod backend;
pub mod error;
pub mod file;
pub mod keys;
pub mod settings_store;

pub use backend::{KeyValueStore, MemoryStore};
pub use error::{StoreError, StoreResult};
pub use file::JsonFileStore;
pub use settings_store::{SettingsStore, StoreChange};
