//! `dondeayudo` - Data layer for the Donde Ayudo crisis map
//!
//! This library fetches aid points (shelters, supply depots, help requests,
//! emergency reports) from the backend, normalizes them into one [`Point`]
//! model, and keeps a local snapshot so the map still works offline.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod admin;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod fallback;
pub mod fetch;
pub mod logging;
pub mod normalize;
pub mod point;
pub mod repository;
pub mod transform;

pub use admin::AdminClient;
pub use cache::{CacheStore, Snapshot};
pub use config::Config;
pub use error::{Error, NetworkError, Result, StorageError, TransformError};
pub use fetch::{PointSource, RemoteFetcher};
pub use logging::init_logging;
pub use normalize::{normalize_type, ColorMap};
pub use point::{Category, Point, PublicationState};
pub use repository::{DataRepository, RepositoryState};
