//! Repository access
//!
//! - `endpoint` - the transport seam and the built-in directory transport
//! - `local` - the on-disk artifact cache
//! - `client` - cache-first lookup across ranked endpoints

mod client;
mod endpoint;
mod local;

pub use client::{RepositoryClient, RepositoryError};
pub use endpoint::{DirectoryEndpoint, EndpointError, RepositoryEndpoint};
pub use local::{CacheEntryMeta, CachedEntry, EntryLock, LocalCache};
