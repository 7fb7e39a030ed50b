//! Provider client exports

pub mod mock;
pub mod traits;

#[cfg(feature = "client")]
pub mod http;

pub use mock::MockSnapshotProvider;
pub use traits::{PageRequest, SnapshotProvider};

#[cfg(feature = "client")]
pub use http::HttpSnapshotProvider;
