//! Shared state between the server thread and readers.

mod shared;

pub use shared::{SharedSkeleton, create_shared_skeleton};
