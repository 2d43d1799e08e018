pub mod lifecycle;
pub mod ordering;

pub use lifecycle::{lifecycle_middleware, LifecycleHost, X_REQUEST_ID};
pub use ordering::OrderingGate;
