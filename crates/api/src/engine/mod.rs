//! Background engine that turns task events into persisted status changes
//! and live pushes.

pub mod router;

pub use router::{PersistRetryPolicy, StatusRouter, StatusRouterHandle};
