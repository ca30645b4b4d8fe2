//! Domain types - policies, keys, and limiter decisions.

mod decision;
mod identity;
mod policy;

pub use decision::{Backend, RateLimitDecision, WindowStatus};
pub use identity::{UNKNOWN_CLIENT, client_address, normalize_identity};
pub use policy::{MAX_WINDOW, RateLimitKey, RateLimitPolicy};
