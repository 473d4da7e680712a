//! Business logic services
//!
//! The lookup orchestrator is the only service this application has: it sits
//! between the web boundary and the cache store / decoder client.

pub mod lookup;

pub use lookup::{LookupResult, LookupService};
