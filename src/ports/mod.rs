//! Narrow external ports the core depends on: a clock, a KV/cache store, and
//! a transport-agnostic tool-invocation client. Production wiring supplies
//! real adapters (system clock, Redis, HTTP); tests supply fakes so the
//! coordinator's logic is exercised without any network access.

pub mod clock;
pub mod kv;
pub mod tool;

pub use clock::{Clock, SystemClock};
pub use kv::{InMemoryKv, KvStore, RedisKv};
pub use tool::{HttpToolClient, ToolInvocationPort};
