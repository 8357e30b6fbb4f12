use chrono::{DateTime, Utc};

/// Time source port (C1). Every place the coordinator needs "now" goes
/// through this trait instead of calling `Utc::now()` directly, so tests can
/// freeze time and assert on deterministic routing and TTL behavior.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
pub struct FrozenClock(pub DateTime<Utc>);

#[cfg(test)]
impl Clock for FrozenClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
