//! Bounded retry with a fixed interval, the only waiting primitive the pipeline uses.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollPolicy {
    #[serde(with = "millis")]
    pub interval: Duration,
    #[serde(with = "millis")]
    pub timeout: Duration,
}

impl PollPolicy {
    pub const fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    pub const fn from_millis(interval: u64, timeout: u64) -> Self {
        Self::new(Duration::from_millis(interval), Duration::from_millis(timeout))
    }

    /// One probe up front, then one per elapsed interval until the timeout.
    pub fn max_attempts(&self) -> u32 {
        let interval = self.interval.as_millis().max(1);
        let steps = self.timeout.as_millis() / interval;
        u32::try_from(steps).unwrap_or(u32::MAX).saturating_add(1)
    }
}

/// Run `probe` until it yields a value or the attempts run out.
///
/// The probe gets the zero-based attempt number. Returns `None` on timeout; callers
/// map that onto their own error.
pub async fn poll_until<T, F, Fut>(policy: PollPolicy, mut probe: F) -> Option<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let attempts = policy.max_attempts();
    for attempt in 0..attempts {
        if let Some(value) = probe(attempt).await {
            return Some(value);
        }
        if attempt + 1 < attempts {
            tokio::time::sleep(policy.interval).await;
        }
    }
    None
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
