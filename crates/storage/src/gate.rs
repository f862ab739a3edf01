//! Platform permission gate for restricted storage

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Storage capabilities the gate can grant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    ReadExternalStorage,
    WriteExternalStorage,
}

/// Handle for an outstanding grant request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(pub u32);

/// Poll interval and timeout for [`await_grant_result`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub timeout: Duration,
    pub interval: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            interval: Duration::from_millis(500),
        }
    }
}

/// Permission check and request surface of the host platform
#[async_trait]
pub trait StorageCapabilityGate: Send + Sync {
    /// Whether `capability` is currently granted
    async fn check_granted(&self, capability: Capability) -> bool;

    /// Ask the platform for `capability` without waiting for the answer.
    ///
    /// `None` when the request could not be issued.
    async fn request_grant(&self, capability: Capability) -> Option<RequestId>;

    /// `Some(granted)` once the platform has answered `request`
    async fn poll_result(&self, request: RequestId) -> Option<bool>;
}

/// Poll `gate` for the answer to `request` until `timeout` elapses.
///
/// Sleeps `interval` between polls. A timeout counts as a denial.
pub async fn await_grant_result(
    gate: &dyn StorageCapabilityGate,
    request: RequestId,
    timeout: Duration,
    interval: Duration,
) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(granted) = gate.poll_result(request).await {
            if granted {
                info!("permission granted for request {}", request.0);
            } else {
                warn!("permission denied for request {}", request.0);
            }
            return granted;
        }

        let now = Instant::now();
        if now >= deadline {
            warn!("permission request timed out: {}", request.0);
            return false;
        }
        tokio::time::sleep(interval.min(deadline - now)).await;
    }
}

/// Gate for platforms without restricted storage; grants everything
#[derive(Debug, Clone, Copy, Default)]
pub struct UnrestrictedGate;

#[async_trait]
impl StorageCapabilityGate for UnrestrictedGate {
    async fn check_granted(&self, _capability: Capability) -> bool {
        true
    }

    async fn request_grant(&self, _capability: Capability) -> Option<RequestId> {
        Some(RequestId(0))
    }

    async fn poll_result(&self, _request: RequestId) -> Option<bool> {
        Some(true)
    }
}

/// Make sure shared storage is readable and writable, asking if needed.
///
/// Write access implies read on the platforms this models, so only the write
/// capability is requested.
pub async fn ensure_storage_access(gate: &dyn StorageCapabilityGate, poll: &PollSettings) -> bool {
    let read = gate.check_granted(Capability::ReadExternalStorage).await;
    let write = gate.check_granted(Capability::WriteExternalStorage).await;
    if read && write {
        debug!("storage access already granted");
        return true;
    }

    info!("requesting storage access");
    match gate.request_grant(Capability::WriteExternalStorage).await {
        Some(request) => await_grant_result(gate, request, poll.timeout, poll.interval).await,
        None => {
            warn!("storage access request could not be issued");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Answers after a fixed number of polls
    struct SlowGate {
        polls: AtomicU32,
        answer_after: u32,
        answer: bool,
    }

    #[async_trait]
    impl StorageCapabilityGate for SlowGate {
        async fn check_granted(&self, _capability: Capability) -> bool {
            false
        }

        async fn request_grant(&self, _capability: Capability) -> Option<RequestId> {
            Some(RequestId(1002))
        }

        async fn poll_result(&self, _request: RequestId) -> Option<bool> {
            let n = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
            (n >= self.answer_after).then_some(self.answer)
        }
    }

    fn slow(answer_after: u32, answer: bool) -> SlowGate {
        SlowGate {
            polls: AtomicU32::new(0),
            answer_after,
            answer,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_await_returns_answer_after_polls() {
        let gate = slow(3, true);
        let started = Instant::now();

        let granted = await_grant_result(
            &gate,
            RequestId(1002),
            Duration::from_secs(5),
            Duration::from_millis(500),
        )
        .await;

        assert!(granted);
        assert_eq!(gate.polls.load(Ordering::SeqCst), 3);
        assert_eq!(started.elapsed(), Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_await_times_out_as_denial() {
        let gate = slow(u32::MAX, true);
        let started = Instant::now();

        let granted = await_grant_result(
            &gate,
            RequestId(1002),
            Duration::from_secs(5),
            Duration::from_millis(500),
        )
        .await;

        assert!(!granted);
        assert_eq!(started.elapsed(), Duration::from_secs(5));
        // initial poll plus one per interval
        assert_eq!(gate.polls.load(Ordering::SeqCst), 11);
    }

    #[tokio::test(start_paused = true)]
    async fn test_await_reports_denial() {
        let gate = slow(1, false);
        assert!(
            !await_grant_result(
                &gate,
                RequestId(7),
                Duration::from_secs(5),
                Duration::from_millis(500),
            )
            .await
        );
    }

    #[tokio::test]
    async fn test_unrestricted_gate_allows_everything() {
        let gate = UnrestrictedGate;
        assert!(gate.check_granted(Capability::WriteExternalStorage).await);
        assert!(ensure_storage_access(&gate, &PollSettings::default()).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ensure_storage_access_requests_when_missing() {
        let gate = slow(2, true);
        assert!(ensure_storage_access(&gate, &PollSettings::default()).await);
        assert_eq!(gate.polls.load(Ordering::SeqCst), 2);
    }
}
