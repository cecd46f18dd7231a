//! Debug-capture collaborator interface.
//!
//! On step failure the pipeline offers artifacts (HTML, screenshot,
//! metadata) to a capturer. Export is gated by a sampling policy so a
//! misbehaving site cannot flood storage. The capturer is a pure
//! side-effect sink; failures to export never affect extraction.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

/// Artifacts captured from a failed extraction attempt.
#[derive(Debug, Clone)]
pub struct DebugArtifacts {
    pub url: String,
    pub step: String,
    pub html: Option<String>,
    pub screenshot: Option<Vec<u8>>,
    pub note: Option<String>,
    pub captured_at: DateTime<Utc>,
}

/// Debug capturer collaborator.
#[async_trait::async_trait]
pub trait DebugCapturer: Send + Sync {
    /// Whether this failure should be exported at all.
    fn should_export(&self, step: &str, had_result: bool, error: Option<&str>) -> bool;

    /// Persist the artifacts. Must not fail the caller.
    async fn export(&self, artifacts: DebugArtifacts);
}

/// Capturer that drops everything. The default collaborator.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCapturer;

#[async_trait::async_trait]
impl DebugCapturer for NoopCapturer {
    fn should_export(&self, _step: &str, _had_result: bool, _error: Option<&str>) -> bool {
        false
    }

    async fn export(&self, _artifacts: DebugArtifacts) {}
}

/// Rate-limited sampling gate: at most `max_per_window` exports per step
/// name within each window.
///
/// Concrete capturers can embed this to implement `should_export`.
#[derive(Debug)]
pub struct SamplingPolicy {
    max_per_window: u32,
    window: Duration,
    counters: Mutex<HashMap<String, (Instant, u32)>>,
}

impl SamplingPolicy {
    pub fn new(max_per_window: u32, window: Duration) -> Self {
        Self { max_per_window, window, counters: Mutex::new(HashMap::new()) }
    }

    /// Record one candidate export for `step`; true when under the cap.
    pub fn admit(&self, step: &str) -> bool {
        let Ok(mut counters) = self.counters.lock() else {
            return false;
        };

        let now = Instant::now();
        let entry = counters.entry(step.to_string()).or_insert((now, 0));

        if now.duration_since(entry.0) > self.window {
            *entry = (now, 0);
        }

        if entry.1 >= self.max_per_window {
            return false;
        }

        entry.1 += 1;
        true
    }
}

impl Default for SamplingPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(60 * 60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sampling_policy_caps_per_step() {
        let policy = SamplingPolicy::new(2, Duration::from_secs(3600));
        assert!(policy.admit("headless"));
        assert!(policy.admit("headless"));
        assert!(!policy.admit("headless"));

        // Independent counter per step name.
        assert!(policy.admit("static"));
    }

    #[test]
    fn test_sampling_policy_window_reset() {
        let policy = SamplingPolicy::new(1, Duration::from_millis(0));
        assert!(policy.admit("headless"));
        std::thread::sleep(Duration::from_millis(5));
        assert!(policy.admit("headless"));
    }

    #[tokio::test]
    async fn test_noop_capturer() {
        let capturer = NoopCapturer;
        assert!(!capturer.should_export("headless", false, Some("timeout")));
        capturer
            .export(DebugArtifacts {
                url: "https://example.com".to_string(),
                step: "headless".to_string(),
                html: None,
                screenshot: None,
                note: None,
                captured_at: Utc::now(),
            })
            .await;
    }
}
