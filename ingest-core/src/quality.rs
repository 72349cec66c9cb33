//! Per-run quality tracking: processing counters, error list, and the
//! shared LLM circuit breaker.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use llm_service::CircuitBreaker;
use serde_json::{Value, json};

/// Statistics for a single processing run.
#[derive(Debug, Clone, Default)]
pub struct ProcessingStats {
    pub files_processed: u32,
    pub files_failed: u32,
    pub files_skipped: u32,
    pub symbols_processed: u32,
    pub modules_created: u32,
    pub llm_calls: u32,
    pub llm_successes: u32,
    pub llm_failures: u32,
    pub llm_tokens_used: u64,
    pub embeddings_generated: u32,
    /// `(file, error, timestamp)` triples, capped in the summary.
    pub errors: Vec<(String, String, String)>,
}

impl ProcessingStats {
    pub fn llm_success_rate(&self) -> f64 {
        if self.llm_calls == 0 {
            1.0
        } else {
            f64::from(self.llm_successes) / f64::from(self.llm_calls)
        }
    }
}

struct TrackerState {
    stats: ProcessingStats,
    current_repo: Option<String>,
    started: Option<Instant>,
    duration_seconds: f64,
}

/// Thread-safe quality tracker shared across the file workers.
pub struct QualityTracker {
    state: Mutex<TrackerState>,
    breaker: Arc<CircuitBreaker>,
}

impl Default for QualityTracker {
    fn default() -> Self {
        Self::new(Arc::new(CircuitBreaker::default()))
    }
}

impl QualityTracker {
    pub fn new(breaker: Arc<CircuitBreaker>) -> Self {
        Self {
            state: Mutex::new(TrackerState {
                stats: ProcessingStats::default(),
                current_repo: None,
                started: None,
                duration_seconds: 0.0,
            }),
            breaker,
        }
    }

    /// The breaker shared with the LLM client.
    pub fn breaker(&self) -> Arc<CircuitBreaker> {
        Arc::clone(&self.breaker)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TrackerState> {
        self.state.lock().expect("tracker mutex poisoned")
    }

    pub fn start_run(&self, repo_id: &str) {
        let mut st = self.lock();
        st.stats = ProcessingStats::default();
        st.current_repo = Some(repo_id.to_string());
        st.started = Some(Instant::now());
        st.duration_seconds = 0.0;
    }

    pub fn end_run(&self) {
        let mut st = self.lock();
        if let Some(started) = st.started {
            st.duration_seconds = started.elapsed().as_secs_f64();
        }
    }

    pub fn record_file_processed(&self) {
        self.lock().stats.files_processed += 1;
    }

    pub fn record_file_failed(&self, file_path: &str, error: &str) {
        let mut st = self.lock();
        st.stats.files_failed += 1;
        st.stats.errors.push((
            file_path.to_string(),
            error.to_string(),
            chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        ));
    }

    pub fn record_file_skipped(&self) {
        self.lock().stats.files_skipped += 1;
    }

    pub fn record_symbol_processed(&self) {
        self.lock().stats.symbols_processed += 1;
    }

    pub fn record_module_created(&self) {
        self.lock().stats.modules_created += 1;
    }

    /// Records an LLM call and mirrors the outcome into the breaker.
    pub fn record_llm_call(&self, success: bool, tokens: u32) {
        {
            let mut st = self.lock();
            st.stats.llm_calls += 1;
            st.stats.llm_tokens_used += u64::from(tokens);
            if success {
                st.stats.llm_successes += 1;
            } else {
                st.stats.llm_failures += 1;
            }
        }
        if success {
            self.breaker.record_success();
        } else {
            self.breaker.record_failure();
        }
    }

    pub fn record_embedding(&self) {
        self.lock().stats.embeddings_generated += 1;
    }

    /// Whether callers should attempt LLM calls at all.
    pub fn llm_available(&self) -> bool {
        !self.breaker.is_open()
    }

    pub fn snapshot(&self) -> ProcessingStats {
        self.lock().stats.clone()
    }

    /// Summary of the current run, shaped like the stored quality blocks.
    pub fn summary(&self) -> Value {
        let st = self.lock();
        let s = &st.stats;
        json!({
            "repo_id": st.current_repo,
            "llm_available": !self.breaker.is_open(),
            "stats": {
                "duration_seconds": (st.duration_seconds * 100.0).round() / 100.0,
                "files": {
                    "processed": s.files_processed,
                    "failed": s.files_failed,
                    "skipped": s.files_skipped,
                },
                "symbols_processed": s.symbols_processed,
                "modules_created": s.modules_created,
                "llm": {
                    "calls": s.llm_calls,
                    "successes": s.llm_successes,
                    "failures": s.llm_failures,
                    "success_rate": (s.llm_success_rate() * 1000.0).round() / 1000.0,
                    "tokens_used": s.llm_tokens_used,
                },
                "embeddings_generated": s.embeddings_generated,
                "errors": s.errors.iter().take(10).map(|(file, error, ts)| json!({
                    "file": file,
                    "error": error,
                    "timestamp": ts,
                })).collect::<Vec<_>>(),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn llm_failures_feed_the_breaker() {
        let tracker = QualityTracker::default();
        assert!(tracker.llm_available());
        for _ in 0..5 {
            tracker.record_llm_call(false, 0);
        }
        assert!(!tracker.llm_available());
        let stats = tracker.snapshot();
        assert_eq!(stats.llm_failures, 5);
        assert_eq!(stats.llm_success_rate(), 0.0);
    }

    #[test]
    fn success_rate_defaults_to_one() {
        let tracker = QualityTracker::default();
        assert_eq!(tracker.snapshot().llm_success_rate(), 1.0);
    }
}
