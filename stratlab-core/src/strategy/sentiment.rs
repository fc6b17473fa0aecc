//! Contract with the external sentiment collaborator.
//!
//! The collaborator judges a window of recent bars and returns an outlook with
//! a confidence, or fails. The core never retries: failures are reported as
//! `OracleError` and the AI-enhanced strategy falls back to its technical
//! signal.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use crossbeam_channel::{Receiver, RecvTimeoutError, SendTimeoutError, Sender};
use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Action, PriceBar};

/// Direction of the collaborator's judgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outlook {
    Bullish,
    Bearish,
    Neutral,
}

impl Outlook {
    /// Whether this outlook points against `action`.
    pub fn opposes(self, action: Action) -> bool {
        matches!(
            (self, action),
            (Self::Bearish, Action::Buy) | (Self::Bullish, Action::Sell)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub outlook: Outlook,
    /// Must lie in [0, 1].
    pub confidence: f64,
}

impl Verdict {
    pub fn new(outlook: Outlook, confidence: f64) -> Self {
        Self {
            outlook,
            confidence,
        }
    }

    /// Reject verdicts whose confidence is not a number in [0, 1].
    pub fn validated(self) -> Result<Self, OracleError> {
        if (0.0..=1.0).contains(&self.confidence) {
            Ok(self)
        } else {
            Err(OracleError::Malformed(format!(
                "confidence {} outside [0, 1]",
                self.confidence
            )))
        }
    }
}

/// Why no usable verdict came back.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OracleError {
    #[error("sentiment call timed out after {0:?}")]
    Timeout(Duration),
    #[error("sentiment service unreachable: {0}")]
    Unreachable(String),
    #[error("malformed verdict: {0}")]
    Malformed(String),
}

/// What the collaborator is asked to judge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentWindow {
    pub symbol: String,
    /// Date of the bar being decided.
    pub date: NaiveDate,
    /// Most recent bars up to and including `date`.
    pub bars: Vec<PriceBar>,
    /// The technical action awaiting confirmation.
    pub technical: Action,
}

pub trait SentimentOracle: Send + Sync {
    fn evaluate(&self, window: &SentimentWindow) -> Result<Verdict, OracleError>;
}

/// Bounds every call of the wrapped oracle by a timeout.
///
/// Calls are handed to one long-lived worker thread. A caller waits at most
/// `timeout` in total, queueing included, and then gives up; a hung
/// collaborator blocks that single worker and later calls time out in the
/// queue instead of starting new threads.
pub struct TimeoutOracle {
    requests: Option<Sender<Request>>,
    timeout: Duration,
}

struct Request {
    window: SentimentWindow,
    reply: Sender<Result<Verdict, OracleError>>,
}

impl TimeoutOracle {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

    pub fn new(inner: Arc<dyn SentimentOracle>, timeout: Duration) -> Self {
        let (tx, rx) = crossbeam_channel::bounded::<Request>(1);
        let spawned = std::thread::Builder::new()
            .name("sentiment-oracle".into())
            .spawn(move || serve(inner.as_ref(), rx));
        let requests = match spawned {
            Ok(_) => Some(tx),
            Err(e) => {
                warn!("cannot start sentiment worker: {e}");
                None
            }
        };
        Self { requests, timeout }
    }

    pub fn with_default_timeout(inner: Arc<dyn SentimentOracle>) -> Self {
        Self::new(inner, Self::DEFAULT_TIMEOUT)
    }
}

/// Worker loop; ends once the owning `TimeoutOracle` is dropped.
fn serve(inner: &dyn SentimentOracle, requests: Receiver<Request>) {
    for req in requests {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| inner.evaluate(&req.window)))
            .unwrap_or_else(|_| Err(OracleError::Unreachable("sentiment call panicked".into())));
        // Caller may have timed out already.
        let _ = req.reply.send(outcome);
    }
}

impl SentimentOracle for TimeoutOracle {
    fn evaluate(&self, window: &SentimentWindow) -> Result<Verdict, OracleError> {
        let requests = self
            .requests
            .as_ref()
            .ok_or_else(|| OracleError::Unreachable("sentiment worker not running".into()))?;
        let deadline = Instant::now() + self.timeout;
        let (reply, answer) = crossbeam_channel::bounded(1);
        let req = Request {
            window: window.clone(),
            reply,
        };

        match requests.send_deadline(req, deadline) {
            Ok(()) => {}
            Err(SendTimeoutError::Timeout(_)) => return Err(OracleError::Timeout(self.timeout)),
            Err(SendTimeoutError::Disconnected(_)) => {
                return Err(OracleError::Unreachable("sentiment worker exited".into()))
            }
        }
        match answer.recv_deadline(deadline) {
            Ok(outcome) => outcome,
            Err(RecvTimeoutError::Timeout) => Err(OracleError::Timeout(self.timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(OracleError::Unreachable(
                "oracle worker exited without answering".into(),
            )),
        }
    }
}

/// Always answers with the same verdict.
#[derive(Debug, Clone, Copy)]
pub struct StaticOracle(pub Verdict);

impl SentimentOracle for StaticOracle {
    fn evaluate(&self, _window: &SentimentWindow) -> Result<Verdict, OracleError> {
        Ok(self.0)
    }
}

/// Never answers. Stands in for a missing or down service.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableOracle;

impl SentimentOracle for UnavailableOracle {
    fn evaluate(&self, _window: &SentimentWindow) -> Result<Verdict, OracleError> {
        Err(OracleError::Unreachable("no sentiment service configured".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct SlowOracle(Duration);

    impl SentimentOracle for SlowOracle {
        fn evaluate(&self, _window: &SentimentWindow) -> Result<Verdict, OracleError> {
            std::thread::sleep(self.0);
            Ok(Verdict::new(Outlook::Bullish, 0.9))
        }
    }

    struct PanickingOracle;

    impl SentimentOracle for PanickingOracle {
        fn evaluate(&self, _window: &SentimentWindow) -> Result<Verdict, OracleError> {
            panic!("collaborator crashed");
        }
    }

    fn window() -> SentimentWindow {
        SentimentWindow {
            symbol: "0700.HK".into(),
            date: NaiveDate::from_ymd_opt(2024, 5, 6).unwrap(),
            bars: Vec::new(),
            technical: Action::Buy,
        }
    }

    #[test]
    fn opposes_only_the_opposite_direction() {
        assert!(Outlook::Bearish.opposes(Action::Buy));
        assert!(Outlook::Bullish.opposes(Action::Sell));
        assert!(!Outlook::Bullish.opposes(Action::Buy));
        assert!(!Outlook::Neutral.opposes(Action::Sell));
        assert!(!Outlook::Bearish.opposes(Action::Hold));
    }

    #[test]
    fn validated_rejects_out_of_range_confidence() {
        assert!(Verdict::new(Outlook::Bullish, 1.0).validated().is_ok());
        assert!(Verdict::new(Outlook::Bullish, 1.2).validated().is_err());
        assert!(Verdict::new(Outlook::Bearish, f64::NAN).validated().is_err());
    }

    #[test]
    fn timeout_oracle_passes_fast_answers_through() {
        let oracle = TimeoutOracle::new(
            Arc::new(StaticOracle(Verdict::new(Outlook::Neutral, 0.4))),
            Duration::from_secs(1),
        );
        assert_eq!(
            oracle.evaluate(&window()),
            Ok(Verdict::new(Outlook::Neutral, 0.4))
        );
    }

    #[test]
    fn timeout_oracle_gives_up_on_slow_collaborator() {
        let oracle = TimeoutOracle::new(
            Arc::new(SlowOracle(Duration::from_millis(500))),
            Duration::from_millis(20),
        );
        assert!(matches!(
            oracle.evaluate(&window()),
            Err(OracleError::Timeout(_))
        ));
    }

    #[test]
    fn timeout_oracle_reports_crashed_collaborator() {
        let oracle = TimeoutOracle::with_default_timeout(Arc::new(PanickingOracle));
        assert!(matches!(
            oracle.evaluate(&window()),
            Err(OracleError::Unreachable(_))
        ));
    }

    /// Blocks until `gate` closes, counting how many calls got started.
    struct GatedOracle {
        started: AtomicUsize,
        gate: Receiver<()>,
    }

    impl SentimentOracle for GatedOracle {
        fn evaluate(&self, _window: &SentimentWindow) -> Result<Verdict, OracleError> {
            self.started.fetch_add(1, Ordering::SeqCst);
            let _ = self.gate.recv();
            Ok(Verdict::new(Outlook::Bullish, 0.9))
        }
    }

    #[test]
    fn hung_collaborator_does_not_start_a_call_per_request() {
        let (open, gate) = crossbeam_channel::bounded::<()>(0);
        let inner = Arc::new(GatedOracle {
            started: AtomicUsize::new(0),
            gate,
        });
        let oracle = TimeoutOracle::new(inner.clone(), Duration::from_millis(10));

        for _ in 0..25 {
            assert!(matches!(
                oracle.evaluate(&window()),
                Err(OracleError::Timeout(_))
            ));
        }
        assert_eq!(inner.started.load(Ordering::SeqCst), 1);
        drop(open);
    }

    #[test]
    fn worker_survives_a_panicking_call() {
        struct FlakyOracle(AtomicUsize);

        impl SentimentOracle for FlakyOracle {
            fn evaluate(&self, _window: &SentimentWindow) -> Result<Verdict, OracleError> {
                if self.0.fetch_add(1, Ordering::SeqCst) == 0 {
                    panic!("first call crashes");
                }
                Ok(Verdict::new(Outlook::Neutral, 0.5))
            }
        }

        let oracle = TimeoutOracle::new(
            Arc::new(FlakyOracle(AtomicUsize::new(0))),
            Duration::from_secs(1),
        );
        assert!(matches!(
            oracle.evaluate(&window()),
            Err(OracleError::Unreachable(_))
        ));
        assert_eq!(
            oracle.evaluate(&window()),
            Ok(Verdict::new(Outlook::Neutral, 0.5))
        );
    }

    #[test]
    fn verdict_json_uses_lowercase_outlook() {
        let json = serde_json::to_string(&Verdict::new(Outlook::Bearish, 0.8)).unwrap();
        assert_eq!(json, r#"{"outlook":"bearish","confidence":0.8}"#);
    }
}
