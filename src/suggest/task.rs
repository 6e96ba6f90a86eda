//! Spawned suggestion requests
//!
//! Hands the caller a handle that reads Pending immediately and settles to
//! the terminal outcome exactly once. There is no cancellation: dropping the
//! handle abandons interest, the request itself runs to completion.

use chrono::{DateTime, Utc};
use futures::FutureExt;
use log::{error, info};
use std::panic::AssertUnwindSafe;
use tokio::sync::watch;
use uuid::Uuid;

use super::{
    RequestOutcome, SuggestionRequest, SuggestionRequester, SuggestionResult,
    FEEDBACK_UNAVAILABLE, GRADE_UNAVAILABLE,
};

/// Observer side of one in-flight suggestion request
#[derive(Debug, Clone)]
pub struct SuggestionHandle {
    id: Uuid,
    started_at: DateTime<Utc>,
    rx: watch::Receiver<RequestOutcome>,
}

impl SuggestionHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Snapshot of the current outcome without waiting
    pub fn outcome(&self) -> RequestOutcome {
        self.rx.borrow().clone()
    }

    pub fn is_terminal(&self) -> bool {
        self.rx.borrow().is_terminal()
    }

    /// Wait until the outcome settles, then return it
    pub async fn wait(&mut self) -> RequestOutcome {
        loop {
            {
                let current = self.rx.borrow_and_update();
                if current.is_terminal() {
                    return current.clone();
                }
            }
            if self.rx.changed().await.is_err() {
                // Task dropped without settling (runtime shutdown); report
                // whatever we last saw rather than inventing a terminal state.
                return self.rx.borrow().clone();
            }
        }
    }
}

/// Start a request in the background and hand back its handle.
/// Every spawn gets a fresh outcome channel; settled outcomes are never reused.
pub fn spawn_suggestion(
    requester: SuggestionRequester,
    request: SuggestionRequest,
) -> SuggestionHandle {
    let (tx, rx) = watch::channel(RequestOutcome::Pending);
    let id = Uuid::new_v4();
    let started_at = Utc::now();
    info!("suggestion request {} started", id);

    tokio::spawn(async move {
        let fut = async move { requester.request_suggestion(&request).await };
        let outcome = match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(panic) => {
                let detail = if let Some(s) = panic.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "unknown panic payload".to_string()
                };
                error!("suggestion task {} crashed unexpectedly: {}", id, detail);
                RequestOutcome::Failed {
                    reason: format!("suggestion task crashed: {}", detail),
                    result: SuggestionResult::new(GRADE_UNAVAILABLE, FEEDBACK_UNAVAILABLE),
                }
            }
        };
        let disposition = match &outcome {
            RequestOutcome::Succeeded(_) => "succeeded",
            _ => "failed",
        };
        info!(
            "suggestion request {} {} after {}ms",
            id,
            disposition,
            (Utc::now() - started_at).num_milliseconds()
        );
        // If the handle was dropped, nobody is listening for the outcome.
        let _ = tx.send(outcome);
    });

    SuggestionHandle { id, started_at, rx }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suggest::payload::GenerateContentRequest;
    use crate::suggest::{SuggestionTransport, TransportError};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct FixedReply(String);

    #[async_trait]
    impl SuggestionTransport for FixedReply {
        async fn deliver(&self, _body: &GenerateContentRequest) -> Result<String, TransportError> {
            Ok(self.0.clone())
        }
    }

    struct PanickingTransport;

    #[async_trait]
    impl SuggestionTransport for PanickingTransport {
        async fn deliver(&self, _body: &GenerateContentRequest) -> Result<String, TransportError> {
            panic!("boom");
        }
    }

    fn requester_with_reply(text: &str) -> SuggestionRequester {
        let raw = serde_json::json!({
            "candidates": [{ "content": { "parts": [{ "text": text }] } }]
        })
        .to_string();
        SuggestionRequester::with_transport(Arc::new(FixedReply(raw)))
    }

    fn request() -> SuggestionRequest {
        SuggestionRequest::new("Q", "S")
    }

    #[tokio::test]
    async fn test_handle_reads_pending_before_settling() {
        let requester = requester_with_reply(r#"{"grade":"A","feedback":"Nice."}"#);
        let mut handle = spawn_suggestion(requester, request());

        // The spawned task has not had a chance to run yet
        assert_eq!(handle.outcome(), RequestOutcome::Pending);
        assert!(!handle.is_terminal());

        let outcome = handle.wait().await;
        assert_eq!(
            outcome,
            RequestOutcome::Succeeded(SuggestionResult::new("A", "Nice."))
        );
        assert!(handle.is_terminal());
    }

    #[tokio::test]
    async fn test_settled_outcome_does_not_change() {
        let requester = requester_with_reply(r#"{"grade":"A","feedback":"Nice."}"#);
        let mut handle = spawn_suggestion(requester, request());

        let first = handle.wait().await;
        let second = handle.wait().await;
        assert_eq!(first, second);
        assert_eq!(handle.outcome(), first);
    }

    #[tokio::test]
    async fn test_each_spawn_gets_a_fresh_outcome() {
        let requester = requester_with_reply(r#"{"grade":"A","feedback":"Nice."}"#);
        let mut first = spawn_suggestion(requester.clone(), request());
        let mut second = spawn_suggestion(requester, request());

        assert_ne!(first.id(), second.id());
        // Independent channels that settle to equal content
        assert_eq!(first.wait().await, second.wait().await);
    }

    #[tokio::test]
    async fn test_panicking_request_settles_as_failed() {
        let requester = SuggestionRequester::with_transport(Arc::new(PanickingTransport));
        let mut handle = spawn_suggestion(requester, request());

        let outcome = handle.wait().await;
        match outcome {
            RequestOutcome::Failed { reason, result } => {
                assert!(reason.contains("boom"));
                assert_eq!(result.grade, GRADE_UNAVAILABLE);
                assert_eq!(result.feedback, FEEDBACK_UNAVAILABLE);
            }
            other => panic!("expected Failed, got {:?}", other),
        }
    }
}
