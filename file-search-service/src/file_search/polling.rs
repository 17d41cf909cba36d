//! Polling for long-running upload operations.

use std::future::Future;

use tokio::time::Instant;
use tracing::debug;

use super::error::FileSearchError;
use super::options::PollOptions;
use super::responses::Operation;

/// Anything that can fetch the current state of an operation by name
pub trait OperationSource {
    fn get_operation(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Operation, FileSearchError>> + Send;
}

/// Poll `name` until it is done, failed, or `options.timeout` elapses.
///
/// A fetch error aborts polling immediately.
pub async fn poll_operation<S>(
    source: &S,
    name: &str,
    options: PollOptions,
) -> Result<Operation, FileSearchError>
where
    S: OperationSource + Sync,
{
    let start = Instant::now();
    let mut attempts: u32 = 0;

    while start.elapsed() < options.timeout {
        attempts += 1;
        let operation = source.get_operation(name).await?;

        if operation.done {
            if let Some(message) = operation.failure_message() {
                metrics::counter!("file_search_operation_polls_total", "outcome" => "failed")
                    .increment(1);
                return Err(FileSearchError::OperationFailed {
                    code: operation.error.as_ref().map(|e| e.code),
                    message,
                });
            }
            metrics::counter!("file_search_operation_polls_total", "outcome" => "done")
                .increment(1);
            debug!(operation = %name, attempts, "Operation complete");
            return Ok(operation);
        }

        debug!(operation = %name, attempts, "Operation pending");
        tokio::time::sleep(options.interval).await;
    }

    metrics::counter!("file_search_operation_polls_total", "outcome" => "timed_out").increment(1);
    Err(FileSearchError::OperationTimedOut {
        name: name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    use crate::file_search::responses::OperationError;

    enum Step {
        Pending,
        Done,
        Failed(&'static str),
        Unavailable,
    }

    struct ScriptedSource {
        steps: Mutex<VecDeque<Step>>,
        calls: Mutex<u32>,
    }

    impl ScriptedSource {
        fn new(steps: Vec<Step>) -> Self {
            Self {
                steps: Mutex::new(steps.into()),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    impl OperationSource for ScriptedSource {
        async fn get_operation(&self, name: &str) -> Result<Operation, FileSearchError> {
            *self.calls.lock().unwrap() += 1;
            let step = self.steps.lock().unwrap().pop_front().unwrap_or(Step::Pending);
            let mut operation = Operation {
                name: name.to_string(),
                done: false,
                metadata: None,
                error: None,
                response: None,
            };
            match step {
                Step::Pending => {}
                Step::Done => {
                    operation.done = true;
                    operation.response = Some(serde_json::json!({ "documentName": "d" }));
                }
                Step::Failed(message) => {
                    operation.done = true;
                    operation.error = Some(OperationError {
                        code: 13,
                        message: message.to_string(),
                        details: None,
                    });
                }
                Step::Unavailable => {
                    return Err(FileSearchError::Api {
                        status: 503,
                        message: "unavailable".to_string(),
                    });
                }
            }
            Ok(operation)
        }
    }

    fn fast() -> PollOptions {
        PollOptions {
            interval: Duration::from_secs(2),
            timeout: Duration::from_secs(10),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn returns_when_done() {
        let source = ScriptedSource::new(vec![Step::Pending, Step::Pending, Step::Done]);
        let operation = poll_operation(&source, "ops/1", fast()).await.unwrap();
        assert!(operation.done);
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn done_with_error_fails() {
        let source = ScriptedSource::new(vec![Step::Pending, Step::Failed("unsupported file")]);
        let err = poll_operation(&source, "ops/1", fast()).await.unwrap_err();
        match err {
            FileSearchError::OperationFailed { code, message } => {
                assert_eq!(code, Some(13));
                assert_eq!(message, "unsupported file");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_after_deadline() {
        let source = ScriptedSource::new(vec![]);
        let start = Instant::now();
        let err = poll_operation(&source, "ops/slow", fast()).await.unwrap_err();
        assert!(matches!(err, FileSearchError::OperationTimedOut { ref name } if name == "ops/slow"));
        // Polls at t = 0, 2, 4, 6, 8
        assert_eq!(source.calls(), 5);
        assert!(start.elapsed() >= Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_errors_abort_polling() {
        let source = ScriptedSource::new(vec![Step::Pending, Step::Unavailable, Step::Done]);
        let err = poll_operation(&source, "ops/1", fast()).await.unwrap_err();
        assert!(matches!(err, FileSearchError::Api { status: 503, .. }));
        assert_eq!(source.calls(), 2);
    }
}
