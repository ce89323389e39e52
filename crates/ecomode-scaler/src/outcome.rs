//! Classification of scale submission results.
//!
//! The platform answers some scale requests with errors that only mean
//! "nothing to do" or "try again later". They are sorted here, once, into a
//! closed set of outcomes instead of being matched ad hoc at call sites.

use ecomode_client::{ClientError, ClientResult, Operation};

/// Message the platform returns when the formation is already applied.
pub const NO_CHANGE_MESSAGE: &str = "no change in containers formation";

/// HTTP status used by the platform for apps that cannot be scaled yet
/// (booting, deploying, already scaling).
pub const NOT_READY_STATUS: u16 = 422;

/// What a scale submission amounted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScaleOutcome {
    /// Accepted; carries the operation to poll when there is one.
    Success(Option<Operation>),
    /// The app already runs the requested formation.
    BenignNoop,
    /// The app cannot be scaled right now; the next cycle will retry.
    BenignNotReady(String),
    /// Anything else.
    Fatal(String),
}

/// Sort a raw submission result into a [`ScaleOutcome`].
pub fn classify(result: ClientResult<Option<Operation>>) -> ScaleOutcome {
    match result {
        Ok(operation) => ScaleOutcome::Success(operation),
        Err(ClientError::Api { status, message }) => {
            if message.to_lowercase().contains("no change") {
                ScaleOutcome::BenignNoop
            } else if status == NOT_READY_STATUS {
                ScaleOutcome::BenignNotReady(format!("status {status}: {message}"))
            } else {
                ScaleOutcome::Fatal(format!("status {status}: {message}"))
            }
        }
        Err(other) => ScaleOutcome::Fatal(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: u16, message: &str) -> ClientResult<Option<Operation>> {
        Err(ClientError::Api {
            status,
            message: message.to_string(),
        })
    }

    #[test]
    fn accepted_submission_is_success() {
        let op = Operation::pending("https://api.example/op");
        assert_eq!(
            classify(Ok(Some(op.clone()))),
            ScaleOutcome::Success(Some(op))
        );
        assert_eq!(classify(Ok(None)), ScaleOutcome::Success(None));
    }

    #[test]
    fn unchanged_formation_is_benign_noop() {
        let outcome = classify(api(422, NO_CHANGE_MESSAGE));
        assert_eq!(outcome, ScaleOutcome::BenignNoop);
    }

    #[test]
    fn other_422_is_benign_not_ready() {
        let outcome = classify(api(422, "app is not ready to be scaled"));
        assert!(matches!(outcome, ScaleOutcome::BenignNotReady(ref d) if d.contains("not ready")));
    }

    #[test]
    fn unexpected_status_is_fatal() {
        let outcome = classify(api(500, "internal error"));
        assert_eq!(
            outcome,
            ScaleOutcome::Fatal("status 500: internal error".to_string())
        );
    }

    #[test]
    fn transport_errors_are_fatal() {
        let outcome = classify(Err(ClientError::Transport("connection reset".to_string())));
        assert!(matches!(outcome, ScaleOutcome::Fatal(ref d) if d.contains("connection reset")));
    }
}
