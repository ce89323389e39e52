//! Scaler error types.

use ecomode_client::ClientError;
use thiserror::Error;

/// Errors that escape a scale or fleet operation.
///
/// Benign platform answers never become a `ScaleError`; see
/// [`crate::outcome::classify`].
#[derive(Debug, Error)]
pub enum ScaleError {
    #[error("could not open control-plane session: {0}")]
    Session(#[source] ClientError),

    #[error("could not list apps: {0}")]
    Fleet(#[source] ClientError),

    #[error("failed to scale {app}: {detail}")]
    Submission { app: String, detail: String },

    #[error("scale task for {app} did not complete: {detail}")]
    Task { app: String, detail: String },
}

pub type ScaleResult<T> = Result<T, ScaleError>;
