//! The control-plane capability the scaler is written against.

use async_trait::async_trait;

use crate::error::ClientResult;
use crate::types::{App, AuthToken, ContainerFormation, Operation};

/// Remote hosting platform operations needed to scale review apps.
///
/// Implementations must be shareable across tasks; the scaler holds them
/// behind an `Arc<dyn ControlPlane>`.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Exchange a long-lived credential for a short-lived bearer token.
    async fn authenticate(&self, credential: &str, api_url: &str) -> ClientResult<AuthToken>;

    /// List every app visible to the token, in the platform's order.
    async fn list_apps(&self, token: &AuthToken) -> ClientResult<Vec<App>>;

    /// Submit a scale request. Returns the asynchronous operation when the
    /// platform hands one back, `None` when the change is already applied.
    async fn scale(
        &self,
        token: &AuthToken,
        app: &str,
        formation: &[ContainerFormation],
    ) -> ClientResult<Option<Operation>>;

    /// Fetch the current state of an operation.
    async fn refresh(&self, token: &AuthToken, operation: &Operation) -> ClientResult<Operation>;
}
