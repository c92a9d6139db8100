//! Deadlines for collaborator calls.
//!
//! Every call into the credential store, revocation cache or mailer goes
//! through [`bounded`]. An elapsed deadline is an error, never an empty
//! answer: a blacklist lookup that times out must not read as "not revoked".

use std::future::Future;
use std::time::Duration;

use crate::{Result, WardenError};

/// Run `fut` with a deadline, mapping expiry to [`WardenError::Timeout`].
pub async fn bounded<T, F>(limit: Duration, what: &'static str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(call = what, limit_ms = limit.as_millis() as u64, "Collaborator call timed out");
            Err(WardenError::Timeout(what))
        }
    }
}
