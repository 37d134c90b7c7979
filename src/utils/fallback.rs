use std::fmt::Display;
use std::future::Future;

use tracing::warn;

/// Run `primary`; if it fails, log the failure and run `secondary` instead.
///
/// Both operations are plain futures, so `secondary` does no work unless it
/// is actually awaited. The secondary's error is returned as-is.
pub async fn or_else_try<T, E, P, S>(label: &str, primary: P, secondary: S) -> Result<T, E>
where
    P: Future<Output = Result<T, E>>,
    S: Future<Output = Result<T, E>>,
    E: Display,
{
    match primary.await {
        Ok(value) => Ok(value),
        Err(err) => {
            warn!("{} failed, trying fallback: {}", label, err);
            secondary.await
        }
    }
}
