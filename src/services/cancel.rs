use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("extraction cancelled")]
pub struct Cancelled;

pub fn check(token: &CancellationToken) -> Result<(), Cancelled> {
    match token.is_cancelled() {
        true => Err(Cancelled),
        false => Ok(()),
    }
}

/// Sleeps for `duration` unless `token` is cancelled first.
pub async fn sleep(token: &CancellationToken, duration: Duration) -> Result<(), Cancelled> {
    check(token)?;
    if duration.is_zero() {
        return Ok(());
    }

    tokio::select! {
        _ = tokio::time::sleep(duration) => Ok(()),
        _ = token.cancelled() => Err(Cancelled),
    }
}
