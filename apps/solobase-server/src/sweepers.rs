//! Background maintenance tasks spawned alongside the accept loop: expired
//! upload/download tokens, expired quota reservations, and the blob reaper's
//! orphan sweep all run on their own interval rather than inline with
//! request handling (spec §5).

use std::time::Duration;

use solobase_storage::{BlobReaper, QuotaAccountant, TokenService};
use tracing::{error, info};

const TOKEN_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
const RESERVATION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
const BLOB_REAP_INTERVAL: Duration = Duration::from_secs(300);

/// Spawn the token, reservation, and blob-reaper sweepers as detached
/// background tasks. They run for the lifetime of the process; the accept
/// loop's graceful shutdown does not wait on them.
pub fn spawn(quota: QuotaAccountant, tokens: TokenService, reaper: BlobReaper) {
    tokio::spawn(sweep_tokens(tokens));
    tokio::spawn(sweep_reservations(quota));
    tokio::spawn(sweep_blobs(reaper));
}

async fn sweep_tokens(tokens: TokenService) {
    let mut ticker = tokio::time::interval(TOKEN_SWEEP_INTERVAL);
    loop {
        ticker.tick().await;
        match tokens.sweep_expired().await {
            Ok(count) if count > 0 => info!(count, "swept expired upload/download tokens"),
            Ok(_) => {}
            Err(e) => error!(error = %e, "token sweep failed"),
        }
    }
}

async fn sweep_reservations(quota: QuotaAccountant) {
    let mut ticker = tokio::time::interval(RESERVATION_SWEEP_INTERVAL);
    loop {
        ticker.tick().await;
        match quota.sweep_expired().await {
            Ok(count) if count > 0 => info!(count, "released expired quota reservations"),
            Ok(_) => {}
            Err(e) => error!(error = %e, "reservation sweep failed"),
        }
    }
}

async fn sweep_blobs(reaper: BlobReaper) {
    let mut ticker = tokio::time::interval(BLOB_REAP_INTERVAL);
    loop {
        ticker.tick().await;
        match reaper.sweep().await {
            Ok(stats) => info!(?stats, "blob reaper sweep complete"),
            Err(e) => error!(error = %e, "blob reaper sweep failed"),
        }
    }
}
