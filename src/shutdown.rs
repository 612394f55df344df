//! Shutdown signals for a running deck session.
//!
//! Ctrl+C and, on Unix, SIGTERM (what the menu sends when it quits) both
//! cancel the session token, so the session unwinds normally: the browser
//! is released and the final task status is written.

use std::io;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Cancel `cancel` on the first shutdown signal.
///
/// Handlers are installed before this returns; a signal sent afterwards
/// no longer terminates the process.
pub fn cancel_on_shutdown(cancel: CancellationToken) -> io::Result<()> {
    #[cfg(unix)]
    let mut terminate =
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    tokio::spawn(async move {
        #[cfg(unix)]
        let terminated = terminate.recv();

        #[cfg(not(unix))]
        let terminated = std::future::pending::<Option<()>>();

        tokio::select! {
            Ok(()) = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, cancelling session");
            },
            _ = terminated => {
                info!("Received SIGTERM, cancelling session");
            },
        }
        cancel.cancel();
    });
    Ok(())
}
