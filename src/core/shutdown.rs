//! # Process termination signals.
//!
//! [`wait_for_shutdown_signal`] completes when the process is asked to stop.
//! Used by [`Orchestrator::run_until_signal`](crate::Orchestrator::run_until_signal).
//!
//! - **Unix**: `SIGINT`, `SIGTERM`, `SIGQUIT`
//! - **Other platforms**: Ctrl-C via [`tokio::signal::ctrl_c`]

/// Waits for a termination signal; `Err` if the listeners cannot be installed.
#[cfg(unix)]
pub(crate) async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    let name = tokio::select! {
        _ = sigint.recv() => "SIGINT",
        _ = sigterm.recv() => "SIGTERM",
        _ = sigquit.recv() => "SIGQUIT",
    };
    tracing::info!(signal = name, "termination signal");
    Ok(())
}

/// Waits for Ctrl-C; `Err` if the listener cannot be installed.
#[cfg(not(unix))]
pub(crate) async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await?;
    tracing::info!(signal = "ctrl_c", "termination signal");
    Ok(())
}
