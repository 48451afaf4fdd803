//! Ctrl-C handling
//!
//! The first interrupt cancels the running build: the step in progress
//! finishes and nothing new starts. A second interrupt exits at once.

use crate::runner::CancellationToken;
use std::process;
use std::sync::mpsc;
use std::thread;
use tracing::{debug, warn};

/// Exit code used when a second interrupt arrives
const FORCED_EXIT: i32 = 130;

/// Cancel `token` when the process is interrupted
///
/// Listens on a background thread with its own tokio runtime and returns
/// once the handler is in place.
pub fn cancel_on_interrupt(token: CancellationToken) {
    let (ready_tx, ready_rx) = mpsc::channel();

    let spawned = thread::Builder::new()
        .name("rant-interrupt".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    warn!(error = %e, "cannot listen for Ctrl-C");
                    let _ = ready_tx.send(());
                    return;
                }
            };
            runtime.block_on(listen(token, ready_tx));
        });

    match spawned {
        Ok(_) => {
            let _ = ready_rx.recv();
        }
        Err(e) => warn!(error = %e, "cannot listen for Ctrl-C"),
    }
}

#[cfg(unix)]
async fn listen(token: CancellationToken, ready: mpsc::Sender<()>) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupts = match signal(SignalKind::interrupt()) {
        Ok(interrupts) => interrupts,
        Err(e) => {
            warn!(error = %e, "cannot listen for Ctrl-C");
            let _ = ready.send(());
            return;
        }
    };
    let _ = ready.send(());
    debug!("interrupt handler installed");

    if interrupts.recv().await.is_some() {
        warn!("interrupted, stopping after the current step");
        token.cancel();
    }
    if interrupts.recv().await.is_some() {
        process::exit(FORCED_EXIT);
    }
}

#[cfg(not(unix))]
async fn listen(token: CancellationToken, ready: mpsc::Sender<()>) {
    let _ = ready.send(());

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for Ctrl-C");
        return;
    }
    warn!("interrupted, stopping after the current step");
    token.cancel();

    if tokio::signal::ctrl_c().await.is_ok() {
        process::exit(FORCED_EXIT);
    }
}
