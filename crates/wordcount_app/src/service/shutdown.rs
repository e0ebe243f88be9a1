use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use wordcount_logging::{wc_info, wc_warn};

/// Cancels `cancel` on Ctrl-C or SIGTERM. The task ends early if the token is
/// cancelled by someone else.
pub(crate) fn spawn_signal_listener(cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            signal = wait_for_signal() => {
                wc_info!("received {}; stopping after the current record", signal);
                cancel.cancel();
            }
            _ = cancel.cancelled() => {}
        }
    })
}

#[cfg(unix)]
async fn wait_for_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(err) => {
            wc_warn!("cannot listen for SIGTERM, only Ctrl-C will stop the service: {}", err);
            return ctrl_c().await;
        }
    };
    tokio::select! {
        name = ctrl_c() => name,
        _ = terminate.recv() => "SIGTERM",
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> &'static str {
    ctrl_c().await
}

async fn ctrl_c() -> &'static str {
    if let Err(err) = tokio::signal::ctrl_c().await {
        wc_warn!("cannot listen for Ctrl-C: {}", err);
        // Without a signal source the service runs until the pipeline stops itself.
        std::future::pending::<()>().await;
    }
    "Ctrl-C"
}
