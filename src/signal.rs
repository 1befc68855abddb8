/// Resolves once the process is asked to stop, returns the name of the
/// signal received.
#[cfg(unix)]
pub async fn shutdown() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    let name = tokio::select! {
        _ = sigint.recv() => "SIGINT",
        _ = sigterm.recv() => "SIGTERM",
    };

    info!(message = "Signal received", signal = name);

    Ok(name)
}

#[cfg(not(unix))]
pub async fn shutdown() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;

    info!(message = "Signal received", signal = "ctrl-c");

    Ok("ctrl-c")
}
