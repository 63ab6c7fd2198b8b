use std::io;

use tokio::signal;

#[cfg(target_family = "windows")]
pub async fn terminate() -> io::Result<()> {
    signal::ctrl_c().await
}

/// 等待 SIGINT 或 SIGTERM，任一到达即返回
#[cfg(target_family = "unix")]
pub async fn terminate() -> io::Result<()> {
    use signal::unix::{signal, SignalKind};

    let mut term = signal(SignalKind::terminate())?;
    let mut int = signal(SignalKind::interrupt())?;
    tokio::select! {
        _ = term.recv() => Ok(()),
        _ = int.recv() => Ok(()),
    }
}
