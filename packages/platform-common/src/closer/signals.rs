//! OS signal adapter for the closer.

use std::future::Future;
use std::io;

/// Process signals that can trigger shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// SIGINT / Ctrl+C
    Interrupt,
    /// SIGTERM
    Terminate,
    /// SIGHUP
    Hangup,
    /// SIGQUIT
    Quit,
}

impl ShutdownSignal {
    /// The usual pair for services: SIGINT and SIGTERM.
    pub const DEFAULT: [ShutdownSignal; 2] = [ShutdownSignal::Interrupt, ShutdownSignal::Terminate];

    pub fn name(self) -> &'static str {
        match self {
            ShutdownSignal::Interrupt => "SIGINT",
            ShutdownSignal::Terminate => "SIGTERM",
            ShutdownSignal::Hangup => "SIGHUP",
            ShutdownSignal::Quit => "SIGQUIT",
        }
    }
}

/// Install handlers for `signals` and return a future resolving with the first one received.
///
/// Handlers are registered before this returns, so a signal delivered
/// between the call and the first poll is not lost.
#[cfg(unix)]
pub(crate) fn listen(
    signals: &[ShutdownSignal],
) -> io::Result<impl Future<Output = ShutdownSignal> + Send + 'static> {
    use futures::future::{select_all, FutureExt};
    use tokio::signal::unix::{signal, SignalKind};

    let mut streams = Vec::with_capacity(signals.len());
    for &which in signals {
        let kind = match which {
            ShutdownSignal::Interrupt => SignalKind::interrupt(),
            ShutdownSignal::Terminate => SignalKind::terminate(),
            ShutdownSignal::Hangup => SignalKind::hangup(),
            ShutdownSignal::Quit => SignalKind::quit(),
        };
        streams.push((which, signal(kind)?));
    }

    let waits = streams.into_iter().map(|(which, mut stream)| {
        async move {
            stream.recv().await;
            which
        }
        .boxed()
    });

    Ok(select_all(waits).map(|(which, _, _)| which))
}

/// Only Ctrl+C is observable off unix; every requested signal maps to it.
#[cfg(not(unix))]
pub(crate) fn listen(
    _signals: &[ShutdownSignal],
) -> io::Result<impl Future<Output = ShutdownSignal> + Send + 'static> {
    Ok(async {
        if tokio::signal::ctrl_c().await.is_err() {
            futures::future::pending::<()>().await;
        }
        ShutdownSignal::Interrupt
    })
}
