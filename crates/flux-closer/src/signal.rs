use futures::future::select_all;
use std::future::pending;
use tracing::{debug, info, warn};

use crate::config::ExitSignal;
use crate::error::{CloserError, Result};

#[cfg(unix)]
use tokio::signal::unix::{signal, Signal, SignalKind};

#[cfg(unix)]
impl ExitSignal {
    fn kind(self) -> SignalKind {
        match self {
            ExitSignal::Interrupt => SignalKind::interrupt(),
            ExitSignal::Hangup => SignalKind::hangup(),
            ExitSignal::Terminate => SignalKind::terminate(),
            // SIGABRT
            ExitSignal::Abort => SignalKind::from_raw(6),
            ExitSignal::Quit => SignalKind::quit(),
            ExitSignal::User1 => SignalKind::user_defined1(),
            ExitSignal::User2 => SignalKind::user_defined2(),
        }
    }
}

/// 单个代（generation）订阅的系统信号集合
///
/// 必须在 tokio 运行时上下文中创建。
pub struct SignalSet {
    #[cfg(unix)]
    streams: Vec<(ExitSignal, Signal)>,
    #[cfg(not(unix))]
    ctrl_c: bool,
}

impl SignalSet {
    /// 订阅给定的信号
    #[cfg(unix)]
    pub fn subscribe(signals: &[ExitSignal]) -> Result<Self> {
        let mut streams = Vec::with_capacity(signals.len());
        for &exit_signal in signals {
            let stream = signal(exit_signal.kind()).map_err(|source| CloserError::Signal {
                signal: exit_signal,
                source,
            })?;
            debug!("Subscribed to {}", exit_signal);
            streams.push((exit_signal, stream));
        }
        Ok(Self { streams })
    }

    /// 订阅给定的信号（非 unix 平台仅支持 Ctrl+C）
    #[cfg(not(unix))]
    pub fn subscribe(signals: &[ExitSignal]) -> Result<Self> {
        let mut ctrl_c = false;
        for &exit_signal in signals {
            if exit_signal == ExitSignal::Interrupt {
                ctrl_c = true;
            } else {
                warn!("{} is not supported on this platform, ignoring", exit_signal);
            }
        }
        Ok(Self { ctrl_c })
    }

    /// 等待任意一个信号；信号集为空时永远挂起
    #[cfg(unix)]
    pub async fn recv(&mut self) -> ExitSignal {
        if self.streams.is_empty() {
            return pending().await;
        }

        let waiters = self.streams.iter_mut().map(|(exit_signal, stream)| {
            let exit_signal = *exit_signal;
            Box::pin(async move { stream.recv().await.map(|_| exit_signal) })
        });

        match select_all(waiters).await {
            (Some(exit_signal), _, _) => {
                info!("Received {}", exit_signal);
                exit_signal
            }
            (None, _, _) => {
                warn!("Signal driver shut down, no longer watching signals");
                pending().await
            }
        }
    }

    #[cfg(not(unix))]
    pub async fn recv(&mut self) -> ExitSignal {
        if !self.ctrl_c {
            return pending().await;
        }
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C");
                ExitSignal::Interrupt
            }
            Err(e) => {
                warn!("Failed to listen for Ctrl+C: {}", e);
                pending().await
            }
        }
    }

    /// 订阅的信号数量
    pub fn len(&self) -> usize {
        #[cfg(unix)]
        {
            self.streams.len()
        }
        #[cfg(not(unix))]
        {
            usize::from(self.ctrl_c)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_empty_set_never_fires() {
        let mut set = SignalSet::subscribe(&[]).unwrap();
        assert!(set.is_empty());

        let waited = tokio::time::timeout(Duration::from_millis(50), set.recv()).await;
        assert!(waited.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_subscribe_default_set() {
        let set = SignalSet::subscribe(ExitSignal::DEFAULT_SET).unwrap();
        assert_eq!(set.len(), ExitSignal::DEFAULT_SET.len());
    }
}
