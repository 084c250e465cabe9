use tokio_util::sync::CancellationToken;

use crate::config::{CloserConfig, ExitSignal};
use crate::signal::SignalSet;

/// 触发关闭的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// 收到系统信号
    Signal(ExitSignal),

    /// 主动关闭
    Close,

    /// 错误、panic 或 fatal
    Error,
}

impl Trigger {
    /// 解析退出码：只有错误触发使用失败码
    pub fn exit_code(self, config: &CloserConfig) -> i32 {
        match self {
            Trigger::Signal(_) | Trigger::Close => config.exit_code_ok,
            Trigger::Error => config.exit_code_err,
        }
    }
}

/// 单个代的触发通道
///
/// 每个通道只会触发一次，重复触发会被忽略。
#[derive(Debug, Clone)]
pub struct Generation {
    id: u64,
    close: CancellationToken,
    error: CancellationToken,
    retire: CancellationToken,
}

/// 等待任务观察到的事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wakeup {
    Triggered(Trigger),
    Retired,
}

impl Generation {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            close: CancellationToken::new(),
            error: CancellationToken::new(),
            retire: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn fire_close(&self) {
        self.close.cancel();
    }

    pub fn fire_error(&self) {
        self.error.cancel();
    }

    /// 退役当前代（重新配置时使用）
    pub fn retire(&self) {
        self.retire.cancel();
    }

    pub fn is_retired(&self) -> bool {
        self.retire.is_cancelled()
    }

    /// 把已观察到的触发转发到本代；信号按主动关闭处理（退出码相同）
    pub fn forward(&self, trigger: Trigger) {
        match trigger {
            Trigger::Signal(_) | Trigger::Close => self.fire_close(),
            Trigger::Error => self.fire_error(),
        }
    }

    /// 等待错误、主动关闭、系统信号或退役
    ///
    /// 触发优先于退役，避免重新配置吞掉已经发出的关闭请求。
    pub async fn wait(&self, signals: &mut SignalSet) -> Wakeup {
        tokio::select! {
            biased;
            _ = self.error.cancelled() => Wakeup::Triggered(Trigger::Error),
            _ = self.close.cancelled() => Wakeup::Triggered(Trigger::Close),
            exit_signal = signals.recv() => Wakeup::Triggered(Trigger::Signal(exit_signal)),
            _ = self.retire.cancelled() => Wakeup::Retired,
        }
    }
}
