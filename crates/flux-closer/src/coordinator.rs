use crate::config::{CloserConfig, ExitSignal};
use crate::error::{CloserError, Result};
use crate::exit::{ExitHandler, ProcessExit};
use crate::guard::panic_message;
use crate::registry::{Cleanup, CleanupRegistry};
use crate::signal::SignalSet;
use crate::trigger::{Generation, Trigger, Wakeup};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Instant;
use tokio::runtime::{Handle, Runtime};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// 关闭阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownPhase {
    Waiting,
    Triggered,
    CleaningUp,
    Terminated,
}

struct State {
    config: CloserConfig,
    registry: CleanupRegistry,
    phase: ShutdownPhase,
    trigger: Option<Trigger>,
    generation: Generation,
}

struct Shared {
    /// 唯一的互斥锁，覆盖配置、注册表以及整个清理阶段
    state: Mutex<State>,
    /// 清理完成
    done: CancellationToken,
    /// 退出处理器已返回（仅测试用处理器会返回）
    terminated: CancellationToken,
    exit: Arc<dyn ExitHandler>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        // 锁中毒时状态仍然一致，继续使用
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 持锁触发当前代，保证触发期间不会被重新配置退役
    fn fire(&self, fire: impl FnOnce(&Generation)) {
        fire(&self.lock().generation);
    }

    /// 某一代的等待任务
    async fn watch(self: Arc<Self>, generation: Generation, mut signals: SignalSet) {
        debug!("Generation {} waiting for close request", generation.id());

        match generation.wait(&mut signals).await {
            Wakeup::Triggered(trigger) => {
                // 清理回调是同步的，不能阻塞运行时的其他任务
                tokio::task::block_in_place(|| self.shutdown(generation.id(), trigger));
            }
            Wakeup::Retired => {
                debug!("Generation {} retired", generation.id());
            }
        }
    }

    fn shutdown(&self, generation_id: u64, trigger: Trigger) {
        let mut state = self.lock();

        if state.phase != ShutdownPhase::Waiting {
            debug!("Ignoring {:?}, shutdown already {:?}", trigger, state.phase);
            return;
        }

        if state.generation.id() != generation_id {
            debug!(
                "Generation {} was retired, forwarding {:?} to generation {}",
                generation_id,
                trigger,
                state.generation.id()
            );
            state.generation.forward(trigger);
            return;
        }

        let code = trigger.exit_code(&state.config);
        state.phase = ShutdownPhase::Triggered;
        state.trigger = Some(trigger);
        info!("Shutdown triggered by {:?}, exit code {}", trigger, code);

        state.phase = ShutdownPhase::CleaningUp;
        let start = Instant::now();

        let registry = &mut state.registry;
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| registry.run_all())) {
            error!(
                "Cleanup panicked: {}, {} remaining cleanups skipped",
                panic_message(payload.as_ref()),
                registry.count()
            );
        }

        info!("Cleanup phase complete in {:?}", start.elapsed());
        drop(state);
        self.done.cancel();

        self.exit.exit(code);

        self.lock().phase = ShutdownPhase::Terminated;
        self.terminated.cancel();
    }
}

/// 进程生命周期协调器
///
/// 将系统信号、主动关闭、错误和 panic 统一为一次清理流程，随后以确定的退出码结束进程。
///
/// 释放 `Closer` 会停止其运行时，但 tokio 不会恢复信号的默认处理方式：
/// 此后进程将忽略曾经监听过的信号（如 SIGINT、SIGTERM）。
/// 生产环境应使用 [`crate::global`] 中的进程级实例。
pub struct Closer {
    shared: Arc<Shared>,
    handle: Handle,
    runtime: Option<Runtime>,
}

impl Closer {
    pub fn builder() -> CloserBuilder {
        CloserBuilder::new()
    }

    /// 使用给定配置创建协调器，退出时调用 `std::process::exit`
    pub fn new(config: CloserConfig) -> Result<Self> {
        Self::builder().with_config(config).build()
    }

    /// 注册清理回调，按注册的逆序执行
    ///
    /// 清理阶段开始后注册会返回 [`CloserError::ShutdownInProgress`]。
    /// 不能在清理回调内部调用。
    pub fn bind<F>(&self, cleanup: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.register(Cleanup::new(cleanup))
    }

    /// 注册带名称的清理回调
    pub fn bind_named<F>(&self, name: impl Into<String>, cleanup: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.register(Cleanup::named(name, cleanup))
    }

    fn register(&self, cleanup: Cleanup) -> Result<()> {
        let mut state = self.shared.lock();
        if state.phase != ShutdownPhase::Waiting {
            warn!("Rejecting cleanup {}: shutdown in progress", cleanup.name());
            return Err(CloserError::ShutdownInProgress);
        }
        state.registry.register(cleanup);
        Ok(())
    }

    /// 发送关闭请求，并阻塞直到清理完成
    ///
    /// 如果当前线程正在 panic 展开，则按错误关闭。
    /// 正常情况下进程会在此函数返回前后被结束，退出码为成功码。
    pub fn close(&self) {
        self.fire_close();
        self.wait_done();
    }

    /// [`Closer::close`] 的异步版本
    pub async fn close_async(&self) {
        self.fire_close();
        self.shared.done.cancelled().await;
    }

    fn fire_close(&self) {
        if thread::panicking() {
            error!("run time panic: close requested while unwinding");
            self.shared.fire(Generation::fire_error);
        } else {
            self.shared.fire(Generation::fire_close);
        }
    }

    /// 记录错误并以失败码关闭
    pub fn fatal(&self, message: impl std::fmt::Display) {
        error!("{}", message);
        self.close_with_error();
    }

    /// [`Closer::fatal`] 的异步版本
    pub async fn fatal_async(&self, message: impl std::fmt::Display) {
        error!("{}", message);
        self.close_with_error_async().await;
    }

    pub(crate) fn close_with_error(&self) {
        self.shared.fire(Generation::fire_error);
        self.wait_done();
    }

    pub(crate) async fn close_with_error_async(&self) {
        self.shared.fire(Generation::fire_error);
        self.shared.done.cancelled().await;
    }

    /// 阻塞直到进程退出
    ///
    /// 生产环境下永不返回；仅当退出处理器返回时（测试）才会返回，且一定在清理完成之后。
    pub fn hold(&self) {
        futures::executor::block_on(self.shared.terminated.cancelled());
    }

    /// [`Closer::hold`] 的异步版本
    pub async fn hold_async(&self) {
        self.shared.terminated.cancelled().await;
    }

    fn wait_done(&self) {
        futures::executor::block_on(self.shared.done.cancelled());
    }

    /// 重新配置：退役当前代，替换退出码和信号集，并启动新的一代
    ///
    /// 关闭已触发时返回 [`CloserError::ShutdownInProgress`]；
    /// 信号订阅失败时当前代保持不变。
    pub fn reconfigure(&self, mut config: CloserConfig) -> Result<()> {
        config.dedup_signals();

        let mut state = self.shared.lock();
        if state.phase != ShutdownPhase::Waiting {
            return Err(CloserError::ShutdownInProgress);
        }

        let signals = self.subscribe(&config.signals)?;
        let generation = Generation::new(state.generation.id() + 1);

        state.generation.retire();
        state.generation = generation.clone();
        state.config = config;
        self.spawn(generation.clone(), signals);

        info!(
            "Closer reconfigured, generation {} watching {:?}",
            generation.id(),
            state.config.signals
        );
        Ok(())
    }

    fn subscribe(&self, signals: &[ExitSignal]) -> Result<SignalSet> {
        let _enter = self.handle.enter();
        SignalSet::subscribe(signals)
    }

    fn spawn(&self, generation: Generation, signals: SignalSet) {
        self.handle.spawn(self.shared.clone().watch(generation, signals));
    }

    /// 当前阶段
    pub fn phase(&self) -> ShutdownPhase {
        self.shared.lock().phase
    }

    /// 生效的触发原因
    pub fn trigger(&self) -> Option<Trigger> {
        self.shared.lock().trigger
    }

    /// 当前代编号
    pub fn generation(&self) -> u64 {
        self.shared.lock().generation.id()
    }

    pub fn config(&self) -> CloserConfig {
        self.shared.lock().config.clone()
    }

    /// 已注册的清理回调数量
    pub fn cleanup_count(&self) -> usize {
        self.shared.lock().registry.count()
    }

    /// 清理是否已完成
    pub fn is_done(&self) -> bool {
        self.shared.done.is_cancelled()
    }
}

impl Drop for Closer {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

/// 关闭协调器构建器
pub struct CloserBuilder {
    config: CloserConfig,
    exit_handler: Option<Arc<dyn ExitHandler>>,
}

impl CloserBuilder {
    pub fn new() -> Self {
        Self {
            config: CloserConfig::default(),
            exit_handler: None,
        }
    }

    pub fn with_config(mut self, config: CloserConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_signals(mut self, signals: &[ExitSignal]) -> Self {
        self.config.signals = signals.to_vec();
        self
    }

    pub fn with_exit_codes(mut self, ok: i32, err: i32) -> Self {
        self.config.exit_code_ok = ok;
        self.config.exit_code_err = err;
        self
    }

    pub fn with_exit_handler(mut self, handler: Arc<dyn ExitHandler>) -> Self {
        self.exit_handler = Some(handler);
        self
    }

    pub fn build(mut self) -> Result<Closer> {
        self.config.dedup_signals();

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("flux-closer")
            .enable_all()
            .build()
            .map_err(CloserError::Runtime)?;
        let handle = runtime.handle().clone();

        let signals = {
            let _enter = handle.enter();
            SignalSet::subscribe(&self.config.signals)?
        };

        let generation = Generation::new(1);
        let exit = self
            .exit_handler
            .unwrap_or_else(|| Arc::new(ProcessExit));

        info!("Closer started, watching {:?}", self.config.signals);

        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                config: self.config,
                registry: CleanupRegistry::new(),
                phase: ShutdownPhase::Waiting,
                trigger: None,
                generation: generation.clone(),
            }),
            done: CancellationToken::new(),
            terminated: CancellationToken::new(),
            exit,
        });

        let closer = Closer {
            shared,
            handle,
            runtime: Some(runtime),
        };
        closer.spawn(generation, signals);
        Ok(closer)
    }
}

impl Default for CloserBuilder {
    fn default() -> Self {
        Self::new()
    }
}
