//! 进程级单例
//!
//! 生产环境通常只需要一个 [`Closer`]；这里提供惰性创建的全局实例以及对应的便捷函数。

use std::fmt::Display;
use std::sync::OnceLock;

use crate::config::CloserConfig;
use crate::coordinator::Closer;
use crate::error::Result;

static GLOBAL: OnceLock<Closer> = OnceLock::new();

/// 获取全局协调器，首次调用时使用默认配置创建
pub fn global() -> Result<&'static Closer> {
    if let Some(closer) = GLOBAL.get() {
        return Ok(closer);
    }
    let closer = Closer::new(CloserConfig::default())?;
    // 并发初始化时落选的实例会被丢弃
    Ok(GLOBAL.get_or_init(|| closer))
}

/// 覆盖默认配置；全局实例已存在时重新配置
pub fn init(config: CloserConfig) -> Result<&'static Closer> {
    if let Some(closer) = GLOBAL.get() {
        closer.reconfigure(config)?;
        return Ok(closer);
    }
    let closer = Closer::new(config.clone())?;
    let installed = GLOBAL.get_or_init(|| closer);
    if installed.config() != config {
        installed.reconfigure(config)?;
    }
    Ok(installed)
}

/// 注册清理回调
pub fn bind<F>(cleanup: F) -> Result<()>
where
    F: FnOnce() + Send + 'static,
{
    global()?.bind(cleanup)
}

/// 发送关闭请求并阻塞直到清理完成
pub fn close() -> Result<()> {
    global()?.close();
    Ok(())
}

/// 记录错误并以失败码关闭
pub fn fatal(message: impl Display) -> Result<()> {
    global()?.fatal(message);
    Ok(())
}

/// 运行入口函数，错误或 panic 时以失败码关闭
pub fn run_guarded<F, E>(entry: F, logging: bool) -> Result<()>
where
    F: FnOnce() -> std::result::Result<(), E>,
    E: Display,
{
    global()?.run_guarded(entry, logging);
    Ok(())
}

/// 阻塞直到进程退出
pub fn hold() -> Result<()> {
    global()?.hold();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExitSignal;

    // 只验证单例与重新配置，不触发关闭（全局实例会真正退出进程）
    #[test]
    fn test_global_is_singleton_and_init_reconfigures() {
        let first = global().unwrap();
        let second = global().unwrap();
        assert!(std::ptr::eq(first, second));

        let generation = first.generation();
        let config = CloserConfig {
            exit_code_ok: 0,
            exit_code_err: 2,
            signals: ExitSignal::DEBUG_SET.to_vec(),
        };
        let installed = init(config.clone()).unwrap();

        assert!(std::ptr::eq(first, installed));
        assert_eq!(installed.config(), config);
        assert_eq!(installed.generation(), generation + 1);
    }
}
