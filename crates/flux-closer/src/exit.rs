use tracing::info;

/// 进程退出接口
///
/// 生产环境使用 [`ProcessExit`]；测试中可以替换为记录退出码的实现。
pub trait ExitHandler: Send + Sync {
    fn exit(&self, code: i32);
}

/// 调用 `std::process::exit` 结束进程
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessExit;

impl ExitHandler for ProcessExit {
    fn exit(&self, code: i32) {
        info!("Exiting process with code {}", code);
        std::process::exit(code);
    }
}
