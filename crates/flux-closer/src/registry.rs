use tracing::{debug, info};

type CleanupFn = Box<dyn FnOnce() + Send + 'static>;

/// 清理回调
pub struct Cleanup {
    name: Option<String>,
    func: CleanupFn,
}

impl Cleanup {
    pub fn new<F>(func: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            name: None,
            func: Box::new(func),
        }
    }

    pub fn named<F>(name: impl Into<String>, func: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            name: Some(name.into()),
            func: Box::new(func),
        }
    }

    /// 回调名称
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("<anonymous>")
    }
}

/// 清理回调注册表
///
/// 按注册顺序保存，执行时逆序调用（与 `defer` 相同）。
/// 调用方负责加锁，注册表本身不做同步。
#[derive(Default)]
pub struct CleanupRegistry {
    cleanups: Vec<Cleanup>,
}

impl CleanupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册清理回调
    pub fn register(&mut self, cleanup: Cleanup) {
        debug!("Registering cleanup: {}", cleanup.name());
        self.cleanups.push(cleanup);
    }

    /// 逆序执行所有清理回调
    ///
    /// 回调中的 panic 不会被捕获，剩余的回调将被跳过。
    pub fn run_all(&mut self) {
        info!("Running {} cleanups", self.cleanups.len());

        while let Some(cleanup) = self.cleanups.pop() {
            debug!("Running cleanup: {}", cleanup.name());
            (cleanup.func)();
        }

        info!("Cleanup sequence complete");
    }

    /// 获取回调数量
    pub fn count(&self) -> usize {
        self.cleanups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cleanups.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::{Arc, Mutex};

    fn recorder(log: &Arc<Mutex<Vec<String>>>, name: &str) -> Cleanup {
        let log = log.clone();
        let entry = name.to_string();
        Cleanup::named(name, move || log.lock().unwrap().push(entry))
    }

    #[test]
    fn test_runs_in_reverse_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = CleanupRegistry::new();

        for name in ["a", "b", "c", "d", "e"] {
            registry.register(recorder(&log, name));
        }
        assert_eq!(registry.count(), 5);

        registry.run_all();

        assert_eq!(*log.lock().unwrap(), vec!["e", "d", "c", "b", "a"]);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_run_all_consumes_cleanups() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = CleanupRegistry::new();
        registry.register(recorder(&log, "only"));

        registry.run_all();
        registry.run_all();

        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_panic_skips_remaining_cleanups() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = CleanupRegistry::new();

        registry.register(recorder(&log, "first"));
        registry.register(Cleanup::named("broken", || panic!("cleanup failed")));
        registry.register(recorder(&log, "last"));

        let result = panic::catch_unwind(AssertUnwindSafe(|| registry.run_all()));

        assert!(result.is_err());
        // "last" 已执行，"first" 被跳过
        assert_eq!(*log.lock().unwrap(), vec!["last"]);
    }

    #[test]
    fn test_anonymous_cleanup_name() {
        let cleanup = Cleanup::new(|| {});
        assert_eq!(cleanup.name(), "<anonymous>");
    }
}
