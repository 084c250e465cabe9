use futures::FutureExt;
use std::any::Any;
use std::fmt::Display;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use tracing::error;

use crate::coordinator::Closer;

/// 从 panic 负载中提取可读信息
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl Closer {
    /// 运行入口函数并检查错误和 panic
    ///
    /// 入口返回错误或发生 panic 时，以失败码关闭（先执行所有清理回调），
    /// 并阻塞直到清理完成；panic 不会继续向外传播。
    /// 入口正常返回时不触发任何关闭。
    pub fn run_guarded<F, E>(&self, entry: F, logging: bool)
    where
        F: FnOnce() -> Result<(), E>,
        E: Display,
    {
        match panic::catch_unwind(AssertUnwindSafe(entry)) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                if logging {
                    error!("error: {}", err);
                }
                self.close_with_error();
            }
            Err(payload) => {
                if logging {
                    error!("run time panic: {}", panic_message(payload.as_ref()));
                }
                self.close_with_error();
            }
        }
    }

    /// [`Closer::run_guarded`] 的异步版本
    pub async fn run_guarded_async<Fut, E>(&self, entry: Fut, logging: bool)
    where
        Fut: Future<Output = Result<(), E>>,
        E: Display,
    {
        match AssertUnwindSafe(entry).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                if logging {
                    error!("error: {}", err);
                }
                self.close_with_error_async().await;
            }
            Err(payload) => {
                if logging {
                    error!("run time panic: {}", panic_message(payload.as_ref()));
                }
                self.close_with_error_async().await;
            }
        }
    }

    /// 创建作用域守卫，离开作用域时调用 [`Closer::close`]
    pub fn guard(&self) -> CloseGuard<'_> {
        CloseGuard { closer: self }
    }
}

/// 作用域守卫
///
/// 正常离开作用域时以成功码关闭；panic 展开时以失败码关闭。
/// 无论哪种情况都会阻塞直到清理完成。
#[must_use = "the guard closes when dropped"]
pub struct CloseGuard<'a> {
    closer: &'a Closer,
}

impl Drop for CloseGuard<'_> {
    fn drop(&mut self) {
        self.closer.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");

        let payload: Box<dyn Any + Send> = Box::new(String::from("KAWABANGA!"));
        assert_eq!(panic_message(payload.as_ref()), "KAWABANGA!");

        let payload: Box<dyn Any + Send> = Box::new(42_u32);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
