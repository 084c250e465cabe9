use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::Result;

/// 环境变量前缀，例如 `FLUX_CLOSER_EXIT_CODE_ERR=2`
pub const ENV_PREFIX: &str = "FLUX_CLOSER";

/// 需要监听的退出信号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExitSignal {
    /// SIGINT - Ctrl+C
    #[serde(alias = "SIGINT")]
    Interrupt,

    /// SIGHUP
    #[serde(alias = "SIGHUP")]
    Hangup,

    /// SIGTERM
    #[serde(alias = "SIGTERM")]
    Terminate,

    /// SIGABRT
    #[serde(alias = "SIGABRT")]
    Abort,

    /// SIGQUIT
    #[serde(alias = "SIGQUIT")]
    Quit,

    /// SIGUSR1
    #[serde(alias = "SIGUSR1", alias = "usr1")]
    User1,

    /// SIGUSR2
    #[serde(alias = "SIGUSR2", alias = "usr2")]
    User2,
}

impl ExitSignal {
    /// 调试用信号集：不包含 SIGABRT，便于调试器获取堆栈
    pub const DEBUG_SET: &'static [ExitSignal] = &[
        ExitSignal::Interrupt,
        ExitSignal::Hangup,
        ExitSignal::Terminate,
    ];

    /// 默认信号集
    pub const DEFAULT_SET: &'static [ExitSignal] = &[
        ExitSignal::Interrupt,
        ExitSignal::Hangup,
        ExitSignal::Terminate,
        ExitSignal::Abort,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ExitSignal::Interrupt => "SIGINT",
            ExitSignal::Hangup => "SIGHUP",
            ExitSignal::Terminate => "SIGTERM",
            ExitSignal::Abort => "SIGABRT",
            ExitSignal::Quit => "SIGQUIT",
            ExitSignal::User1 => "SIGUSR1",
            ExitSignal::User2 => "SIGUSR2",
        }
    }
}

impl fmt::Display for ExitSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 关闭器配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloserConfig {
    /// 正常退出码
    pub exit_code_ok: i32,
    /// 错误退出码
    pub exit_code_err: i32,
    /// 监听的信号
    pub signals: Vec<ExitSignal>,
}

impl Default for CloserConfig {
    fn default() -> Self {
        Self {
            exit_code_ok: 0,
            exit_code_err: 1,
            signals: ExitSignal::DEFAULT_SET.to_vec(),
        }
    }
}

impl CloserConfig {
    /// 从 TOML 文件加载配置，并应用 `FLUX_CLOSER_*` 环境变量覆盖
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::load_with_env(path, Self::environment())
    }

    fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("signals")
    }

    fn load_with_env(path: impl AsRef<Path>, env: Environment) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()).format(FileFormat::Toml))
            .add_source(env)
            .build()?;

        let mut loaded: CloserConfig = config.try_deserialize()?;
        loaded.dedup_signals();
        Ok(loaded)
    }

    /// 去除重复信号，保留首次出现的顺序
    pub(crate) fn dedup_signals(&mut self) {
        let mut seen = Vec::with_capacity(self.signals.len());
        self.signals.retain(|s| {
            if seen.contains(s) {
                false
            } else {
                seen.push(*s);
                true
            }
        });
    }
}
