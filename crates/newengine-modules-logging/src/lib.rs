use env_logger::{Builder, WriteStyle};
use log::LevelFilter;
use newengine_coroutines::{EngineError, EngineResult, Module, ModuleCtx};

use std::io::Write;

pub const ENV_LOG: &str = "NEWENGINE_LOG";
pub const ENV_LOG_COLORS: &str = "NEWENGINE_LOG_COLORS";
pub const ENV_LOG_MODULE: &str = "NEWENGINE_LOG_MODULE";

#[derive(Debug, Clone, PartialEq)]
pub struct ConsoleLoggerConfig {
    pub level: LevelFilter,
    pub colors: bool,
    pub include_module: bool,
}

impl ConsoleLoggerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup (env, CLI, tests).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let level = lookup(ENV_LOG)
            .and_then(|v| v.parse::<LevelFilter>().ok())
            .unwrap_or(LevelFilter::Info);
        let colors = lookup(ENV_LOG_COLORS).map(|v| v != "0").unwrap_or(true);
        let include_module = lookup(ENV_LOG_MODULE).map(|v| v != "0").unwrap_or(true);

        Self {
            level,
            colors,
            include_module,
        }
    }
}

impl Default for ConsoleLoggerConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Installs `env_logger` as the global `log` backend during `init`.
pub struct ConsoleLoggerModule {
    config: ConsoleLoggerConfig,
    initialized: bool,
}

impl ConsoleLoggerModule {
    #[inline]
    pub fn new(config: ConsoleLoggerConfig) -> Self {
        Self {
            config,
            initialized: false,
        }
    }

    #[inline]
    pub fn config(&self) -> &ConsoleLoggerConfig {
        &self.config
    }

    fn builder(&self) -> Builder {
        let mut builder = Builder::new();
        builder.filter_level(self.config.level);
        builder.write_style(if self.config.colors {
            WriteStyle::Auto
        } else {
            WriteStyle::Never
        });

        let include_module = self.config.include_module;
        builder.format(move |buf, record| {
            let style = buf.default_level_style(record.level());
            if include_module {
                writeln!(
                    buf,
                    "[{style}{:<5}{style:#}] {:<25} {}",
                    record.level(),
                    record.target(),
                    record.args()
                )
            } else {
                writeln!(buf, "[{style}{:<5}{style:#}] {}", record.level(), record.args())
            }
        });
        builder
    }
}

impl Module for ConsoleLoggerModule {
    fn id(&self) -> &'static str {
        "console-logger"
    }

    fn init(&mut self, _ctx: &mut ModuleCtx<'_>) -> EngineResult<()> {
        if self.initialized {
            return Ok(());
        }

        self.builder()
            .try_init()
            .map_err(|e| EngineError::Other(format!("logger init failed: {e}")))?;

        self.initialized = true;
        Ok(())
    }
}
