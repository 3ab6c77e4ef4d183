//! 内核日志
//!
//! 把 `log` 门面接到控制台上，每条记录一行：`[LEVEL] target: message`。
//! 日志级别来自 Kernel.toml 的 `[debug] log_level`，
//! 打开 `debug_log` 特性时强制为 Trace。

use core::fmt::Write;

use log::{LevelFilter, Log, Metadata, Record};

use crate::config::LOG_LEVEL;
use crate::print::Console;

struct KernelLogger;

static LOGGER: KernelLogger = KernelLogger;

impl Log for KernelLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let _ = writeln!(
            Console,
            "[{:>5}] {}: {}",
            record.level(),
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {}
}

/// 配置的日志级别
pub const fn level() -> LevelFilter {
    if cfg!(feature = "debug_log") {
        LevelFilter::Trace
    } else {
        LOG_LEVEL
    }
}

/// 安装日志器
///
/// 重复调用是无害的：只有第一次生效。
pub fn init() {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level());
    }
}
