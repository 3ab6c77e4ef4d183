//! tern 内核配置（自动生成）
//!
//! 此文件由 build.rs 根据 Kernel.toml 自动生成，请勿手动修改

// ============================================================
// 基本信息
// ============================================================

/// 内核名称
pub const KERNEL_NAME: &str = "tern";

/// 内核版本
pub const KERNEL_VERSION: &str = "0.1.0";

// ============================================================
// 调度器配置
// ============================================================

/// PCB 槽位数量
pub const MAX_TASKS: usize = 6;

/// 每个任务的时间片 (毫秒)
pub const TIME_SLICE_MS: i32 = 30;

/// 时钟中断间隔 (毫秒)
pub const TICK_MS: i32 = 10;

/// 渲染间隔 (时钟中断数)
pub const RENDER_INTERVAL_TICKS: u64 = 3;

/// Alarm 信号阈值 (毫秒)
pub const ALARM_MS: u32 = 10000;

// ============================================================
// 终端配置
// ============================================================

/// 最大终端数量
pub const MAX_TERMINALS: usize = 3;

/// 行缓冲区大小
pub const LINE_BUFFER_SIZE: usize = 128;

// ============================================================
// 进程配置
// ============================================================

/// 可执行文件名最大长度
pub const MAX_NAME_LEN: usize = 32;

/// 参数字符串最大长度
pub const MAX_ARGS_LEN: usize = 128;

/// 每个任务的文件描述符数量
pub const MAX_FILES: usize = 8;

/// 用户栈顶地址
pub const USER_STACK_TOP: usize = 0x83ffffc;

// ============================================================
// RTC 配置
// ============================================================

/// RTC 硬件中断频率
pub const RTC_BASE_HZ: u32 = 1024;

/// open 之后的默认虚拟频率
pub const RTC_DEFAULT_HZ: u32 = 2;

// ============================================================
// 调试配置
// ============================================================

/// 默认日志级别
pub const LOG_LEVEL: log::LevelFilter = log::LevelFilter::Info;
