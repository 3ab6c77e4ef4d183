//! tern 内核构建脚本
//!
//! 这个脚本在编译前运行，负责：
//! 1. 解析 Kernel.toml 配置文件
//! 2. 校验调度/终端/进程参数
//! 3. 生成 src/config.rs

use std::env;
use std::fs;
use std::path::PathBuf;

/// 从 `[section] key` 读取整数，缺省时使用默认值
fn int(config: &toml::Value, section: &str, key: &str, default: i64) -> i64 {
    config.get(section)
        .and_then(|s| s.get(key))
        .and_then(|v| v.as_integer())
        .unwrap_or(default)
}

/// 从 `[section] key` 读取字符串，缺省时使用默认值
fn string<'a>(config: &'a toml::Value, section: &str, key: &str, default: &'a str) -> &'a str {
    config.get(section)
        .and_then(|s| s.get(key))
        .and_then(|v| v.as_str())
        .unwrap_or(default)
}

/// 校验整数范围，越界时终止构建
fn check_range(name: &str, value: i64, min: i64, max: i64) {
    if value < min || value > max {
        panic!("Kernel.toml: {} = {} 超出范围 [{}, {}]", name, value, min, max);
    }
}

fn main() {
    println!("cargo:rerun-if-changed=../Kernel.toml");
    println!("cargo:rerun-if-changed=build.rs");

    let config_content = fs::read_to_string("../Kernel.toml")
        .expect("无法读取 Kernel.toml");

    let config: toml::Value = toml::from_str(&config_content)
        .expect("配置文件解析失败");

    generate_config_code(&config);
}

fn generate_config_code(config: &toml::Value) {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR 未设置"));

    let kernel_name = string(config, "general", "name", "tern");
    let kernel_version = string(config, "general", "version", "0.1.0");

    let max_tasks = int(config, "sched", "max_tasks", 6);
    let time_slice_ms = int(config, "sched", "time_slice_ms", 30);
    let tick_ms = int(config, "sched", "tick_ms", 10);
    let render_interval = int(config, "sched", "render_interval_ticks", 3);
    let alarm_ms = int(config, "sched", "alarm_ms", 10000);

    let max_terminals = int(config, "terminal", "max_terminals", 3);
    let line_buffer = int(config, "terminal", "line_buffer", 128);

    let max_name_len = int(config, "process", "max_name_len", 32);
    let max_args_len = int(config, "process", "max_args_len", 128);
    let max_files = int(config, "process", "max_files", 8);
    let user_stack_top = int(config, "process", "user_stack_top", 0x083F_FFFC);

    let rtc_base_hz = int(config, "rtc", "base_hz", 1024);
    let rtc_default_hz = int(config, "rtc", "default_hz", 2);

    let log_level = match string(config, "debug", "log_level", "info") {
        "error" => "Error",
        "warn" => "Warn",
        "info" => "Info",
        "debug" => "Debug",
        "trace" => "Trace",
        other => panic!("Kernel.toml: 未知的 log_level \"{}\"", other),
    };

    // 每个 PCB 与其内核栈共享 8KB 块，槽位太多会挤占内核镜像
    check_range("sched.max_tasks", max_tasks, 2, 16);
    check_range("sched.tick_ms", tick_ms, 1, 1000);
    check_range("sched.time_slice_ms", time_slice_ms, tick_ms, 10_000);
    if time_slice_ms % tick_ms != 0 {
        panic!("Kernel.toml: time_slice_ms ({}) 必须是 tick_ms ({}) 的整数倍", time_slice_ms, tick_ms);
    }
    check_range("sched.render_interval_ticks", render_interval, 1, 1000);
    check_range("sched.alarm_ms", alarm_ms, tick_ms, i64::from(u32::MAX));
    check_range("terminal.max_terminals", max_terminals, 1, 8);
    check_range("terminal.line_buffer", line_buffer, 2, 4096);
    check_range("process.max_name_len", max_name_len, 1, 64);
    check_range("process.max_args_len", max_args_len, 1, 1024);
    check_range("process.max_files", max_files, 3, 64);
    check_range("rtc.base_hz", rtc_base_hz, 2, 8192);
    check_range("rtc.default_hz", rtc_default_hz, 2, rtc_base_hz);
    if (rtc_base_hz as u64).count_ones() != 1 || (rtc_default_hz as u64).count_ones() != 1 {
        panic!("Kernel.toml: rtc 频率必须是 2 的幂");
    }

    let config_header = format!(
        r#"//! tern 内核配置（自动生成）
//!
//! 此文件由 build.rs 根据 Kernel.toml 自动生成，请勿手动修改

// ============================================================
// 基本信息
// ============================================================

/// 内核名称
pub const KERNEL_NAME: &str = "{}";

/// 内核版本
pub const KERNEL_VERSION: &str = "{}";

// ============================================================
// 调度器配置
// ============================================================

/// PCB 槽位数量
pub const MAX_TASKS: usize = {};

/// 每个任务的时间片 (毫秒)
pub const TIME_SLICE_MS: i32 = {};

/// 时钟中断间隔 (毫秒)
pub const TICK_MS: i32 = {};

/// 渲染间隔 (时钟中断数)
pub const RENDER_INTERVAL_TICKS: u64 = {};

/// Alarm 信号阈值 (毫秒)
pub const ALARM_MS: u32 = {};

// ============================================================
// 终端配置
// ============================================================

/// 最大终端数量
pub const MAX_TERMINALS: usize = {};

/// 行缓冲区大小
pub const LINE_BUFFER_SIZE: usize = {};

// ============================================================
// 进程配置
// ============================================================

/// 可执行文件名最大长度
pub const MAX_NAME_LEN: usize = {};

/// 参数字符串最大长度
pub const MAX_ARGS_LEN: usize = {};

/// 每个任务的文件描述符数量
pub const MAX_FILES: usize = {};

/// 用户栈顶地址
pub const USER_STACK_TOP: usize = {:#x};

// ============================================================
// RTC 配置
// ============================================================

/// RTC 硬件中断频率
pub const RTC_BASE_HZ: u32 = {};

/// open 之后的默认虚拟频率
pub const RTC_DEFAULT_HZ: u32 = {};

// ============================================================
// 调试配置
// ============================================================

/// 默认日志级别
pub const LOG_LEVEL: log::LevelFilter = log::LevelFilter::{};
"#,
        kernel_name,
        kernel_version,
        max_tasks,
        time_slice_ms,
        tick_ms,
        render_interval,
        alarm_ms,
        max_terminals,
        line_buffer,
        max_name_len,
        max_args_len,
        max_files,
        user_stack_top,
        rtc_base_hz,
        rtc_default_hz,
        log_level,
    );

    let config_file = manifest_dir.join("src").join("config.rs");

    // 只有内容变化时才写入，避免每次编译都更新文件时间戳
    let existing_content = fs::read_to_string(&config_file).unwrap_or_default();
    if existing_content != config_header {
        fs::write(&config_file, &config_header)
            .expect("写入配置文件失败");
    }
}
