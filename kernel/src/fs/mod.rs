//! 文件描述符层
//!
//! 文件系统本身是外部协作者（`devices::FileSystem`）。这里只有：
//! - `file`: 每个任务的描述符表和操作表类型 (fs/file.c)
//! - `ops`: 终端、RTC、目录、普通文件四种操作表，以及 open/close/read/write

pub mod file;
pub mod ops;

pub use file::{FdTable, FileDesc, FileOps, STDIN, STDOUT};
pub use ops::{DIR_OPS, REG_FILE_OPS, RTC_OPS, STDIN_OPS, STDOUT_OPS};
