//! 调试控制台
//!
//! 裸机上走 COM1 串口（0x3F8），主机单元测试里转发到 stderr，
//! 其他目标上输出被丢弃。

#[cfg(all(target_arch = "x86_64", target_os = "none"))]
mod serial {
    use spin::Mutex;
    use x86_64::instructions::port::Port;

    const COM1: u16 = 0x3F8;

    pub struct SerialPort {
        data: Port<u8>,
        line_status: Port<u8>,
    }

    impl SerialPort {
        const fn new() -> Self {
            SerialPort {
                data: Port::new(COM1),
                line_status: Port::new(COM1 + 5),
            }
        }

        /// 38400 8N1，开启 FIFO
        pub fn init(&mut self) {
            unsafe {
                Port::<u8>::new(COM1 + 1).write(0x00);
                Port::<u8>::new(COM1 + 3).write(0x80);
                Port::<u8>::new(COM1).write(0x03);
                Port::<u8>::new(COM1 + 1).write(0x00);
                Port::<u8>::new(COM1 + 3).write(0x03);
                Port::<u8>::new(COM1 + 2).write(0xC7);
                Port::<u8>::new(COM1 + 4).write(0x0B);
            }
        }

        pub fn send(&mut self, byte: u8) {
            // 等待发送缓冲区空（有上限，串口不存在时不会卡死）
            for _ in 0..10000 {
                if unsafe { self.line_status.read() } & 0x20 != 0 {
                    break;
                }
            }
            unsafe { self.data.write(byte) };
        }
    }

    pub static SERIAL: Mutex<SerialPort> = Mutex::new(SerialPort::new());
}

/// 初始化控制台
pub fn init() {
    #[cfg(all(target_arch = "x86_64", target_os = "none"))]
    serial::SERIAL.lock().init();
}

/// 写入单个字符
pub fn putchar(c: u8) {
    #[cfg(all(target_arch = "x86_64", target_os = "none"))]
    serial::SERIAL.lock().send(c);

    #[cfg(test)]
    {
        use std::io::Write;
        let _ = std::io::stderr().write_all(&[c]);
    }

    #[cfg(not(any(test, all(target_arch = "x86_64", target_os = "none"))))]
    let _ = c;
}
