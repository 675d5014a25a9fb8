//! SocketCAN CAN 适配器实现
//!
//! 基于 Linux SocketCAN 子系统，使用内核级的 CAN 通讯接口。
//!
//! ## 特性
//!
//! - 支持标准帧和扩展帧（电机协议只使用扩展帧）
//! - `poll` 实现的接收超时
//! - 自动过滤错误帧
//! - 禁用 loopback：本机发出的 Ping 不会回环后被误认为电机回复
//!
//! ## 限制
//!
//! - **仅限 Linux 平台**
//! - **接口配置**：波特率等由系统工具配置，例如
//!   `sudo ip link set can0 type can bitrate 1000000 && sudo ip link set up can0`
//! - **权限要求**：可能需要 `dialout` 组权限或 `sudo`

use crate::{CanAdapter, CanDeviceError, CanDeviceErrorKind, CanError, MotorFrame};
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use socketcan::{
    BlockingCan, CanError as SocketCanError, CanErrorFrame, CanFrame, CanSocket, EmbeddedFrame,
    ExtendedId, Frame, Socket, StandardId,
};
use std::convert::TryFrom;
use std::os::fd::BorrowedFd;
use std::os::unix::io::AsRawFd;
use std::time::{Duration, Instant};
use tracing::{error, trace, warn};

mod interface_check;

pub use interface_check::check_interface_status;

/// 打开 socket 失败时的错误分类（权限不足单独区分，便于提示用户）
fn open_error_kind(error: &std::io::Error) -> CanDeviceErrorKind {
    match error.raw_os_error() {
        Some(libc::EACCES) | Some(libc::EPERM) => CanDeviceErrorKind::AccessDenied,
        Some(libc::ENODEV) => CanDeviceErrorKind::NotFound,
        _ => CanDeviceErrorKind::Backend,
    }
}

/// SocketCAN 适配器
///
/// # 示例
///
/// ```no_run
/// use htmotor_can::{CanAdapter, MotorFrame, SocketCanAdapter};
///
/// let mut adapter = SocketCanAdapter::new("can0").unwrap();
/// adapter.send(MotorFrame::new_extended(0x8001, &[0x11, 0x00])).unwrap();
/// let reply = adapter.receive().unwrap();
/// ```
#[derive(Debug)]
pub struct SocketCanAdapter {
    socket: CanSocket,
    /// 接口名称（如 "can0"）
    interface: String,
    /// `receive()` 使用的超时
    read_timeout: Duration,
}

impl SocketCanAdapter {
    /// 创建新的 SocketCAN 适配器
    ///
    /// 在打开 socket 之前，会检查接口是否存在且已启动（UP 状态）。
    ///
    /// # 错误
    /// - `CanError::Device`: 接口不存在 / 未启动 / 无法打开
    /// - `CanError::Io`: 系统调用失败
    pub fn new(interface: impl Into<String>) -> Result<Self, CanError> {
        let interface = interface.into();

        if !check_interface_status(&interface)? {
            return Err(CanDeviceError::new(
                CanDeviceErrorKind::InterfaceDown,
                format!(
                    "CAN interface '{}' exists but is not UP. Please start it first:\n  sudo ip link set up {}",
                    interface, interface
                ),
            )
            .into());
        }
        trace!(
            "CAN interface '{}' is UP, proceeding with initialization",
            interface
        );

        let socket = CanSocket::open(&interface).map_err(|e| {
            CanError::from(CanDeviceError::new(
                open_error_kind(&e),
                format!("Failed to open CAN interface '{}': {}", interface, e),
            ))
        })?;

        // 禁用 loopback：发出的帧不回环到本机的其他 CAN socket
        let loopback_enabled: libc::c_int = 0;
        let loopback_result = unsafe {
            libc::setsockopt(
                socket.as_raw_fd(),
                libc::SOL_CAN_RAW,
                libc::CAN_RAW_LOOPBACK,
                &loopback_enabled as *const _ as *const libc::c_void,
                std::mem::size_of::<libc::c_int>() as libc::socklen_t,
            )
        };
        if loopback_result < 0 {
            warn!(
                "Failed to disable CAN_RAW_LOOPBACK on '{}': {}",
                interface,
                std::io::Error::last_os_error()
            );
        } else {
            trace!(
                "SocketCAN interface '{}' loopback disabled (CAN_RAW_LOOPBACK=0)",
                interface
            );
        }

        Ok(Self {
            socket,
            interface,
            read_timeout: Duration::from_millis(10),
        })
    }

    /// 获取接口名称
    pub fn interface(&self) -> &str {
        &self.interface
    }

    /// 获取读超时时间
    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    /// 校验波特率配置
    ///
    /// SocketCAN 的波特率由 `ip link set can0 type can bitrate ...` 配置，
    /// 这里只记录期望值，不修改接口。
    pub fn configure(&mut self, bitrate: u32) -> Result<(), CanError> {
        trace!(
            "SocketCAN interface '{}' expects bitrate {} (set externally)",
            self.interface, bitrate
        );
        Ok(())
    }

    /// 等待 socket 可读，超时返回 `Ok(false)`
    fn wait_readable(&self, timeout: Duration) -> Result<bool, CanError> {
        let fd = self.socket.as_raw_fd();
        let pollfd = PollFd::new(unsafe { BorrowedFd::borrow_raw(fd) }, PollFlags::POLLIN);

        // PollTimeout 为毫秒（u16），向上取整避免亚毫秒超时变成非阻塞
        let mut timeout_ms = timeout.as_millis().min(u16::MAX as u128) as u16;
        if timeout_ms == 0 && !timeout.is_zero() {
            timeout_ms = 1;
        }

        match poll(&mut [pollfd], PollTimeout::from(timeout_ms)) {
            Ok(0) => Ok(false),
            Ok(_) => Ok(true),
            Err(nix::errno::Errno::EINTR) => Ok(false),
            Err(e) => Err(CanError::Io(std::io::Error::other(format!(
                "poll failed: {}",
                e
            )))),
        }
    }

    /// 处理错误帧：致命错误返回 `Err`，其余忽略
    fn check_error_frame(&self, can_frame: CanFrame) -> Result<(), CanError> {
        let Ok(error_frame) = CanErrorFrame::try_from(can_frame) else {
            warn!("Received CAN error frame but failed to parse, ignoring");
            return Ok(());
        };

        match SocketCanError::from(error_frame) {
            SocketCanError::BusOff => {
                error!("CAN Bus Off error detected on '{}'", self.interface);
                Err(CanError::BusOff)
            },
            SocketCanError::ControllerProblem(problem) => {
                let problem_str = format!("{}", problem);
                if problem_str.to_lowercase().contains("overflow") {
                    error!("CAN Buffer Overflow detected: {}", problem);
                    Err(CanError::BufferOverflow)
                } else {
                    warn!("CAN Controller Problem: {}, ignoring", problem);
                    Ok(())
                }
            },
            other => {
                warn!("CAN Error Frame received: {}, ignoring", other);
                Ok(())
            },
        }
    }

    fn to_motor_frame(can_frame: &CanFrame) -> MotorFrame {
        let data = can_frame.data();
        let len = data.len().min(8);
        let mut frame = if can_frame.is_extended() {
            MotorFrame::new_extended(can_frame.raw_id(), &data[..len])
        } else {
            MotorFrame::new_standard(can_frame.raw_id() as u16, &data[..len])
        };
        frame.len = can_frame.dlc().min(8) as u8;
        frame
    }
}

impl Drop for SocketCanAdapter {
    fn drop(&mut self) {
        trace!(
            "[Auto-Drop] SocketCAN interface '{}' closed",
            self.interface
        );
    }
}

impl CanAdapter for SocketCanAdapter {
    /// 发送帧（Fire-and-Forget）
    ///
    /// # 错误
    /// - `CanError::Device`: 创建帧失败（如 ID 超出范围）
    /// - `CanError::Io`: 发送失败（如总线错误、发送缓冲区满）
    fn send(&mut self, frame: MotorFrame) -> Result<(), CanError> {
        let payload = frame.data_slice();
        let can_frame = if frame.is_extended {
            ExtendedId::new(frame.id).and_then(|id| CanFrame::new(id, payload))
        } else {
            u16::try_from(frame.id)
                .ok()
                .and_then(StandardId::new)
                .and_then(|id| CanFrame::new(id, payload))
        }
        .ok_or_else(|| {
            CanError::from(CanDeviceError::new(
                CanDeviceErrorKind::InvalidFrame,
                format!(
                    "Failed to create {} frame with ID 0x{:X}",
                    if frame.is_extended { "extended" } else { "standard" },
                    frame.id
                ),
            ))
        })?;

        self.socket.transmit(&can_frame).map_err(|e| {
            CanError::Io(std::io::Error::other(format!(
                "SocketCAN transmit error: {}",
                e
            )))
        })?;

        trace!("Sent CAN frame: ID=0x{:X}, len={}", frame.id, frame.len);
        Ok(())
    }

    /// 接收帧（阻塞直到收到有效数据帧或超时）
    ///
    /// 错误帧被过滤，只返回数据帧。
    fn receive(&mut self) -> Result<MotorFrame, CanError> {
        let deadline = Instant::now() + self.read_timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if !self.wait_readable(remaining)? {
                return Err(CanError::Timeout);
            }

            let can_frame = match self.socket.read_frame() {
                Ok(frame) => frame,
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    return Err(CanError::Timeout);
                },
                Err(e) => return Err(CanError::Io(e)),
            };

            if can_frame.is_error_frame() {
                self.check_error_frame(can_frame)?;
                if Instant::now() >= deadline {
                    return Err(CanError::Timeout);
                }
                continue;
            }

            let frame = Self::to_motor_frame(&can_frame);
            trace!(
                "Received CAN frame: ID=0x{:X}, len={}, extended={}",
                frame.id, frame.len, frame.is_extended
            );
            return Ok(frame);
        }
    }

    fn set_receive_timeout(&mut self, timeout: Duration) {
        self.read_timeout = timeout;
    }

    fn receive_timeout(&mut self, timeout: Duration) -> Result<MotorFrame, CanError> {
        let old_timeout = self.read_timeout;
        self.read_timeout = timeout;
        let result = self.receive();
        self.read_timeout = old_timeout;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;

    fn can_interface_exists(interface: &str) -> bool {
        Command::new("ip")
            .args(["link", "show", interface])
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    /// 宏：要求 vcan0 接口存在，如果不存在则跳过测试
    macro_rules! require_vcan0 {
        () => {{
            if !can_interface_exists("vcan0") {
                eprintln!("Skipping test: vcan0 interface not available");
                return;
            }
            "vcan0"
        }};
    }

    #[test]
    fn test_open_error_kind() {
        let denied = std::io::Error::from_raw_os_error(libc::EACCES);
        assert_eq!(open_error_kind(&denied), CanDeviceErrorKind::AccessDenied);
        let not_permitted = std::io::Error::from_raw_os_error(libc::EPERM);
        assert_eq!(open_error_kind(&not_permitted), CanDeviceErrorKind::AccessDenied);
        assert!(CanDeviceError::new(open_error_kind(&denied), "denied").is_fatal());

        let no_device = std::io::Error::from_raw_os_error(libc::ENODEV);
        assert_eq!(open_error_kind(&no_device), CanDeviceErrorKind::NotFound);
        let other = std::io::Error::from_raw_os_error(libc::EIO);
        assert_eq!(open_error_kind(&other), CanDeviceErrorKind::Backend);
    }

    #[test]
    fn test_new_invalid_interface() {
        let result = SocketCanAdapter::new("htm_missing0");
        match result {
            Err(CanError::Device(err)) => assert!(err.is_fatal()),
            other => panic!("Expected Device error, got: {:?}", other),
        }
    }

    #[test]
    fn test_new_success() {
        let interface = require_vcan0!();
        let adapter = SocketCanAdapter::new(interface).unwrap();
        assert_eq!(adapter.interface(), "vcan0");
        assert_eq!(adapter.read_timeout(), Duration::from_millis(10));
    }

    #[test]
    fn test_send_extended_frame() {
        let interface = require_vcan0!();
        let mut adapter = SocketCanAdapter::new(interface).unwrap();
        let frame = MotorFrame::new_extended(0x8001, &[0x11, 0x00, 0x50, 0x50, 0x50, 0x50, 0x50, 0x50]);
        assert!(adapter.send(frame).is_ok());
    }

    #[test]
    fn test_send_invalid_standard_id() {
        let interface = require_vcan0!();
        let mut adapter = SocketCanAdapter::new(interface).unwrap();
        let frame = MotorFrame::new_standard(0xFFFF, &[]);
        assert!(matches!(adapter.send(frame), Err(CanError::Device(_))));
    }

    #[test]
    fn test_receive_timeout_without_traffic() {
        let interface = require_vcan0!();
        let mut adapter = SocketCanAdapter::new(interface).unwrap();
        // 清空残留帧
        while adapter.receive_timeout(Duration::from_millis(1)).is_ok() {}

        let start = Instant::now();
        let result = adapter.receive_timeout(Duration::from_millis(10));
        assert!(matches!(result, Err(CanError::Timeout)));
        assert!(start.elapsed() < Duration::from_millis(100));
        assert_eq!(adapter.read_timeout(), Duration::from_millis(10));
    }
}
