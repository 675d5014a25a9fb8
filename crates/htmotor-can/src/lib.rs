//! # HTMotor CAN Adapter Layer
//!
//! CAN 硬件抽象层，提供统一的 CAN 接口抽象。
//!
//! - Linux：[`SocketCanAdapter`]（内核 SocketCAN）
//! - 测试：[`MockCanAdapter`]（feature `mock`，内存总线）

use std::time::Duration;
use thiserror::Error;

// 重新导出 htmotor-protocol 中的 MotorFrame
pub use htmotor_protocol::MotorFrame;

#[cfg(target_os = "linux")]
pub mod socketcan;

#[cfg(target_os = "linux")]
pub use socketcan::SocketCanAdapter;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

#[cfg(any(test, feature = "mock"))]
pub use mock::{MockCanAdapter, SentFrame};

/// CAN 适配层统一错误类型
#[derive(Error, Debug)]
pub enum CanError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Device Error: {0}")]
    Device(#[from] CanDeviceError),
    #[error("Read timeout")]
    Timeout,
    #[error("Buffer overflow")]
    BufferOverflow,
    #[error("Bus off")]
    BusOff,
}

/// 设备/后端错误的结构化分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanDeviceErrorKind {
    Unknown,
    NotFound,
    InterfaceDown,
    AccessDenied,
    InvalidFrame,
    Backend,
}

/// 结构化设备错误
#[derive(Error, Debug, Clone)]
#[error("{kind:?}: {message}")]
pub struct CanDeviceError {
    pub kind: CanDeviceErrorKind,
    pub message: String,
}

impl CanDeviceError {
    pub fn new(kind: CanDeviceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// 不可恢复的错误（重试无意义）
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind,
            CanDeviceErrorKind::NotFound
                | CanDeviceErrorKind::InterfaceDown
                | CanDeviceErrorKind::AccessDenied
        )
    }
}

impl From<String> for CanDeviceError {
    fn from(message: String) -> Self {
        Self::new(CanDeviceErrorKind::Unknown, message)
    }
}

impl From<&str> for CanDeviceError {
    fn from(message: &str) -> Self {
        Self::new(CanDeviceErrorKind::Unknown, message)
    }
}

/// CAN 传输抽象
///
/// 协议层只依赖两个原语：发送一帧、带超时接收一帧。
/// 超时以 `Err(CanError::Timeout)` 表示，不是致命错误。
pub trait CanAdapter {
    /// 发送帧（Fire-and-Forget，不等待确认）
    fn send(&mut self, frame: MotorFrame) -> Result<(), CanError>;

    /// 接收帧（阻塞直到收到帧或达到当前读超时）
    fn receive(&mut self) -> Result<MotorFrame, CanError>;

    fn set_receive_timeout(&mut self, _timeout: Duration) {}

    /// 带超时的接收
    fn receive_timeout(&mut self, timeout: Duration) -> Result<MotorFrame, CanError> {
        self.set_receive_timeout(timeout);
        self.receive()
    }

    /// 非阻塞接收
    fn try_receive(&mut self) -> Result<Option<MotorFrame>, CanError> {
        match self.receive_timeout(Duration::ZERO) {
            Ok(frame) => Ok(Some(frame)),
            Err(CanError::Timeout) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl<A: CanAdapter + ?Sized> CanAdapter for Box<A> {
    fn send(&mut self, frame: MotorFrame) -> Result<(), CanError> {
        (**self).send(frame)
    }

    fn receive(&mut self) -> Result<MotorFrame, CanError> {
        (**self).receive()
    }

    fn set_receive_timeout(&mut self, timeout: Duration) {
        (**self).set_receive_timeout(timeout)
    }

    fn receive_timeout(&mut self, timeout: Duration) -> Result<MotorFrame, CanError> {
        (**self).receive_timeout(timeout)
    }

    fn try_receive(&mut self) -> Result<Option<MotorFrame>, CanError> {
        (**self).try_receive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_error_from_str() {
        let err: CanDeviceError = "boom".into();
        assert_eq!(err.kind, CanDeviceErrorKind::Unknown);
        assert!(!err.is_fatal());
        assert_eq!(err.to_string(), "Unknown: boom");
    }

    #[test]
    fn test_device_error_fatal_kinds() {
        assert!(CanDeviceError::new(CanDeviceErrorKind::NotFound, "x").is_fatal());
        assert!(CanDeviceError::new(CanDeviceErrorKind::InterfaceDown, "x").is_fatal());
        assert!(!CanDeviceError::new(CanDeviceErrorKind::InvalidFrame, "x").is_fatal());
    }

    #[test]
    fn test_can_error_display() {
        assert_eq!(CanError::Timeout.to_string(), "Read timeout");
        let err = CanError::from(CanDeviceError::from("missing"));
        assert!(matches!(err, CanError::Device(_)));
    }

    #[test]
    fn test_boxed_adapter_forwards() {
        let mock = MockCanAdapter::new();
        let mut boxed: Box<dyn CanAdapter> = Box::new(mock.clone());
        boxed
            .send(MotorFrame::new_extended(0xAD, &[0; 8]))
            .unwrap();
        assert_eq!(mock.sent_frames().len(), 1);
        assert!(matches!(boxed.try_receive(), Ok(None)));
    }
}
