//! 驱动层错误类型定义

use htmotor_can::CanError;
use htmotor_protocol::ProtocolError;
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// CAN 驱动错误
    #[error("CAN driver error: {0}")]
    Can(#[from] CanError),

    /// 协议解析错误
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 锁被毒化（线程 panic）
    #[error("Poisoned lock (thread panic)")]
    PoisonedLock,

    /// 流控制线程错误
    #[error("Stream thread error: {0}")]
    StreamThread(String),

    /// 操作与当前控制模式不符（如在速度模式下调用 set_angle）
    #[error("Operation requires {expected} mode, controller is in {actual} mode")]
    InvalidMode {
        expected: &'static str,
        actual: &'static str,
    },

    /// 配置错误（解析失败或数值非法）
    #[error("Config error: {0}")]
    Config(String),
}
