//! # HTMotor Protocol
//!
//! 高扭矩电机 CAN 总线协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `ids`: CAN ID 常量定义与回复 ID 拆解
//! - `constants`: 协议常量（比例系数、寄存器地址、填充字节）
//! - `scaling`: 物理量 <-> 定点整数转换（饱和，不回绕）
//! - `control`: 控制帧构建（模式写、寄存器写、0x90/0xAD 流控制、Ping）
//! - `feedback`: 反馈帧解析（发现回复、电机模式）
//!
//! ## 字节序
//!
//! 协议所有多字节字段均为小端字节序（Intel, LSB 在前）。
//! 本模块提供了字节序转换工具函数。

pub mod constants;
pub mod control;
pub mod feedback;
pub mod ids;
pub mod scaling;

// 重新导出常用类型
pub use constants::*;
pub use control::*;
pub use feedback::*;
pub use ids::*;
pub use scaling::*;

/// CAN 2.0 帧的统一抽象
///
/// `MotorFrame` 是协议层和硬件层之间的中间抽象：
///
/// ```text
/// Protocol Layer (htmotor-protocol)
///     ↓ to_frame() 构建 / decode_discovery_reply() 解析
/// MotorFrame (此类型)
///     ↓ 转换逻辑在 CAN 层实现
/// CAN Layer (htmotor-can)
///     ↓ SocketCAN / Mock 适配器
/// Hardware
/// ```
///
/// - **Copy trait**：零成本复制，适合 100Hz 流控制场景
/// - **固定 8 字节**：避免堆分配
/// - **仅支持 CAN 2.0**：不支持 CAN FD
///
/// # 示例
///
/// ```rust
/// use htmotor_protocol::MotorFrame;
///
/// let frame = MotorFrame::new_extended(0x8001, &[0x11, 0x00]);
/// assert_eq!(frame.id(), 0x8001);
/// assert!(frame.is_extended);
/// assert_eq!(frame.data_slice(), &[0x11, 0x00]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MotorFrame {
    /// CAN ID（不含 EFF/RTR/ERR 标志位）
    pub id: u32,

    /// 帧数据（固定 8 字节，未使用部分为 0）
    pub data: [u8; 8],

    /// 有效数据长度 (0-8)
    pub len: u8,

    /// 是否为扩展帧（29-bit ID）
    pub is_extended: bool,
}

impl MotorFrame {
    /// 创建标准帧
    pub fn new_standard(id: u16, data: &[u8]) -> Self {
        Self::new(id as u32, data, false)
    }

    /// 创建扩展帧
    pub fn new_extended(id: u32, data: &[u8]) -> Self {
        Self::new(id, data, true)
    }

    fn new(id: u32, data: &[u8], is_extended: bool) -> Self {
        let mut fixed_data = [0u8; 8];
        let len = data.len().min(8);
        fixed_data[..len].copy_from_slice(&data[..len]);

        Self {
            id,
            data: fixed_data,
            len: len as u8,
            is_extended,
        }
    }

    /// 获取数据切片（只包含有效数据）
    pub fn data_slice(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }

    /// 获取 CAN ID
    pub fn id(&self) -> u32 {
        self.id
    }

    /// 获取完整数据（8字节固定数组）
    pub fn data(&self) -> &[u8; 8] {
        &self.data
    }
}

use thiserror::Error;

/// 协议解析错误类型
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Invalid CAN ID: 0x{id:X}")]
    InvalidCanId { id: u32 },
}

/// 小端字节序转 i16
pub fn bytes_to_i16_le(bytes: [u8; 2]) -> i16 {
    i16::from_le_bytes(bytes)
}

/// i16 转小端字节序
pub fn i16_to_bytes_le(value: i16) -> [u8; 2] {
    value.to_le_bytes()
}

/// f32 转小端字节序（寄存器写入）
pub fn f32_to_bytes_le(value: f32) -> [u8; 4] {
    value.to_le_bytes()
}

/// 小端字节序转 f32
pub fn bytes_to_f32_le(bytes: [u8; 4]) -> f32 {
    f32::from_le_bytes(bytes)
}
