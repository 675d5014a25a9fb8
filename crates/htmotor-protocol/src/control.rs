//! 控制帧结构体定义
//!
//! 包含所有控制指令帧的结构体，提供构建 8 字节负载的方法
//! 和转换为 `MotorFrame` 的方法。电机固件只接受扩展帧，
//! 所有 `to_frame()` 均生成扩展帧。

use crate::constants::*;
use crate::ids::*;
use crate::scaling::*;
use crate::{MotorFrame, bytes_to_i16_le, f32_to_bytes_le, i16_to_bytes_le};

// ============================================================================
// 负载编码（纯函数）
// ============================================================================

/// 模式写入负载：`[0x01, 0x00, mode, 0x50 ×5]`
pub fn encode_mode_write(mode: u8) -> [u8; 8] {
    [CMD_WRITE_MODE, 0x00, mode, PAD, PAD, PAD, PAD, PAD]
}

/// 寄存器写入负载：`[0x0D, reg, f32 LE ×4, 0x50, 0x50]`
pub fn encode_register_write(register: u8, value: f32) -> [u8; 8] {
    let mut data = [PAD; 8];
    data[0] = CMD_WRITE_F32;
    data[1] = register;
    data[2..6].copy_from_slice(&f32_to_bytes_le(value));
    data
}

/// 三个 i16 小端打包 + 2 字节填充
fn pack_stream(first: i16, second: i16, third: i16) -> [u8; 8] {
    let mut data = [PAD; 8];
    data[0..2].copy_from_slice(&i16_to_bytes_le(first));
    data[2..4].copy_from_slice(&i16_to_bytes_le(second));
    data[4..6].copy_from_slice(&i16_to_bytes_le(third));
    data
}

/// 0x90 位置流负载：`[posL,posH,velL,velH,tqeL,tqeH,0x50,0x50]`
pub fn encode_stream_90(angle_deg: f64, max_vel_rps: f64, max_tqe_nm: f64) -> [u8; 8] {
    pack_stream(
        degrees_to_position(angle_deg),
        rps_to_velocity(max_vel_rps),
        nm_to_torque(max_tqe_nm),
    )
}

/// 0xAD 流负载（原始值）：`[posL,posH,velL,velH,accL,accH,0x50,0x50]`
pub fn encode_stream_ad(position: i16, velocity: i16, acceleration: i16) -> [u8; 8] {
    pack_stream(position, velocity, acceleration)
}

/// 0xAD 纯速度流负载：位置字段固定为哨兵 [`MAGIC_POS`]
pub fn encode_velocity_stream(velocity_rps: f64, acceleration_rps2: f64) -> [u8; 8] {
    encode_stream_ad(
        MAGIC_POS,
        rps_to_velocity(velocity_rps),
        rps2_to_acceleration(acceleration_rps2),
    )
}

/// Ping 负载：读寄存器 0x00 `[0x11, 0x00, 0x50 ×6]`
pub fn encode_ping() -> [u8; 8] {
    [CMD_READ_INT8_ONE, REG_MODE, PAD, PAD, PAD, PAD, PAD, PAD]
}

/// 解码流控制负载的前三个 i16 字段
///
/// 用于测试和诊断；长度不足 6 字节时返回 `None`。
pub fn decode_stream(payload: &[u8]) -> Option<ScaledCommand> {
    if payload.len() < 6 {
        return None;
    }
    Some(ScaledCommand {
        pos: bytes_to_i16_le([payload[0], payload[1]]),
        vel: bytes_to_i16_le([payload[2], payload[3]]),
        acc_or_tqe: bytes_to_i16_le([payload[4], payload[5]]),
    })
}

// ============================================================================
// 指令结构体
// ============================================================================

/// 模式写入指令（ID = motor_id）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeWriteCommand {
    pub motor_id: u8,
    pub mode: u8,
}

impl ModeWriteCommand {
    /// 进入位置/流控制模式 (0x0A)
    pub fn enable(motor_id: u8) -> Self {
        Self {
            motor_id,
            mode: MODE_POSITION,
        }
    }

    /// 失能 (0x00)
    pub fn disable(motor_id: u8) -> Self {
        Self {
            motor_id,
            mode: MODE_DISABLED,
        }
    }

    pub fn to_bytes(self) -> [u8; 8] {
        encode_mode_write(self.mode)
    }

    /// 转换为 CAN 帧
    pub fn to_frame(self) -> MotorFrame {
        MotorFrame::new_extended(motor_command_id(self.motor_id), &self.to_bytes())
    }
}

/// float32 寄存器写入指令（ID = motor_id）
///
/// 用于力矩限制、PID 系数等参数设置。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegisterWriteCommand {
    pub motor_id: u8,
    pub register: u8,
    pub value: f32,
}

impl RegisterWriteCommand {
    pub fn new(motor_id: u8, register: u8, value: f32) -> Self {
        Self {
            motor_id,
            register,
            value,
        }
    }

    /// 力矩限制 (0x22)
    pub fn torque_limit(motor_id: u8, torque_nm: f32) -> Self {
        Self::new(motor_id, REG_TORQUE_LIMIT, torque_nm)
    }

    /// Kp (0x23)
    pub fn kp(motor_id: u8, kp: f32) -> Self {
        Self::new(motor_id, REG_KP, kp)
    }

    /// Kd (0x24)
    pub fn kd(motor_id: u8, kd: f32) -> Self {
        Self::new(motor_id, REG_KD, kd)
    }

    pub fn to_bytes(self) -> [u8; 8] {
        encode_register_write(self.register, self.value)
    }

    /// 转换为 CAN 帧
    pub fn to_frame(self) -> MotorFrame {
        MotorFrame::new_extended(motor_command_id(self.motor_id), &self.to_bytes())
    }
}

/// 位置流控制指令 (0x90)
///
/// 从物理量创建，编码时定标并饱和。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngleStreamCommand {
    pub angle_deg: f64,
    pub max_velocity_rps: f64,
    pub max_torque_nm: f64,
}

impl AngleStreamCommand {
    pub fn new(angle_deg: f64, max_velocity_rps: f64, max_torque_nm: f64) -> Self {
        Self {
            angle_deg,
            max_velocity_rps,
            max_torque_nm,
        }
    }

    pub fn to_bytes(self) -> [u8; 8] {
        encode_stream_90(self.angle_deg, self.max_velocity_rps, self.max_torque_nm)
    }

    /// 转换为 CAN 帧
    pub fn to_frame(self) -> MotorFrame {
        MotorFrame::new_extended(ID_ANGLE_STREAM, &self.to_bytes())
    }
}

/// 速度流控制指令 (0xAD)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocityStreamCommand {
    pub velocity_rps: f64,
    pub acceleration_rps2: f64,
}

impl VelocityStreamCommand {
    pub fn new(velocity_rps: f64, acceleration_rps2: f64) -> Self {
        Self {
            velocity_rps,
            acceleration_rps2,
        }
    }

    pub fn to_bytes(self) -> [u8; 8] {
        encode_velocity_stream(self.velocity_rps, self.acceleration_rps2)
    }

    /// 转换为 CAN 帧
    pub fn to_frame(self) -> MotorFrame {
        MotorFrame::new_extended(ID_VELOCITY_STREAM, &self.to_bytes())
    }
}

/// 发现 Ping 指令（ID = 0x8000 | motor_id，扩展帧）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingCommand {
    pub motor_id: u8,
}

impl PingCommand {
    pub fn new(motor_id: u8) -> Self {
        Self { motor_id }
    }

    /// 转换为 CAN 帧
    pub fn to_frame(self) -> MotorFrame {
        MotorFrame::new_extended(ping_id(self.motor_id), &encode_ping())
    }
}

// ============================================================================
// 帧构建快捷函数
// ============================================================================

pub fn mode_write_frame(motor_id: u8, mode: u8) -> MotorFrame {
    ModeWriteCommand { motor_id, mode }.to_frame()
}

pub fn register_write_frame(motor_id: u8, register: u8, value: f32) -> MotorFrame {
    RegisterWriteCommand::new(motor_id, register, value).to_frame()
}

pub fn angle_stream_frame(angle_deg: f64, max_vel_rps: f64, max_tqe_nm: f64) -> MotorFrame {
    AngleStreamCommand::new(angle_deg, max_vel_rps, max_tqe_nm).to_frame()
}

pub fn velocity_stream_frame(velocity_rps: f64, acceleration_rps2: f64) -> MotorFrame {
    VelocityStreamCommand::new(velocity_rps, acceleration_rps2).to_frame()
}

pub fn ping_frame(motor_id: u8) -> MotorFrame {
    PingCommand::new(motor_id).to_frame()
}
