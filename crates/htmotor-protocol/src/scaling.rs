//! 物理量定标
//!
//! 将物理量（度、r/s、r/s²、Nm）转换为协议中的 i16 定点值，以及反向转换。
//!
//! 所有转换都是全函数：超出 i16 范围的值饱和到边界（不回绕），
//! 小数部分向零截断，NaN 编码为 0。

use crate::constants::*;

/// 将定标后的浮点值饱和为 i16
///
/// `f64 as i16` 本身就是饱和转换，这里显式钳位只为表达意图。
#[inline]
pub fn saturate_i16(scaled: f64) -> i16 {
    if scaled.is_nan() {
        return 0;
    }
    scaled.clamp(i16::MIN as f64, i16::MAX as f64) as i16
}

/// 角度（度）→ 位置原始值
///
/// 下界为 [`MIN_POSITION_RAW`]，永远不会产生哨兵值 [`MAGIC_POS`]。
pub fn degrees_to_position(angle_deg: f64) -> i16 {
    let raw = saturate_i16((angle_deg / DEGREES_PER_TURN) * FACTOR_POS);
    raw.max(MIN_POSITION_RAW)
}

/// 速度（r/s）→ 速度原始值
pub fn rps_to_velocity(velocity_rps: f64) -> i16 {
    saturate_i16(velocity_rps * FACTOR_VEL)
}

/// 加速度（r/s²）→ 加速度原始值
pub fn rps2_to_acceleration(acceleration_rps2: f64) -> i16 {
    saturate_i16(acceleration_rps2 * FACTOR_ACC)
}

/// 力矩（Nm）→ 力矩原始值
pub fn nm_to_torque(torque_nm: f64) -> i16 {
    saturate_i16(torque_nm * FACTOR_TQE)
}

/// 位置原始值 → 角度（度）
pub fn position_to_degrees(raw: i16) -> f64 {
    raw as f64 / FACTOR_POS * DEGREES_PER_TURN
}

/// 速度原始值 → r/s
pub fn velocity_to_rps(raw: i16) -> f64 {
    raw as f64 / FACTOR_VEL
}

/// 加速度原始值 → r/s²
pub fn acceleration_to_rps2(raw: i16) -> f64 {
    raw as f64 / FACTOR_ACC
}

/// 力矩原始值 → Nm
pub fn torque_to_nm(raw: i16) -> f64 {
    raw as f64 / FACTOR_TQE
}

/// 物理量指令（按模式填充其中一部分字段）
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PhysicalCommand {
    /// 目标角度（度）
    pub position_deg: f64,
    /// 速度（r/s）
    pub velocity_rps: f64,
    /// 加速度（r/s²）
    pub acceleration_rps2: f64,
    /// 力矩（Nm）
    pub torque_nm: f64,
}

/// 定标后的三元组，对应流控制帧的 6 个有效字节
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScaledCommand {
    pub pos: i16,
    pub vel: i16,
    /// 0x90 帧中为力矩限制，0xAD 帧中为加速度
    pub acc_or_tqe: i16,
}

impl ScaledCommand {
    /// 0x90 位置流：位置 + 速度限制 + 力矩限制
    pub fn angle_stream(cmd: &PhysicalCommand) -> Self {
        Self {
            pos: degrees_to_position(cmd.position_deg),
            vel: rps_to_velocity(cmd.velocity_rps),
            acc_or_tqe: nm_to_torque(cmd.torque_nm),
        }
    }

    /// 0xAD 速度流：哨兵位置 + 速度 + 加速度
    pub fn velocity_stream(cmd: &PhysicalCommand) -> Self {
        Self {
            pos: MAGIC_POS,
            vel: rps_to_velocity(cmd.velocity_rps),
            acc_or_tqe: rps2_to_acceleration(cmd.acceleration_rps2),
        }
    }

    /// 是否携带哨兵位置
    pub fn is_velocity_only(&self) -> bool {
        self.pos == MAGIC_POS
    }
}
