//! 协议常量定义
//!
//! 集中定义所有协议相关的常量，避免在代码中散落"魔法数"。

/// 位置比例系数：1 圈 = 10000
pub const FACTOR_POS: f64 = 10000.0;

/// 速度比例系数：1 r/s = 4000
pub const FACTOR_VEL: f64 = 4000.0;

/// 加速度比例系数：1 r/s² = 1000
pub const FACTOR_ACC: f64 = 1000.0;

/// 力矩比例系数：1 Nm = 200
pub const FACTOR_TQE: f64 = 200.0;

/// 每圈角度
pub const DEGREES_PER_TURN: f64 = 360.0;

/// 哨兵位置 0x8000 (i16::MIN)：代表"无位置限制"，仅用于速度模式
pub const MAGIC_POS: i16 = i16::MIN;

/// 位置字段的最小合法值（保证定标结果永远不会与哨兵重合）
pub const MIN_POSITION_RAW: i16 = i16::MIN + 1;

/// 协议填充字节
pub const PAD: u8 = 0x50;

// ============================================================================
// 指令字节
// ============================================================================

/// 模式写入：`[0x01, 0x00, mode, PAD...]`
pub const CMD_WRITE_MODE: u8 = 0x01;

/// 寄存器写入（float32）：`[0x0D, reg, f32 LE, PAD, PAD]`
pub const CMD_WRITE_F32: u8 = 0x0D;

/// 读寄存器（读 0x1_ + int8 0x_0 + 1 个数据 0x_1）
pub const CMD_READ_INT8_ONE: u8 = 0x11;

/// 发现回复的首字节
pub const REPLY_INFO_MARKER: u8 = 0x51;

// ============================================================================
// 模式与寄存器
// ============================================================================

/// 失能（停止）模式
pub const MODE_DISABLED: u8 = 0x00;

/// 位置/流控制模式
pub const MODE_POSITION: u8 = 0x0A;

/// 寄存器：电机模式（Ping 读取的地址）
pub const REG_MODE: u8 = 0x00;

/// 寄存器：力矩限制（Nm）
pub const REG_TORQUE_LIMIT: u8 = 0x22;

/// 寄存器：Kp
pub const REG_KP: u8 = 0x23;

/// 寄存器：Kd
pub const REG_KD: u8 = 0x24;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factors() {
        assert_eq!(FACTOR_POS, 10000.0);
        assert_eq!(FACTOR_VEL, 4000.0);
        assert_eq!(FACTOR_ACC, 1000.0);
        assert_eq!(FACTOR_TQE, 200.0);
    }

    #[test]
    fn test_sentinel_is_int16_min() {
        assert_eq!(MAGIC_POS as u16, 0x8000);
        assert!(MIN_POSITION_RAW > MAGIC_POS);
    }

    #[test]
    fn test_register_addresses() {
        assert_eq!(REG_TORQUE_LIMIT, 0x22);
        assert_eq!(REG_KP, 0x23);
        assert_eq!(REG_KD, 0x24);
        assert_eq!(MODE_POSITION, 0x0A);
    }
}
