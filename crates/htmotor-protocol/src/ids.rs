//! CAN ID 常量定义
//!
//! 定义所有协议帧的仲裁 ID，并提供发现回复 ID 的拆解。

// ============================================================================
// 流控制帧 ID 常量
// ============================================================================

/// 位置 + 速度限制 + 力矩限制 流控制指令
pub const ID_ANGLE_STREAM: u32 = 0x0090;

/// 位置 + 速度 + 加速度 流控制指令（速度模式使用哨兵位置）
pub const ID_VELOCITY_STREAM: u32 = 0x00AD;

// ============================================================================
// 发现（Ping）相关
// ============================================================================

/// Ping 请求标志：Bit15 = 1 表示需要回复
pub const PING_REPLY_FLAG: u32 = 0x8000;

/// 29-bit 扩展帧 ID 掩码（剥离 EFF/RTR/ERR 标志位）
pub const CAN_EFF_MASK: u32 = 0x1FFF_FFFF;

/// 扩展帧标志位（Linux `CAN_EFF_FLAG`）
pub const CAN_EFF_FLAG: u32 = 0x8000_0000;

/// 电机寄存器/模式指令的仲裁 ID（即电机 ID 本身）
pub fn motor_command_id(motor_id: u8) -> u32 {
    motor_id as u32
}

/// 合法电机 ID 范围（回复 ID 的源 ID 字段只有 7 位）
pub const MOTOR_ID_MIN: u8 = 1;
pub const MOTOR_ID_MAX: u8 = 0x7F;

/// 校验电机 ID
pub fn validate_motor_id(motor_id: u8) -> Result<u8, crate::ProtocolError> {
    if (MOTOR_ID_MIN..=MOTOR_ID_MAX).contains(&motor_id) {
        Ok(motor_id)
    } else {
        Err(crate::ProtocolError::InvalidCanId {
            id: motor_id as u32,
        })
    }
}

/// Ping 指令的仲裁 ID：`0x8000 | motor_id`
pub fn ping_id(motor_id: u8) -> u32 {
    PING_REPLY_FLAG | motor_id as u32
}

/// 回复帧 ID 的拆解结果
///
/// 固件回复的仲裁 ID 布局没有统一约定：部分固件把源电机 ID 放在
/// bit8..bit14，部分直接放在低 8 位。两种解读都保留，由上层决定取舍。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyId {
    /// 剥离扩展帧标志位后的原始 ID
    pub raw_id: u32,
    /// `(raw_id >> 8) & 0x7F`
    pub source_id: u8,
    /// `raw_id & 0xFF`
    pub direct_id: u8,
}

impl ReplyId {
    /// 从接收到的仲裁 ID 拆解（可能带有 `CAN_EFF_FLAG`）
    pub fn parse(arbitration_id: u32) -> Self {
        let raw_id = arbitration_id & CAN_EFF_MASK;
        Self {
            raw_id,
            source_id: ((raw_id >> 8) & 0x7F) as u8,
            direct_id: (raw_id & 0xFF) as u8,
        }
    }

    /// 源 ID 是否落在有效区间 (0, 128)
    pub fn has_source_id(&self) -> bool {
        self.source_id > 0 && self.source_id < 128
    }

    /// 检测到的电机 ID：有效源 ID 优先，否则退回低 8 位
    pub fn detected_id(&self) -> u8 {
        if self.has_source_id() {
            self.source_id
        } else {
            self.direct_id
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_ids() {
        assert_eq!(ID_ANGLE_STREAM, 0x90);
        assert_eq!(ID_VELOCITY_STREAM, 0xAD);
    }

    #[test]
    fn test_ping_id() {
        assert_eq!(ping_id(1), 0x8001);
        assert_eq!(ping_id(0x7F), 0x807F);
        assert_eq!(motor_command_id(5), 5);
    }

    #[test]
    fn test_validate_motor_id() {
        assert!(validate_motor_id(0).is_err());
        assert_eq!(validate_motor_id(1).unwrap(), 1);
        assert_eq!(validate_motor_id(127).unwrap(), 127);
        assert!(matches!(
            validate_motor_id(128),
            Err(crate::ProtocolError::InvalidCanId { id: 128 })
        ));
    }

    #[test]
    fn test_reply_id_source() {
        let id = ReplyId::parse(0x0501);
        assert_eq!(id.source_id, 5);
        assert_eq!(id.direct_id, 1);
        assert!(id.has_source_id());
        assert_eq!(id.detected_id(), 5);
    }

    #[test]
    fn test_reply_id_direct_fallback() {
        // 源 ID 为 0 → 使用低 8 位
        let id = ReplyId::parse(0x0006);
        assert!(!id.has_source_id());
        assert_eq!(id.detected_id(), 6);
    }

    #[test]
    fn test_reply_id_strips_eff_flag() {
        let id = ReplyId::parse(CAN_EFF_FLAG | 0x0300);
        assert_eq!(id.raw_id, 0x0300);
        assert_eq!(id.detected_id(), 3);
    }

    #[test]
    fn test_reply_id_bit15_masked_out_of_source() {
        // 0x8005: (0x80 & 0x7F) = 0 → 退回 direct_id
        let id = ReplyId::parse(0x8005);
        assert_eq!(id.source_id, 0);
        assert_eq!(id.detected_id(), 5);
    }
}
