//! 反馈帧解析
//!
//! 电机只在收到 Ping（读寄存器）时回复。回复内容由固件决定，
//! 这里的解析都是尽力而为：字段缺失或格式不对时直接省略，不报错。

use crate::constants::REPLY_INFO_MARKER;

/// 电机模式（读寄存器 0x00 的返回值）
#[derive(Debug, Clone, Copy, PartialEq, Eq, num_enum::TryFromPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum MotorMode {
    /// 停止模式
    Stopped = 0x00,
    /// 位置模式
    Position = 0x0A,
    /// 速度模式
    Velocity = 0x0B,
    /// 力矩模式
    Torque = 0x0C,
}

impl MotorMode {
    /// 从原始字节解析，未知值返回 `None`
    pub fn from_raw(value: u8) -> Option<Self> {
        Self::try_from(value).ok()
    }

    pub fn name(self) -> &'static str {
        match self {
            MotorMode::Stopped => "stopped",
            MotorMode::Position => "position",
            MotorMode::Velocity => "velocity",
            MotorMode::Torque => "torque",
        }
    }
}

impl std::fmt::Display for MotorMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// 发现回复中可选的设备信息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryReply {
    /// 3 字符短名称（Byte 1..4，仅当 Byte 0 == 0x51）
    pub name: Option<String>,
    /// 4 字符硬件版本（Byte 4..8）
    pub hardware_version: Option<String>,
}

/// 解码 ASCII 字段：去掉结尾的 NUL，空串或非 ASCII 视为缺失
fn ascii_field(bytes: &[u8]) -> Option<String> {
    if !bytes.is_ascii() {
        return None;
    }
    let text = std::str::from_utf8(bytes).ok()?.trim_end_matches('\0');
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// 解析发现回复
///
/// - 长度 ≥ 4 且 `payload[0] == 0x51`：Byte 1..4 为名称
/// - 长度 ≥ 8：Byte 4..8 为硬件版本
pub fn decode_discovery_reply(payload: &[u8]) -> DiscoveryReply {
    let name = if payload.len() >= 4 && payload[0] == REPLY_INFO_MARKER {
        ascii_field(&payload[1..4])
    } else {
        None
    };

    let hardware_version = if payload.len() >= 8 {
        ascii_field(&payload[4..8])
    } else {
        None
    };

    DiscoveryReply {
        name,
        hardware_version,
    }
}

/// 从回复中读取模式字节（Byte 1）
pub fn decode_mode_reply(payload: &[u8]) -> Option<u8> {
    payload.get(1).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_reply() {
        let reply = decode_discovery_reply(b"\x51HTMv1.2");
        assert_eq!(reply.name.as_deref(), Some("HTM"));
        assert_eq!(reply.hardware_version.as_deref(), Some("v1.2"));
    }

    #[test]
    fn test_name_only() {
        let reply = decode_discovery_reply(&[0x51, b'A', b'B', b'C']);
        assert_eq!(reply.name.as_deref(), Some("ABC"));
        assert!(reply.hardware_version.is_none());
    }

    #[test]
    fn test_wrong_marker_keeps_version() {
        let reply = decode_discovery_reply(&[0x11, 0x0A, 0x50, 0x50, b'r', b'e', b'v', b'3']);
        assert!(reply.name.is_none());
        assert_eq!(reply.hardware_version.as_deref(), Some("rev3"));
    }

    #[test]
    fn test_short_payload() {
        assert_eq!(decode_discovery_reply(&[0x51, b'A']), DiscoveryReply::default());
        assert_eq!(decode_discovery_reply(&[]), DiscoveryReply::default());
    }

    #[test]
    fn test_trailing_nul_trimmed() {
        let reply = decode_discovery_reply(&[0x51, b'M', 0, 0, b'V', b'2', 0, 0]);
        assert_eq!(reply.name.as_deref(), Some("M"));
        assert_eq!(reply.hardware_version.as_deref(), Some("V2"));
    }

    #[test]
    fn test_non_ascii_omitted() {
        let reply = decode_discovery_reply(&[0x51, 0xFF, 0xFE, 0x80, 0x50, 0x50, 0x50, 0x50]);
        assert!(reply.name.is_none());
        // 0x50 == 'P'
        assert_eq!(reply.hardware_version.as_deref(), Some("PPPP"));
    }

    #[test]
    fn test_motor_mode() {
        assert_eq!(MotorMode::from_raw(0x00), Some(MotorMode::Stopped));
        assert_eq!(MotorMode::from_raw(0x0A), Some(MotorMode::Position));
        assert_eq!(MotorMode::from_raw(0x0B), Some(MotorMode::Velocity));
        assert_eq!(MotorMode::from_raw(0x0C), Some(MotorMode::Torque));
        assert_eq!(MotorMode::from_raw(0x42), None);
        assert_eq!(MotorMode::Position.to_string(), "position");
    }

    #[test]
    fn test_decode_mode_reply() {
        assert_eq!(decode_mode_reply(&[0x51, 0x0A]), Some(0x0A));
        assert_eq!(decode_mode_reply(&[0x51]), None);
    }
}
