//! 定标的属性测试
//!
//! 使用 proptest 验证量化往返、饱和和哨兵位置。

use htmotor_protocol::*;
use proptest::prelude::*;

/// 一个量化步长（度）
const POS_STEP_DEG: f64 = DEGREES_PER_TURN / FACTOR_POS;

proptest! {
    /// 范围内的角度往返误差不超过一个量化步长
    #[test]
    fn position_roundtrip_within_one_step(deg in -1179.0..1179.0f64) {
        let back = position_to_degrees(degrees_to_position(deg));
        prop_assert!((deg - back).abs() <= POS_STEP_DEG + 1e-9);
    }

    #[test]
    fn velocity_roundtrip_within_one_step(rps in -8.19..8.19f64) {
        let back = velocity_to_rps(rps_to_velocity(rps));
        prop_assert!((rps - back).abs() <= 1.0 / FACTOR_VEL + 1e-12);
    }

    #[test]
    fn acceleration_roundtrip_within_one_step(acc in -32.7..32.7f64) {
        let back = acceleration_to_rps2(rps2_to_acceleration(acc));
        prop_assert!((acc - back).abs() <= 1.0 / FACTOR_ACC + 1e-12);
    }

    #[test]
    fn torque_roundtrip_within_one_step(nm in -163.0..163.0f64) {
        let back = torque_to_nm(nm_to_torque(nm));
        prop_assert!((nm - back).abs() <= 1.0 / FACTOR_TQE + 1e-12);
    }

    /// 超出范围的值饱和到边界，符号不翻转
    #[test]
    fn out_of_range_saturates(v in 1.0e3..1.0e12f64) {
        prop_assert_eq!(rps_to_velocity(v), i16::MAX);
        prop_assert_eq!(rps_to_velocity(-v), i16::MIN);
        prop_assert_eq!(rps2_to_acceleration(v), i16::MAX);
        prop_assert_eq!(rps2_to_acceleration(-v), i16::MIN);
        prop_assert_eq!(nm_to_torque(v * 1.0e3), i16::MAX);
        prop_assert_eq!(nm_to_torque(-v * 1.0e3), i16::MIN);
    }

    /// 位置编码永远不会产生哨兵值
    #[test]
    fn position_never_sentinel(deg in proptest::num::f64::ANY) {
        prop_assert_ne!(degrees_to_position(deg), MAGIC_POS);
    }

    /// 位置下界是 -32767 而不是 -32768，-32768 留给哨兵
    #[test]
    fn position_saturates_above_sentinel(v in 1.0e4..1.0e12f64) {
        prop_assert_eq!(degrees_to_position(v), i16::MAX);
        prop_assert_eq!(degrees_to_position(-v), MIN_POSITION_RAW);
        prop_assert_eq!(MIN_POSITION_RAW, -32767);
    }

    /// 0x90 帧的位置字段永远不是哨兵，0xAD 速度帧的位置字段永远是哨兵
    #[test]
    fn sentinel_only_in_velocity_stream(
        deg in -1.0e6..1.0e6f64,
        vel in -100.0..100.0f64,
        acc in -100.0..100.0f64,
    ) {
        let angle = decode_stream(&encode_stream_90(deg, vel, acc)).unwrap();
        prop_assert!(!angle.is_velocity_only());

        let velocity = decode_stream(&encode_velocity_stream(vel, acc)).unwrap();
        prop_assert!(velocity.is_velocity_only());
    }

    /// 寄存器写入值按 f32 小端原样传输
    #[test]
    fn register_value_preserved(reg in any::<u8>(), value in -1.0e6f32..1.0e6f32) {
        let data = encode_register_write(reg, value);
        prop_assert_eq!(data[0], CMD_WRITE_F32);
        prop_assert_eq!(data[1], reg);
        prop_assert_eq!(bytes_to_f32_le([data[2], data[3], data[4], data[5]]), value);
        prop_assert_eq!(&data[6..8], &[PAD, PAD]);
    }

    /// 发现回复解析是全函数
    #[test]
    fn discovery_reply_never_panics(payload in proptest::collection::vec(any::<u8>(), 0..8)) {
        let reply = decode_discovery_reply(&payload);
        if let Some(name) = reply.name {
            prop_assert!(name.is_ascii() && !name.is_empty() && name.len() <= 3);
        }
        if let Some(version) = reply.hardware_version {
            prop_assert!(version.is_ascii() && !version.is_empty() && version.len() <= 4);
        }
    }
}

#[test]
fn angle_stream_matches_scaled_command() {
    let cmd = PhysicalCommand {
        position_deg: 90.0,
        velocity_rps: 2.0,
        acceleration_rps2: 0.0,
        torque_nm: 3.0,
    };
    let scaled = ScaledCommand::angle_stream(&cmd);
    assert_eq!(
        encode_stream_90(cmd.position_deg, cmd.velocity_rps, cmd.torque_nm),
        encode_stream_ad(scaled.pos, scaled.vel, scaled.acc_or_tqe)
    );
}
