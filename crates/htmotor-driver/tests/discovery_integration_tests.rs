//! 电机发现集成测试
//!
//! 使用带应答器的 MockCanAdapter 模拟总线上的电机。

use htmotor_can::{MockCanAdapter, MotorFrame};
use htmotor_driver::{
    DiscoveryConfig, DiscoveryResult, DriverError, LinkQuality, MotorDiscovery, ScanPhase,
};
use htmotor_protocol::{MotorMode, ping_id};
use std::ops::ControlFlow;
use std::time::Duration;

fn fast_config() -> DiscoveryConfig {
    DiscoveryConfig {
        scan_gap_ms: 0,
        probe_gap_ms: 0,
        ..DiscoveryConfig::default()
    }
}

/// 模拟电机：回复 ID 的 bit8..14 为源 ID
fn motor_reply(motor_id: u8, data: &[u8]) -> MotorFrame {
    MotorFrame::new_extended((motor_id as u32) << 8, data)
}

/// 只有 `online` 中的电机回复 Ping
fn bus_with_motors(online: &'static [u8], data: &'static [u8]) -> MockCanAdapter {
    MockCanAdapter::new().with_responder(move |frame| {
        online
            .iter()
            .filter(|&&id| frame.id == ping_id(id))
            .map(|&id| (Duration::from_millis(2), motor_reply(id, data)))
            .collect()
    })
}

#[test]
fn test_ping_online_motor_reports_info() {
    let bus = bus_with_motors(&[5], b"QHTMV1.0");
    let mut discovery = MotorDiscovery::with_config(bus.clone(), fast_config());

    let result = discovery.ping_motor(5).unwrap();
    assert!(result.is_online);
    assert_eq!(result.motor_id, 5);
    assert_eq!(result.name.as_deref(), Some("HTM"));
    assert_eq!(result.hardware_version.as_deref(), Some("V1.0"));
    assert!(result.response_time_ms.unwrap() < 50);
    assert_eq!(discovery.phase(), ScanPhase::Matched);

    // Ping 帧本身
    let pings = bus.sent_to(0x8005);
    assert_eq!(pings.len(), 1);
    assert!(pings[0].is_extended);
    assert_eq!(pings[0].data, [0x11, 0x00, 0x50, 0x50, 0x50, 0x50, 0x50, 0x50]);
}

#[test]
fn test_ping_offline_motor() {
    let bus = bus_with_motors(&[5], b"QHTMV1.0");
    let mut discovery = MotorDiscovery::with_config(bus, fast_config());

    let result = discovery.ping_motor(6).unwrap();
    assert!(!result.is_online);
    assert!(result.name.is_none());
    assert!(result.response_time_ms.is_none());
    assert_eq!(discovery.phase(), ScanPhase::TimedOut);
}

#[test]
fn test_reply_without_info_marker() {
    let bus = bus_with_motors(&[3], &[0x21, 0x0A, 0x00, 0x00]);
    let mut discovery = MotorDiscovery::with_config(bus, fast_config());

    let result = discovery.ping_motor(3).unwrap();
    assert!(result.is_online);
    assert!(result.name.is_none());
    assert!(result.hardware_version.is_none());
}

#[test]
fn test_scan_range_in_order() {
    let bus = MockCanAdapter::new();
    let mut discovery = MotorDiscovery::with_config(bus.clone(), fast_config());

    let results = discovery.scan_range(1, 3);
    let ids: Vec<u8> = results.iter().map(|r| r.motor_id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert!(results.iter().all(|r| !r.is_online));
    assert_eq!(bus.sent_frames().len(), 3);
}

#[test]
fn test_scan_range_mixed() {
    let bus = bus_with_motors(&[2, 4], b"QHTMV2.1");
    let mut discovery = MotorDiscovery::with_config(bus, fast_config());

    let mut seen = Vec::new();
    let results = discovery.scan_range_with(1, 5, |r| {
        seen.push(r.motor_id);
        ControlFlow::Continue(())
    });
    let online: Vec<u8> = results.iter().filter(|r| r.is_online).map(|r| r.motor_id).collect();
    assert_eq!(online, vec![2, 4]);
    assert_eq!(seen, vec![1, 2, 3, 4, 5]);
}

#[test]
fn test_scan_range_stops_on_break() {
    let bus = MockCanAdapter::new();
    let mut discovery = MotorDiscovery::with_config(bus.clone(), fast_config());

    let results = discovery.scan_range_with(1, 10, |r| {
        if r.motor_id == 3 {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    });
    let ids: Vec<u8> = results.iter().map(|r| r.motor_id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(bus.sent_frames().len(), 3);
}

/// 单个电机在 `delay` 后回复
fn bus_with_delayed_motor(motor_id: u8, delay: Duration) -> MockCanAdapter {
    MockCanAdapter::new().with_responder(move |frame| {
        if frame.id == ping_id(motor_id) {
            vec![(delay, motor_reply(motor_id, b"QABC"))]
        } else {
            Vec::new()
        }
    })
}

#[test]
fn test_scan_one_online_one_silent() {
    let bus = bus_with_delayed_motor(5, Duration::from_millis(20));
    let mut discovery = MotorDiscovery::with_config(bus, fast_config());

    let results = discovery.scan_range(5, 6);
    assert_eq!(results.len(), 2);

    assert_eq!(results[0].motor_id, 5);
    assert!(results[0].is_online);
    assert_eq!(results[0].name.as_deref(), Some("ABC"));
    let elapsed = results[0].response_time_ms.unwrap();
    assert!((18..=30).contains(&elapsed), "response time {} ms", elapsed);

    assert_eq!(results[1], DiscoveryResult::offline(6));
}

#[test]
fn test_reply_after_window_is_offline() {
    // 55 ms 的回复晚于 50 ms 窗口，也不能被算作电机 6
    let bus = bus_with_delayed_motor(5, Duration::from_millis(55));
    let mut discovery = MotorDiscovery::with_config(bus, fast_config());

    let results = discovery.scan_range(5, 6);
    assert_eq!(results.len(), 2);
    assert_eq!(results[0], DiscoveryResult::offline(5));
    assert_eq!(results[1], DiscoveryResult::offline(6));
}

#[test]
fn test_scan_range_reversed_is_empty() {
    let bus = MockCanAdapter::new();
    let mut discovery = MotorDiscovery::new(bus.clone());
    assert!(discovery.scan_range(5, 1).is_empty());
    assert!(bus.sent_frames().is_empty());
}

#[test]
fn test_scan_continues_after_send_failure() {
    let bus = MockCanAdapter::new();
    bus.set_fail_sends(true);
    let mut discovery = MotorDiscovery::with_config(bus, fast_config());

    assert!(matches!(discovery.ping_motor(1), Err(DriverError::Can(_))));

    let results = discovery.scan_range(1, 2);
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| !r.is_online));
}

#[test]
fn test_unrelated_frames_are_ignored() {
    let bus = MockCanAdapter::new();
    // 源 ID = 7
    bus.inject(MotorFrame::new_extended(0x0700, &[0x51]));
    let mut discovery = MotorDiscovery::with_config(bus.clone(), fast_config());

    assert!(!discovery.ping_motor(5).unwrap().is_online);
    assert_eq!(bus.pending_count(), 0);
}

#[test]
fn test_direct_id_fallback_accepts_foreign_ping() {
    // 源 ID 为 0 时退回低 8 位：其他主机发出的 0x8005 Ping 会被当成电机 5 的回复
    let bus = MockCanAdapter::new();
    bus.inject(MotorFrame::new_extended(0x8005, &[0x11, 0x00]));
    let mut discovery = MotorDiscovery::with_config(bus, fast_config());

    let result = discovery.ping_motor(5).unwrap();
    assert!(result.is_online);
    assert!(result.name.is_none());
}

#[test]
fn test_flush_discards_stale_frames() {
    let bus = MockCanAdapter::new();
    for i in 0..3 {
        bus.inject(motor_reply(9, &[i]));
    }
    let mut discovery = MotorDiscovery::with_config(bus.clone(), fast_config());

    assert_eq!(discovery.flush(), 3);
    assert_eq!(discovery.flush(), 0);
    // 残留的回复不再影响后续 Ping
    assert!(!discovery.ping_motor(9).unwrap().is_online);
}

#[test]
fn test_query_mode() {
    let bus = bus_with_motors(&[4], &[0x21, 0x0A, 0x50, 0x50]);
    let mut discovery = MotorDiscovery::with_config(bus, fast_config());

    let status = discovery.query_mode(4).unwrap().unwrap();
    assert_eq!(status.motor_id, 4);
    assert_eq!(status.can_id, 0x0400);
    assert_eq!(status.mode_raw, Some(0x0A));
    assert_eq!(status.mode, Some(MotorMode::Position));
    assert_eq!(status.data, vec![0x21, 0x0A, 0x50, 0x50]);

    assert!(discovery.query_mode(8).unwrap().is_none());
}

#[test]
fn test_query_mode_unknown_value() {
    let bus = bus_with_motors(&[4], &[0x21, 0x7E]);
    let mut discovery = MotorDiscovery::with_config(bus, fast_config());

    let status = discovery.query_mode(4).unwrap().unwrap();
    assert_eq!(status.mode_raw, Some(0x7E));
    assert!(status.mode.is_none());
}

#[test]
fn test_probe_reliability() {
    let bus = bus_with_motors(&[1], b"QHTMV1.0");
    let mut discovery = MotorDiscovery::with_config(bus.clone(), fast_config());

    let report = discovery.probe_reliability(1, 5);
    assert_eq!(report.attempts, 5);
    assert_eq!(report.successes, 5);
    assert_eq!(report.grade(), LinkQuality::Excellent);
    assert_eq!(bus.sent_to(0x8001).len(), 5);

    let report = discovery.probe_reliability(2, 3);
    assert_eq!(report.successes, 0);
    assert_eq!(report.grade(), LinkQuality::Poor);
}

#[test]
fn test_probe_counts_send_failures() {
    let bus = bus_with_motors(&[1], b"QHTMV1.0");
    bus.fail_sends_after(2);
    let mut discovery = MotorDiscovery::with_config(bus.clone(), fast_config());

    let report = discovery.probe_reliability(1, 4);
    assert_eq!(report.attempts, 4);
    assert_eq!(report.successes, 2);
    assert_eq!(bus.send_attempts(), 4);
}
