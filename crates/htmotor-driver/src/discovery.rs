//! 电机发现
//!
//! 向 `0x8000 | id` 发送读寄存器请求，在固定窗口内等待回复，
//! 并用回复帧的仲裁 ID 判断是否来自目标电机。
//!
//! # 回复关联
//!
//! ```text
//! raw_id    = id & 0x1FFFFFFF
//! source_id = (raw_id >> 8) & 0x7F   // 优先，取值须在 (0, 128)
//! direct_id = raw_id & 0xFF          // 退回
//! ```
//!
//! 已知限制：退回规则下，任何低 8 位等于目标 ID 的帧都会被接受，
//! 包括总线上其他节点回环的 Ping 请求本身（`0x8005` → 5）。

use crate::config::DiscoveryConfig;
use crate::error::DriverError;
use htmotor_can::{CanAdapter, CanError, MotorFrame};
use htmotor_protocol::{MotorMode, ReplyId, decode_discovery_reply, decode_mode_reply, ping_frame};
use serde::Serialize;
use std::ops::ControlFlow;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// 单个 ID 的发现结果（创建后不可变）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveryResult {
    pub motor_id: u8,
    pub is_online: bool,
    pub name: Option<String>,
    pub hardware_version: Option<String>,
    /// 从发送 Ping 到收到匹配回复的时间
    pub response_time_ms: Option<u64>,
}

impl DiscoveryResult {
    pub fn offline(motor_id: u8) -> Self {
        Self {
            motor_id,
            is_online: false,
            name: None,
            hardware_version: None,
            response_time_ms: None,
        }
    }

    fn online(motor_id: u8, frame: &MotorFrame, elapsed: Duration) -> Self {
        let reply = decode_discovery_reply(frame.data_slice());
        Self {
            motor_id,
            is_online: true,
            name: reply.name,
            hardware_version: reply.hardware_version,
            response_time_ms: Some(elapsed.as_millis() as u64),
        }
    }
}

/// 单个 ID 的扫描阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanPhase {
    #[default]
    Idle,
    PingSent,
    Matched,
    TimedOut,
}

/// 模式查询结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MotorStatus {
    pub motor_id: u8,
    /// 回复帧的仲裁 ID
    pub can_id: u32,
    pub data: Vec<u8>,
    /// 回复 Byte 1
    pub mode_raw: Option<u8>,
    pub mode: Option<MotorMode>,
}

/// 通信质量评级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LinkQuality {
    /// ≥ 90%
    Excellent,
    /// ≥ 70%
    Fair,
    Poor,
}

impl std::fmt::Display for LinkQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            LinkQuality::Excellent => "excellent",
            LinkQuality::Fair => "fair",
            LinkQuality::Poor => "poor",
        };
        f.write_str(text)
    }
}

/// 可靠性测试结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReliabilityReport {
    pub motor_id: u8,
    pub attempts: u32,
    pub successes: u32,
}

impl ReliabilityReport {
    pub fn percent(&self) -> f64 {
        if self.attempts == 0 {
            return 0.0;
        }
        self.successes as f64 / self.attempts as f64 * 100.0
    }

    pub fn grade(&self) -> LinkQuality {
        let percent = self.percent();
        if percent >= 90.0 {
            LinkQuality::Excellent
        } else if percent >= 70.0 {
            LinkQuality::Fair
        } else {
            LinkQuality::Poor
        }
    }
}

/// 回复是否来自 `motor_id`
pub fn reply_matches(frame_id: u32, motor_id: u8) -> bool {
    ReplyId::parse(frame_id).detected_id() == motor_id
}

/// 电机发现器（独占适配器）
pub struct MotorDiscovery<A: CanAdapter> {
    adapter: A,
    config: DiscoveryConfig,
    phase: ScanPhase,
}

impl<A: CanAdapter> MotorDiscovery<A> {
    pub fn new(adapter: A) -> Self {
        Self::with_config(adapter, DiscoveryConfig::default())
    }

    pub fn with_config(adapter: A, config: DiscoveryConfig) -> Self {
        Self {
            adapter,
            config,
            phase: ScanPhase::Idle,
        }
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// 最近一次 Ping 的阶段
    pub fn phase(&self) -> ScanPhase {
        self.phase
    }

    /// 丢弃接收缓冲区中的残留帧，返回丢弃数量
    pub fn flush(&mut self) -> usize {
        let mut drained = 0;
        while let Ok(Some(frame)) = self.adapter.try_receive() {
            trace!("flushed stale frame ID=0x{:X}", frame.id);
            drained += 1;
        }
        if drained > 0 {
            debug!("Flushed {} stale frames", drained);
        }
        drained
    }

    /// 发送 Ping 并在 `window` 内等待匹配回复
    ///
    /// 返回匹配帧和从发送开始的耗时；窗口耗尽返回 `None`。
    fn ping_and_wait(
        &mut self,
        motor_id: u8,
        window: Duration,
        poll: Duration,
    ) -> Result<Option<(MotorFrame, Duration)>, DriverError> {
        self.phase = ScanPhase::Idle;
        self.adapter.send(ping_frame(motor_id))?;
        let sent_at = Instant::now();
        self.phase = ScanPhase::PingSent;

        loop {
            let elapsed = sent_at.elapsed();
            if elapsed >= window {
                break;
            }
            let timeout = poll.min(window - elapsed);

            match self.adapter.receive_timeout(timeout) {
                Ok(frame) if reply_matches(frame.id, motor_id) => {
                    self.phase = ScanPhase::Matched;
                    return Ok(Some((frame, sent_at.elapsed())));
                },
                Ok(frame) => {
                    trace!(
                        "Ignoring frame ID=0x{:X} while waiting for motor {}",
                        frame.id, motor_id
                    );
                },
                Err(CanError::Timeout) => {},
                Err(e) => {
                    // 接收错误视为本次轮询无帧
                    debug!("Receive error while waiting for motor {}: {}", motor_id, e);
                    std::thread::sleep(timeout);
                },
            }
        }

        self.phase = ScanPhase::TimedOut;
        Ok(None)
    }

    /// Ping 单个电机
    ///
    /// 无回复不是错误，返回 `is_online == false` 的结果。
    /// 发送失败返回 `DriverError::Can`。
    pub fn ping_motor(&mut self, motor_id: u8) -> Result<DiscoveryResult, DriverError> {
        let window = self.config.response_window();
        let poll = self.config.poll_timeout();
        let result = match self.ping_and_wait(motor_id, window, poll)? {
            Some((frame, elapsed)) => DiscoveryResult::online(motor_id, &frame, elapsed),
            None => DiscoveryResult::offline(motor_id),
        };
        debug!(
            "Motor {}: {}",
            motor_id,
            if result.is_online { "online" } else { "offline" }
        );
        Ok(result)
    }

    /// 按顺序扫描 `[start_id, end_id]`
    ///
    /// `start_id > end_id` 返回空列表。发送失败的 ID 记为离线并继续。
    pub fn scan_range(&mut self, start_id: u8, end_id: u8) -> Vec<DiscoveryResult> {
        self.scan_range_with(start_id, end_id, |_| ControlFlow::Continue(()))
    }

    /// 同 [`scan_range`](Self::scan_range)，每得到一个结果回调一次（用于进度显示）
    ///
    /// 回调返回 `ControlFlow::Break` 时提前结束，只返回已扫描的结果。
    pub fn scan_range_with<F>(&mut self, start_id: u8, end_id: u8, mut on_result: F) -> Vec<DiscoveryResult>
    where
        F: FnMut(&DiscoveryResult) -> ControlFlow<()>,
    {
        if start_id > end_id {
            return Vec::new();
        }

        let gap = self.config.scan_gap();
        let mut results = Vec::with_capacity((end_id - start_id) as usize + 1);
        for motor_id in start_id..=end_id {
            let result = self.ping_motor(motor_id).unwrap_or_else(|e| {
                warn!("Ping to motor {} failed: {}", motor_id, e);
                DiscoveryResult::offline(motor_id)
            });
            let flow = on_result(&result);
            results.push(result);
            if flow.is_break() {
                info!("Scan stopped early after motor {}", motor_id);
                break;
            }

            if motor_id != end_id {
                std::thread::sleep(gap);
            }
        }

        let online = results.iter().filter(|r| r.is_online).count();
        info!(
            "Scan {}..={} finished: {} online of {}",
            start_id,
            end_id,
            online,
            results.len()
        );
        results
    }

    /// 查询电机当前模式
    ///
    /// 窗口内无回复返回 `Ok(None)`。
    pub fn query_mode(&mut self, motor_id: u8) -> Result<Option<MotorStatus>, DriverError> {
        let window = self.config.query_window();
        let poll = self.config.query_poll();
        Ok(self.ping_and_wait(motor_id, window, poll)?.map(|(frame, _)| {
            let mode_raw = decode_mode_reply(frame.data_slice());
            MotorStatus {
                motor_id,
                can_id: frame.id,
                data: frame.data_slice().to_vec(),
                mode_raw,
                mode: mode_raw.and_then(MotorMode::from_raw),
            }
        }))
    }

    /// 通信可靠性测试：重复 Ping `attempts` 次
    ///
    /// 发送失败计为一次失败，不中止测试。
    pub fn probe_reliability(&mut self, motor_id: u8, attempts: u32) -> ReliabilityReport {
        let window = self.config.probe_window();
        let poll = self.config.poll_timeout().min(window);
        let gap = self.config.probe_gap();

        let mut successes = 0;
        for attempt in 0..attempts {
            match self.ping_and_wait(motor_id, window, poll) {
                Ok(Some(_)) => successes += 1,
                Ok(None) => trace!("Probe {} to motor {}: no reply", attempt + 1, motor_id),
                Err(e) => warn!("Probe {} to motor {} failed: {}", attempt + 1, motor_id, e),
            }
            if attempt + 1 < attempts {
                std::thread::sleep(gap);
            }
        }

        let report = ReliabilityReport {
            motor_id,
            attempts,
            successes,
        };
        info!(
            "Motor {} reliability: {}/{} ({:.0}%, {})",
            motor_id,
            successes,
            attempts,
            report.percent(),
            report.grade()
        );
        report
    }
}
