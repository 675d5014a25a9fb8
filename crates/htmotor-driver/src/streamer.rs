//! 速度流控制
//!
//! 后台线程以固定周期（默认 10ms）发送 0xAD 速度帧。目标速度/加速度
//! 保存在原子变量中，前台随时更新，下一个周期生效。
//!
//! # 制动规则
//!
//! 每个周期都重新判断：目标速度恰好为 0.0 时，实际发送的加速度替换为
//! `max_brake_acc`。非零目标速度时原样发送用户设置的加速度。
//!
//! # 发送失败
//!
//! 帧是 fire-and-forget 的，发送失败只计数并限频记录日志，不会中止循环。
//! 只有 `stop()` 能结束循环。

use crate::bus::{SharedBus, send_on};
use crate::metrics::{StreamMetrics, StreamMetricsSnapshot};
use htmotor_can::{CanAdapter, MotorFrame};
use htmotor_protocol::velocity_stream_frame;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// 连续失败时每隔多少次记录一次日志
const FAILURE_LOG_INTERVAL: u64 = 100;

/// f64 的原子封装（按位存储在 `AtomicU64` 中）
#[derive(Debug, Default)]
pub struct AtomicF64 {
    bits: AtomicU64,
}

impl AtomicF64 {
    pub fn new(value: f64) -> Self {
        Self {
            bits: AtomicU64::new(value.to_bits()),
        }
    }

    pub fn load(&self, ordering: Ordering) -> f64 {
        f64::from_bits(self.bits.load(ordering))
    }

    pub fn store(&self, value: f64, ordering: Ordering) {
        self.bits.store(value.to_bits(), ordering);
    }
}

/// 前台与流控制线程共享的目标值
#[derive(Debug, Default)]
struct StreamTargets {
    velocity: AtomicF64,
    acceleration: AtomicF64,
}

/// 制动规则：目标速度为 0.0 时使用最大制动加速度
pub fn effective_acceleration(velocity: f64, acceleration: f64, max_brake_acc: f64) -> f64 {
    if velocity == 0.0 {
        max_brake_acc
    } else {
        acceleration
    }
}

/// 按制动规则构建一个周期的 0xAD 帧
pub fn stream_frame(velocity: f64, acceleration: f64, max_brake_acc: f64) -> MotorFrame {
    velocity_stream_frame(
        velocity,
        effective_acceleration(velocity, acceleration, max_brake_acc),
    )
}

/// 流控制状态（只读快照）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamStatus {
    pub target_velocity: f64,
    pub target_acceleration: f64,
    /// 应用制动规则后实际发送的加速度
    pub effective_acceleration: f64,
    pub running: bool,
    pub metrics: StreamMetricsSnapshot,
}

/// 速度流控制器
///
/// 每个控制器至多一个流控制线程。`Drop` 时自动停止并等待线程退出。
pub struct CommandStreamer<A: CanAdapter + Send + 'static> {
    bus: SharedBus<A>,
    targets: Arc<StreamTargets>,
    metrics: Arc<StreamMetrics>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    period: Duration,
    max_brake_acc: f64,
}

impl<A: CanAdapter + Send + 'static> CommandStreamer<A> {
    pub fn new(bus: SharedBus<A>, period: Duration, max_brake_acc: f64) -> Self {
        Self {
            bus,
            targets: Arc::new(StreamTargets::default()),
            metrics: Arc::new(StreamMetrics::new()),
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
            period,
            max_brake_acc,
        }
    }

    /// 更新目标（原子写入，下一个周期生效）
    pub fn set_target(&self, velocity: f64, acceleration: f64) {
        self.targets.velocity.store(velocity, Ordering::Relaxed);
        self.targets.acceleration.store(acceleration, Ordering::Relaxed);
    }

    pub fn set_velocity(&self, velocity: f64) {
        self.targets.velocity.store(velocity, Ordering::Relaxed);
    }

    pub fn set_acceleration(&self, acceleration: f64) {
        self.targets.acceleration.store(acceleration, Ordering::Relaxed);
    }

    /// 当前目标 `(velocity, acceleration)`
    pub fn target(&self) -> (f64, f64) {
        (
            self.targets.velocity.load(Ordering::Relaxed),
            self.targets.acceleration.load(Ordering::Relaxed),
        )
    }

    pub fn max_brake_acc(&self) -> f64 {
        self.max_brake_acc
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn metrics(&self) -> Arc<StreamMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn status(&self) -> StreamStatus {
        let (velocity, acceleration) = self.target();
        StreamStatus {
            target_velocity: velocity,
            target_acceleration: acceleration,
            effective_acceleration: effective_acceleration(
                velocity,
                acceleration,
                self.max_brake_acc,
            ),
            running: self.is_running(),
            metrics: self.metrics.snapshot(),
        }
    }

    /// 启动流控制线程（已运行时不做任何事）
    pub fn start(&mut self) {
        if self.handle.is_some() {
            return;
        }

        self.running.store(true, Ordering::Release);
        let bus = Arc::clone(&self.bus);
        let targets = Arc::clone(&self.targets);
        let metrics = Arc::clone(&self.metrics);
        let running = Arc::clone(&self.running);
        let period = self.period;
        let max_brake_acc = self.max_brake_acc;

        self.handle = Some(thread::spawn(move || {
            stream_loop(bus, targets, metrics, running, period, max_brake_acc);
        }));
        debug!("Command streamer started (period {:?})", self.period);
    }

    /// 停止流控制线程并等待其退出
    ///
    /// 返回后不会再有帧被发送。未运行时不做任何事。
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Command streamer thread panicked");
            }
            debug!("Command streamer stopped");
        }
    }
}

impl<A: CanAdapter + Send + 'static> Drop for CommandStreamer<A> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn stream_loop<A: CanAdapter>(
    bus: SharedBus<A>,
    targets: Arc<StreamTargets>,
    metrics: Arc<StreamMetrics>,
    running: Arc<AtomicBool>,
    period: Duration,
    max_brake_acc: f64,
) {
    // 绝对时间锚点，消除累积漂移
    let mut next_tick = Instant::now();
    let mut consecutive_failures: u64 = 0;

    while running.load(Ordering::Acquire) {
        next_tick += period;
        metrics.ticks.fetch_add(1, Ordering::Relaxed);

        let velocity = targets.velocity.load(Ordering::Relaxed);
        let acceleration = targets.acceleration.load(Ordering::Relaxed);
        let frame = stream_frame(velocity, acceleration, max_brake_acc);

        match send_on(&bus, frame) {
            Ok(()) => {
                metrics.frames_sent.fetch_add(1, Ordering::Relaxed);
                if consecutive_failures > 0 {
                    debug!(
                        "Stream send recovered after {} failures",
                        consecutive_failures
                    );
                }
                consecutive_failures = 0;
                trace!("stream tick: vel={} acc={}", velocity, acceleration);
            },
            Err(e) => {
                metrics.send_failures.fetch_add(1, Ordering::Relaxed);
                consecutive_failures += 1;
                if consecutive_failures == 1 || consecutive_failures % FAILURE_LOG_INTERVAL == 0 {
                    warn!(
                        "Stream send failed ({} consecutive): {}",
                        consecutive_failures, e
                    );
                }
            },
        }

        let now = Instant::now();
        if next_tick > now {
            spin_sleep::sleep(next_tick - now);
        } else {
            metrics.overruns.fetch_add(1, Ordering::Relaxed);
            trace!(
                "Stream loop overrun by {:?}, resetting anchor",
                now.duration_since(next_tick)
            );
            next_tick = now;
        }
    }
}
