//! 流控制指标
//!
//! 原子计数器，流控制线程写入，任意线程读取，不引入锁竞争。

use std::sync::atomic::{AtomicU64, Ordering};

/// 流控制实时指标
///
/// ```rust
/// use htmotor_driver::StreamMetrics;
/// use std::sync::atomic::Ordering;
///
/// let metrics = StreamMetrics::new();
/// metrics.frames_sent.fetch_add(1, Ordering::Relaxed);
/// assert_eq!(metrics.snapshot().frames_sent, 1);
/// ```
#[derive(Debug, Default)]
pub struct StreamMetrics {
    /// 成功发送的 0xAD 帧数
    pub frames_sent: AtomicU64,

    /// 发送失败次数（包括锁毒化）
    pub send_failures: AtomicU64,

    /// 循环执行次数
    pub ticks: AtomicU64,

    /// 超出周期的次数
    ///
    /// 持续增长说明总线或调度跟不上 10ms 周期。
    pub overruns: AtomicU64,
}

impl StreamMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> StreamMetricsSnapshot {
        StreamMetricsSnapshot {
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
            ticks: self.ticks.load(Ordering::Relaxed),
            overruns: self.overruns.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.frames_sent.store(0, Ordering::Relaxed);
        self.send_failures.store(0, Ordering::Relaxed);
        self.ticks.store(0, Ordering::Relaxed);
        self.overruns.store(0, Ordering::Relaxed);
    }
}

/// 指标快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamMetricsSnapshot {
    pub frames_sent: u64,
    pub send_failures: u64,
    pub ticks: u64,
    pub overruns: u64,
}

impl StreamMetricsSnapshot {
    /// 发送失败率（百分比），没有发送尝试时为 0.0
    pub fn failure_rate(&self) -> f64 {
        let attempts = self.frames_sent + self.send_failures;
        if attempts == 0 {
            return 0.0;
        }
        (self.send_failures as f64 / attempts as f64) * 100.0
    }
}
