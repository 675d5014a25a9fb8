//! Mock CAN 总线
//!
//! 内存中的 CAN 适配器，用于在没有硬件的情况下测试上层逻辑。
//!
//! - 记录所有发送的帧（带发送时间）
//! - 可注入接收帧，支持延迟到达
//! - 可挂载应答器：根据发送的帧自动生成（延迟的）回复
//! - 可模拟发送失败
//!
//! `MockCanAdapter` 可以 `clone()`，所有副本共享同一条总线，
//! 测试代码保留一个副本用于检查，另一个交给被测对象。

use crate::{CanAdapter, CanError, MotorFrame};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::trace;

/// 应答器：根据发送的帧返回 `(延迟, 回复帧)` 列表
pub type Responder = Box<dyn FnMut(&MotorFrame) -> Vec<(Duration, MotorFrame)> + Send>;

/// 已发送帧的记录
#[derive(Debug, Clone, Copy)]
pub struct SentFrame {
    pub frame: MotorFrame,
    pub at: Instant,
}

#[derive(Default)]
struct BusState {
    sent: Vec<SentFrame>,
    /// 待接收的帧（到达时间, 帧）
    pending: Vec<(Instant, MotorFrame)>,
    responder: Option<Responder>,
    fail_sends: bool,
    /// 剩余多少次发送成功后开始失败
    fail_after: Option<usize>,
    send_attempts: usize,
}

/// 内存 CAN 适配器
#[derive(Clone)]
pub struct MockCanAdapter {
    state: Arc<Mutex<BusState>>,
    read_timeout: Duration,
}

impl Default for MockCanAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockCanAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockCanAdapter")
            .field("read_timeout", &self.read_timeout)
            .finish_non_exhaustive()
    }
}

impl MockCanAdapter {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(BusState::default())),
            read_timeout: Duration::from_millis(10),
        }
    }

    /// 挂载应答器（替换已有的）
    pub fn with_responder<F>(self, responder: F) -> Self
    where
        F: FnMut(&MotorFrame) -> Vec<(Duration, MotorFrame)> + Send + 'static,
    {
        self.lock().responder = Some(Box::new(responder));
        self
    }

    /// 立即可接收的帧
    pub fn inject(&self, frame: MotorFrame) {
        self.inject_after(Duration::ZERO, frame);
    }

    /// 延迟 `delay` 后可接收的帧
    pub fn inject_after(&self, delay: Duration, frame: MotorFrame) {
        self.lock().pending.push((Instant::now() + delay, frame));
    }

    /// 让所有后续发送失败（或恢复）
    pub fn set_fail_sends(&self, fail: bool) {
        let mut state = self.lock();
        state.fail_sends = fail;
        state.fail_after = None;
    }

    /// 接下来 `successes` 次发送成功，之后全部失败
    pub fn fail_sends_after(&self, successes: usize) {
        let mut state = self.lock();
        state.fail_sends = false;
        state.fail_after = Some(successes);
    }

    /// 所有成功发送的帧
    pub fn sent_frames(&self) -> Vec<SentFrame> {
        self.lock().sent.clone()
    }

    /// 发送到指定 ID 的帧
    pub fn sent_to(&self, id: u32) -> Vec<MotorFrame> {
        self.lock()
            .sent
            .iter()
            .filter(|s| s.frame.id == id)
            .map(|s| s.frame)
            .collect()
    }

    /// 发送尝试次数（包括失败的）
    pub fn send_attempts(&self) -> usize {
        self.lock().send_attempts
    }

    pub fn clear_sent(&self) {
        self.lock().sent.clear();
    }

    /// 尚未被接收的帧数量（包括未到达的）
    pub fn pending_count(&self) -> usize {
        self.lock().pending.len()
    }

    fn lock(&self) -> MutexGuard<'_, BusState> {
        // 测试辅助：持锁线程 panic 时继续使用内部状态
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 取出最早到达且已到期的帧；否则返回下一帧的到达时间
    fn pop_due(&self, now: Instant) -> Result<MotorFrame, Option<Instant>> {
        let mut state = self.lock();
        let earliest = state
            .pending
            .iter()
            .enumerate()
            .min_by_key(|(_, (due, _))| *due)
            .map(|(index, (due, _))| (index, *due));

        match earliest {
            Some((index, due)) if due <= now => Ok(state.pending.remove(index).1),
            Some((_, due)) => Err(Some(due)),
            None => Err(None),
        }
    }
}

impl CanAdapter for MockCanAdapter {
    fn send(&mut self, frame: MotorFrame) -> Result<(), CanError> {
        let mut state = self.lock();
        state.send_attempts += 1;

        if state.fail_sends {
            return Err(CanError::Io(std::io::Error::other("mock send failure")));
        }
        if let Some(remaining) = state.fail_after.as_mut() {
            if *remaining == 0 {
                return Err(CanError::Io(std::io::Error::other("mock send failure")));
            }
            *remaining -= 1;
        }

        let now = Instant::now();
        state.sent.push(SentFrame { frame, at: now });
        trace!("mock sent: ID=0x{:X}, len={}", frame.id, frame.len);

        let replies = match state.responder.as_mut() {
            Some(responder) => responder(&frame),
            None => Vec::new(),
        };
        for (delay, reply) in replies {
            state.pending.push((now + delay, reply));
        }
        Ok(())
    }

    fn receive(&mut self) -> Result<MotorFrame, CanError> {
        let deadline = Instant::now() + self.read_timeout;
        loop {
            let now = Instant::now();
            let next_due = match self.pop_due(now) {
                Ok(frame) => return Ok(frame),
                Err(next_due) => next_due,
            };
            if now >= deadline {
                return Err(CanError::Timeout);
            }
            // 以 1ms 粒度等待，期间其他线程可能注入新帧
            let wake = next_due.map_or(deadline, |due| due.min(deadline));
            let nap = wake.saturating_duration_since(now).min(Duration::from_millis(1));
            std::thread::sleep(nap.max(Duration::from_micros(100)));
        }
    }

    fn set_receive_timeout(&mut self, timeout: Duration) {
        self.read_timeout = timeout;
    }

    fn receive_timeout(&mut self, timeout: Duration) -> Result<MotorFrame, CanError> {
        let old_timeout = self.read_timeout;
        self.read_timeout = timeout;
        let result = self.receive();
        self.read_timeout = old_timeout;
        result
    }
}
