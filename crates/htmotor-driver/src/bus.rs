//! 共享 CAN 总线
//!
//! 前台线程和流控制线程通过 `Arc<Mutex<A>>` 共享同一个适配器。

use crate::error::DriverError;
use htmotor_can::{CanAdapter, MotorFrame};
use std::sync::{Arc, Mutex};

/// 线程间共享的适配器
pub type SharedBus<A> = Arc<Mutex<A>>;

pub fn shared<A: CanAdapter>(adapter: A) -> SharedBus<A> {
    Arc::new(Mutex::new(adapter))
}

/// 加锁并发送一帧
pub(crate) fn send_on<A: CanAdapter>(bus: &Mutex<A>, frame: MotorFrame) -> Result<(), DriverError> {
    let mut adapter = bus.lock().map_err(|_| DriverError::PoisonedLock)?;
    adapter.send(frame)?;
    Ok(())
}
