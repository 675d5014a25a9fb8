//! 命令定义和实现

pub mod angle;
pub mod config;
pub mod scan;
pub mod velocity;

pub use angle::AngleCommand;
pub use config::ConfigCommand;
pub use scan::ScanCommand;
pub use velocity::VelocityCommand;

use crate::validation::parse_motor_id;
use clap::Args;
use htmotor_driver::{ControllerBuilder, DEFAULT_BITRATE, DEFAULT_INTERFACE, MotorConfig};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// CAN 连接参数
#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// CAN 接口
    #[arg(short, long, default_value = DEFAULT_INTERFACE)]
    pub interface: String,

    /// CAN 波特率
    #[arg(short, long, default_value_t = DEFAULT_BITRATE)]
    pub bitrate: u32,
}

/// 单电机控制参数
#[derive(Args, Debug, Clone)]
pub struct MotorArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// 电机 ID (1-127)
    #[arg(short, long, default_value = "1", value_parser = parse_motor_id)]
    pub motor_id: u8,
}

impl ConnectionArgs {
    pub fn builder(&self, config: &MotorConfig) -> ControllerBuilder {
        ControllerBuilder::new()
            .interface(self.interface.as_str())
            .bitrate(self.bitrate)
            .config(config.clone())
    }
}

/// Ctrl+C 标志（`true` = 继续运行）
#[derive(Debug, Clone)]
pub struct RunFlag(Arc<AtomicBool>);

impl RunFlag {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn stop(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    /// 可中断的等待，被中断返回 `false`
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        while self.is_running() {
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            std::thread::sleep((deadline - now).min(Duration::from_millis(100)));
        }
        false
    }
}

impl Default for RunFlag {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_flag_sleep() {
        let flag = RunFlag::new();
        assert!(flag.sleep(Duration::from_millis(5)));

        let other = flag.clone();
        other.stop();
        assert!(!flag.is_running());
        assert!(!flag.sleep(Duration::from_secs(10)));
    }
}
