//! # HTMotor Driver
//!
//! 高扭矩电机的驱动层，建立在 `htmotor-can` 适配器之上：
//!
//! - 电机发现（Ping 扫描、模式查询、通信可靠性测试）
//! - 使能/失能生命周期
//! - 位置模式：0x90 帧突发发送
//! - 速度模式：后台线程以固定周期发送 0xAD 帧（带制动规则）
//! - TOML 配置文件
//!
//! # 快速开始
//!
//! ```rust
//! use htmotor_can::MockCanAdapter;
//! use htmotor_driver::{ControlMode, ControllerBuilder};
//!
//! let bus = MockCanAdapter::new();
//! let controller = ControllerBuilder::new()
//!     .motor_id(1)
//!     .mode(ControlMode::Velocity)
//!     .build_with_adapter(bus.clone())
//!     .unwrap();
//! controller.set_velocity(0.5).unwrap();
//! assert_eq!(controller.stream_status().unwrap().target_velocity, 0.5);
//! ```

pub mod bus;
mod builder;
pub mod config;
mod controller;
pub mod discovery;
mod error;
pub mod lifecycle;
pub mod metrics;
pub mod streamer;

pub use builder::{ControllerBuilder, DEFAULT_BITRATE, DEFAULT_INTERFACE};
pub use bus::SharedBus;
pub use config::{DiscoveryConfig, MotorConfig, PositionConfig, TimingConfig, VelocityConfig};
pub use controller::{BurstReport, ControlMode, MotionController};
pub use discovery::{
    DiscoveryResult, LinkQuality, MotorDiscovery, MotorStatus, ReliabilityReport, ScanPhase,
};
pub use error::DriverError;
pub use lifecycle::{MotorHandle, MotorState};
pub use metrics::{StreamMetrics, StreamMetricsSnapshot};
pub use streamer::{CommandStreamer, StreamStatus};
