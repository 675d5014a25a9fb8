//! Builder 模式实现
//!
//! 提供链式构造 `MotionController` / `MotorDiscovery` 的便捷方式。

use crate::config::MotorConfig;
use crate::controller::{ControlMode, MotionController};
use crate::discovery::MotorDiscovery;
use crate::error::DriverError;
use htmotor_can::CanAdapter;
#[cfg(target_os = "linux")]
use htmotor_can::SocketCanAdapter;
use tracing::info;

/// 默认 CAN 接口
pub const DEFAULT_INTERFACE: &str = "can0";

/// 默认波特率（1 Mbps）
pub const DEFAULT_BITRATE: u32 = 1_000_000;

/// 控制器 Builder（链式构造）
///
/// # Example
///
/// ```no_run
/// use htmotor_driver::{ControlMode, ControllerBuilder};
///
/// let mut controller = ControllerBuilder::new()
///     .interface("can0")
///     .motor_id(1)
///     .mode(ControlMode::Position)
///     .build()
///     .unwrap();
/// controller.enable().unwrap();
/// controller.set_angle(90.0).unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct ControllerBuilder {
    interface: Option<String>,
    bitrate: Option<u32>,
    motor_id: u8,
    mode: ControlMode,
    config: Option<MotorConfig>,
}

impl Default for ControllerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ControllerBuilder {
    pub fn new() -> Self {
        Self {
            interface: None,
            bitrate: None,
            motor_id: 1,
            mode: ControlMode::Position,
            config: None,
        }
    }

    /// CAN 接口名称（默认 "can0"）
    pub fn interface(mut self, interface: impl Into<String>) -> Self {
        self.interface = Some(interface.into());
        self
    }

    /// 期望的波特率（SocketCAN 下由系统配置，这里只做记录）
    pub fn bitrate(mut self, bitrate: u32) -> Self {
        self.bitrate = Some(bitrate);
        self
    }

    pub fn motor_id(mut self, motor_id: u8) -> Self {
        self.motor_id = motor_id;
        self
    }

    pub fn mode(mut self, mode: ControlMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn config(mut self, config: MotorConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn interface_name(&self) -> &str {
        self.interface.as_deref().unwrap_or(DEFAULT_INTERFACE)
    }

    /// 使用任意适配器构建控制器
    pub fn build_with_adapter<A>(self, adapter: A) -> Result<MotionController<A>, DriverError>
    where
        A: CanAdapter + Send + 'static,
    {
        MotionController::new(
            adapter,
            self.motor_id,
            self.mode,
            self.config.unwrap_or_default(),
        )
    }

    /// 使用任意适配器构建发现器
    pub fn build_discovery_with_adapter<A: CanAdapter>(self, adapter: A) -> MotorDiscovery<A> {
        MotorDiscovery::with_config(adapter, self.config.unwrap_or_default().discovery)
    }

    #[cfg(target_os = "linux")]
    fn open_socketcan(&self) -> Result<SocketCanAdapter, DriverError> {
        let interface = self.interface_name();
        let mut adapter = SocketCanAdapter::new(interface)?;
        adapter.configure(self.bitrate.unwrap_or(DEFAULT_BITRATE))?;
        info!("Opened SocketCAN interface '{}'", interface);
        Ok(adapter)
    }

    /// 打开 SocketCAN 接口并构建控制器
    #[cfg(target_os = "linux")]
    pub fn build(self) -> Result<MotionController<SocketCanAdapter>, DriverError> {
        let adapter = self.open_socketcan()?;
        self.build_with_adapter(adapter)
    }

    /// 打开 SocketCAN 接口并构建发现器
    #[cfg(target_os = "linux")]
    pub fn build_discovery(self) -> Result<MotorDiscovery<SocketCanAdapter>, DriverError> {
        let adapter = self.open_socketcan()?;
        Ok(self.build_discovery_with_adapter(adapter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use htmotor_can::MockCanAdapter;

    #[test]
    fn test_builder_defaults() {
        let builder = ControllerBuilder::new();
        assert_eq!(builder.interface_name(), "can0");
        let controller = builder.build_with_adapter(MockCanAdapter::new()).unwrap();
        assert_eq!(controller.motor_id(), 1);
        assert_eq!(controller.mode(), ControlMode::Position);
    }

    #[test]
    fn test_builder_chain() {
        let mut config = MotorConfig::default();
        config.velocity.max_brake_acceleration_rps2 = 20.0;
        config.discovery.scan_gap_ms = 0;

        let builder = ControllerBuilder::new()
            .interface("vcan0")
            .bitrate(500_000)
            .motor_id(7)
            .mode(ControlMode::Velocity)
            .config(config);
        assert_eq!(builder.interface_name(), "vcan0");

        let discovery = builder.clone().build_discovery_with_adapter(MockCanAdapter::new());
        assert_eq!(discovery.config().scan_gap_ms, 0);

        let controller = builder.build_with_adapter(MockCanAdapter::new()).unwrap();
        assert_eq!(controller.motor_id(), 7);
        assert_eq!(controller.stream_status().unwrap().effective_acceleration, 20.0);
    }

    #[test]
    fn test_builder_invalid_motor_id() {
        let result = ControllerBuilder::new()
            .motor_id(200)
            .build_with_adapter(MockCanAdapter::new());
        assert!(matches!(result, Err(DriverError::Protocol(_))));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_build_missing_interface() {
        let result = ControllerBuilder::new().interface("htm_missing0").build();
        assert!(matches!(result, Err(DriverError::Can(_))));
    }
}
