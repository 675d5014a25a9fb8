//! 电机控制配置
//!
//! 所有字段都有默认值，TOML 文件中只需写出要覆盖的部分：
//!
//! ```toml
//! [position]
//! kp = 1.2
//!
//! [velocity]
//! max_brake_acceleration_rps2 = 25.0
//! ```

use crate::error::DriverError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// 电机控制配置
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MotorConfig {
    pub position: PositionConfig,
    pub velocity: VelocityConfig,
    pub timing: TimingConfig,
    pub discovery: DiscoveryConfig,
}

/// 位置模式参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionConfig {
    /// 使能时写入的 Kp（寄存器 0x23）
    pub kp: f32,
    /// 使能时写入的 Kd（寄存器 0x24）
    pub kd: f32,
    /// 0x90 帧的速度限制（r/s）
    pub max_velocity_rps: f64,
    /// 0x90 帧的力矩限制（Nm）
    pub max_torque_nm: f64,
    /// 每个目标角度重复发送的次数
    pub repeat: u32,
    /// 重复发送间隔（ms）
    pub repeat_interval_ms: u64,
}

impl Default for PositionConfig {
    fn default() -> Self {
        Self {
            kp: 1.0,
            kd: 0.1,
            max_velocity_rps: 2.0,
            max_torque_nm: 3.0,
            repeat: 5,
            repeat_interval_ms: 10,
        }
    }
}

/// 速度模式参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VelocityConfig {
    pub kp: f32,
    pub kd: f32,
    /// 使能时写入的力矩限制（寄存器 0x22）
    pub torque_limit_nm: f32,
    /// 启动时的目标加速度（r/s²）
    pub default_acceleration_rps2: f64,
    /// 目标速度为 0 时使用的制动加速度（r/s²）
    pub max_brake_acceleration_rps2: f64,
    /// 流控制周期（ms）
    pub period_ms: u64,
}

impl Default for VelocityConfig {
    fn default() -> Self {
        Self {
            kp: 2.0,
            kd: 0.2,
            torque_limit_nm: 3.0,
            default_acceleration_rps2: 15.0,
            max_brake_acceleration_rps2: 30.0,
            period_ms: 10,
        }
    }
}

/// 使能序列的等待时间
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// 模式写入后的稳定时间（ms）
    pub mode_settle_ms: u64,
    /// 寄存器写入之间的间隔（ms）
    pub register_gap_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            mode_settle_ms: 50,
            register_gap_ms: 20,
        }
    }
}

/// 发现/诊断的时间窗口
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Ping 回复等待窗口（ms）
    pub response_window_ms: u64,
    /// 单次接收轮询超时（ms）
    pub poll_timeout_ms: u64,
    /// 扫描时相邻 ID 之间的间隔（ms）
    pub scan_gap_ms: u64,
    /// 模式查询的等待窗口（ms）
    pub query_window_ms: u64,
    /// 模式查询的轮询超时（ms）
    pub query_poll_ms: u64,
    /// 可靠性测试中单次 Ping 的等待窗口（ms）
    pub probe_window_ms: u64,
    /// 可靠性测试中两次 Ping 之间的间隔（ms）
    pub probe_gap_ms: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            response_window_ms: 50,
            poll_timeout_ms: 10,
            scan_gap_ms: 10,
            query_window_ms: 100,
            query_poll_ms: 20,
            probe_window_ms: 20,
            probe_gap_ms: 100,
        }
    }
}

impl PositionConfig {
    pub fn repeat_interval(&self) -> Duration {
        Duration::from_millis(self.repeat_interval_ms)
    }
}

impl VelocityConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}

impl TimingConfig {
    pub fn mode_settle(&self) -> Duration {
        Duration::from_millis(self.mode_settle_ms)
    }

    pub fn register_gap(&self) -> Duration {
        Duration::from_millis(self.register_gap_ms)
    }
}

impl DiscoveryConfig {
    pub fn response_window(&self) -> Duration {
        Duration::from_millis(self.response_window_ms)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn scan_gap(&self) -> Duration {
        Duration::from_millis(self.scan_gap_ms)
    }

    pub fn query_window(&self) -> Duration {
        Duration::from_millis(self.query_window_ms)
    }

    pub fn query_poll(&self) -> Duration {
        Duration::from_millis(self.query_poll_ms)
    }

    pub fn probe_window(&self) -> Duration {
        Duration::from_millis(self.probe_window_ms)
    }

    pub fn probe_gap(&self) -> Duration {
        Duration::from_millis(self.probe_gap_ms)
    }
}

fn require(condition: bool, message: &str) -> Result<(), DriverError> {
    if condition {
        Ok(())
    } else {
        Err(DriverError::Config(message.to_string()))
    }
}

impl MotorConfig {
    /// 从 TOML 文件加载并校验
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DriverError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            DriverError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// 从 TOML 字符串解析并校验
    pub fn from_toml_str(content: &str) -> Result<Self, DriverError> {
        let config: MotorConfig =
            toml::from_str(content).map_err(|e| DriverError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, DriverError> {
        toml::to_string_pretty(self).map_err(|e| DriverError::Config(e.to_string()))
    }

    /// 写入 TOML 文件
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), DriverError> {
        let path = path.as_ref();
        let content = self.to_toml_string()?;
        std::fs::write(path, content).map_err(|e| {
            DriverError::Config(format!("failed to write {}: {}", path.display(), e))
        })
    }

    /// 校验数值
    pub fn validate(&self) -> Result<(), DriverError> {
        let p = &self.position;
        require(p.kp.is_finite() && p.kd.is_finite(), "position.kp/kd must be finite")?;
        require(
            p.max_velocity_rps.is_finite() && p.max_velocity_rps >= 0.0,
            "position.max_velocity_rps must be >= 0",
        )?;
        require(
            p.max_torque_nm.is_finite() && p.max_torque_nm >= 0.0,
            "position.max_torque_nm must be >= 0",
        )?;
        require(p.repeat > 0, "position.repeat must be > 0")?;

        let v = &self.velocity;
        require(v.kp.is_finite() && v.kd.is_finite(), "velocity.kp/kd must be finite")?;
        require(
            v.torque_limit_nm.is_finite() && v.torque_limit_nm >= 0.0,
            "velocity.torque_limit_nm must be >= 0",
        )?;
        require(
            v.default_acceleration_rps2.is_finite() && v.default_acceleration_rps2 >= 0.0,
            "velocity.default_acceleration_rps2 must be >= 0",
        )?;
        require(
            v.max_brake_acceleration_rps2.is_finite() && v.max_brake_acceleration_rps2 > 0.0,
            "velocity.max_brake_acceleration_rps2 must be > 0",
        )?;
        require(v.period_ms > 0, "velocity.period_ms must be > 0")?;

        let d = &self.discovery;
        require(d.poll_timeout_ms > 0, "discovery.poll_timeout_ms must be > 0")?;
        require(d.query_poll_ms > 0, "discovery.query_poll_ms must be > 0")?;
        require(
            d.response_window_ms >= d.poll_timeout_ms,
            "discovery.response_window_ms must be >= poll_timeout_ms",
        )?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MotorConfig::default();
        assert_eq!(config.position.kp, 1.0);
        assert_eq!(config.position.kd, 0.1);
        assert_eq!(config.position.repeat, 5);
        assert_eq!(config.velocity.kp, 2.0);
        assert_eq!(config.velocity.kd, 0.2);
        assert_eq!(config.velocity.torque_limit_nm, 3.0);
        assert_eq!(config.velocity.default_acceleration_rps2, 15.0);
        assert_eq!(config.velocity.max_brake_acceleration_rps2, 30.0);
        assert_eq!(config.velocity.period(), Duration::from_millis(10));
        assert_eq!(config.timing.mode_settle(), Duration::from_millis(50));
        assert_eq!(config.discovery.response_window(), Duration::from_millis(50));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = MotorConfig::from_toml_str(
            r#"
            [position]
            kp = 1.5

            [velocity]
            max_brake_acceleration_rps2 = 25.0
            "#,
        )
        .unwrap();
        assert_eq!(config.position.kp, 1.5);
        assert_eq!(config.position.kd, 0.1);
        assert_eq!(config.velocity.max_brake_acceleration_rps2, 25.0);
        assert_eq!(config.timing, TimingConfig::default());
    }

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(MotorConfig::from_toml_str("").unwrap(), MotorConfig::default());
    }

    #[test]
    fn test_rejects_zero_period() {
        let err = MotorConfig::from_toml_str("[velocity]\nperiod_ms = 0\n").unwrap_err();
        assert!(matches!(err, DriverError::Config(msg) if msg.contains("period_ms")));
    }

    #[test]
    fn test_rejects_zero_repeat() {
        let mut config = MotorConfig::default();
        config.position.repeat = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_malformed_toml() {
        assert!(matches!(
            MotorConfig::from_toml_str("[position\nkp = "),
            Err(DriverError::Config(_))
        ));
    }

    #[test]
    fn test_toml_roundtrip() {
        let mut config = MotorConfig::default();
        config.discovery.scan_gap_ms = 25;
        let text = config.to_toml_string().unwrap();
        assert_eq!(MotorConfig::from_toml_str(&text).unwrap(), config);
    }
}
