//! 运动控制器
//!
//! 单个电机的高层接口，构造时选定控制模式：
//!
//! - **位置模式**：`set_angle()` 把 0x90 帧突发发送若干次（无确认，重复发送提高送达率）
//! - **速度模式**：后台 [`CommandStreamer`] 每个周期发送 0xAD 帧
//!
//! 控制器被丢弃时先停止流控制线程，再发送一次失能帧。

use crate::bus::{SharedBus, send_on, shared};
use crate::config::MotorConfig;
use crate::error::DriverError;
use crate::lifecycle::{MotorHandle, MotorState};
use crate::metrics::StreamMetricsSnapshot;
use crate::streamer::{CommandStreamer, StreamStatus};
use htmotor_can::CanAdapter;
use htmotor_protocol::{AngleStreamCommand, RegisterWriteCommand, validate_motor_id};
use tracing::{debug, error, trace, warn};

/// 控制模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControlMode {
    /// 0x90 位置流
    #[default]
    Position,
    /// 0xAD 速度流
    Velocity,
}

impl ControlMode {
    pub fn name(self) -> &'static str {
        match self {
            ControlMode::Position => "position",
            ControlMode::Velocity => "velocity",
        }
    }
}

impl std::fmt::Display for ControlMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// 突发发送结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BurstReport {
    pub attempted: u32,
    pub delivered: u32,
}

impl BurstReport {
    pub fn all_delivered(&self) -> bool {
        self.attempted == self.delivered
    }

    pub fn failed(&self) -> u32 {
        self.attempted - self.delivered
    }
}

/// 单电机运动控制器
pub struct MotionController<A: CanAdapter + Send + 'static> {
    bus: SharedBus<A>,
    handle: MotorHandle,
    mode: ControlMode,
    config: MotorConfig,
    /// 仅速度模式
    streamer: Option<CommandStreamer<A>>,
}

impl<A: CanAdapter + Send + 'static> MotionController<A> {
    /// 创建控制器（不发送任何帧）
    ///
    /// # 错误
    /// - `DriverError::Protocol`: 电机 ID 超出 1..=127
    /// - `DriverError::Config`: 配置数值非法
    pub fn new(
        adapter: A,
        motor_id: u8,
        mode: ControlMode,
        config: MotorConfig,
    ) -> Result<Self, DriverError> {
        validate_motor_id(motor_id)?;
        config.validate()?;

        let bus = shared(adapter);
        let streamer = match mode {
            ControlMode::Position => None,
            ControlMode::Velocity => {
                let streamer = CommandStreamer::new(
                    bus.clone(),
                    config.velocity.period(),
                    config.velocity.max_brake_acceleration_rps2,
                );
                streamer.set_target(0.0, config.velocity.default_acceleration_rps2);
                Some(streamer)
            },
        };

        debug!("Motion controller for motor {} in {} mode", motor_id, mode);
        Ok(Self {
            bus,
            handle: MotorHandle::new(motor_id),
            mode,
            config,
            streamer,
        })
    }

    pub fn motor_id(&self) -> u8 {
        self.handle.motor_id()
    }

    pub fn mode(&self) -> ControlMode {
        self.mode
    }

    pub fn state(&self) -> MotorState {
        self.handle.state()
    }

    pub fn is_enabled(&self) -> bool {
        self.handle.is_enabled()
    }

    pub fn config(&self) -> &MotorConfig {
        &self.config
    }

    /// 当前模式的使能寄存器序列
    fn enable_registers(&self) -> Vec<RegisterWriteCommand> {
        let id = self.motor_id();
        match self.mode {
            ControlMode::Position => vec![
                RegisterWriteCommand::kp(id, self.config.position.kp),
                RegisterWriteCommand::kd(id, self.config.position.kd),
            ],
            ControlMode::Velocity => vec![
                RegisterWriteCommand::torque_limit(id, self.config.velocity.torque_limit_nm),
                RegisterWriteCommand::kp(id, self.config.velocity.kp),
                RegisterWriteCommand::kd(id, self.config.velocity.kd),
            ],
        }
    }

    /// 使能电机
    ///
    /// 模式写入 0x0A，等待 50ms，再按模式写入寄存器（间隔 20ms）。
    /// 失败时返回 `DriverError::Can`，状态保持 `Disabled`。
    pub fn enable(&mut self) -> Result<(), DriverError> {
        let registers = self.enable_registers();
        self.handle.enable(&self.bus, &registers, &self.config.timing)
    }

    /// 失能电机（速度模式下先停止流控制）
    pub fn disable(&mut self) -> Result<(), DriverError> {
        self.stop_streaming();
        self.handle.disable(&self.bus)
    }

    fn require_mode(&self, expected: ControlMode) -> Result<(), DriverError> {
        if self.mode == expected {
            Ok(())
        } else {
            Err(DriverError::InvalidMode {
                expected: expected.name(),
                actual: self.mode.name(),
            })
        }
    }

    fn streamer(&self) -> Result<&CommandStreamer<A>, DriverError> {
        self.require_mode(ControlMode::Velocity)?;
        self.streamer
            .as_ref()
            .ok_or_else(|| DriverError::StreamThread("streamer not initialised".to_string()))
    }

    fn streamer_mut(&mut self) -> Result<&mut CommandStreamer<A>, DriverError> {
        self.require_mode(ControlMode::Velocity)?;
        self.streamer
            .as_mut()
            .ok_or_else(|| DriverError::StreamThread("streamer not initialised".to_string()))
    }

    // ========================================================================
    // 位置模式
    // ========================================================================

    /// 以配置中的速度/力矩限制和重复次数发送目标角度
    pub fn set_angle(&self, angle_deg: f64) -> Result<BurstReport, DriverError> {
        let position = &self.config.position;
        let (max_vel, max_tqe, repeat) =
            (position.max_velocity_rps, position.max_torque_nm, position.repeat);
        self.set_angle_with(angle_deg, max_vel, max_tqe, repeat)
    }

    /// 发送目标角度：同一 0x90 帧发送 `repeat` 次，间隔 `repeat_interval`
    ///
    /// 单次发送失败只计数，不中止突发。
    pub fn set_angle_with(
        &self,
        angle_deg: f64,
        max_vel_rps: f64,
        max_tqe_nm: f64,
        repeat: u32,
    ) -> Result<BurstReport, DriverError> {
        self.require_mode(ControlMode::Position)?;
        if !self.is_enabled() {
            warn!(
                "set_angle on motor {} while {}",
                self.motor_id(),
                self.state()
            );
        }

        let frame = AngleStreamCommand::new(angle_deg, max_vel_rps, max_tqe_nm).to_frame();
        let interval = self.config.position.repeat_interval();
        let mut report = BurstReport::default();

        for i in 0..repeat {
            if i > 0 {
                std::thread::sleep(interval);
            }
            report.attempted += 1;
            match send_on(&self.bus, frame) {
                Ok(()) => report.delivered += 1,
                Err(DriverError::PoisonedLock) => return Err(DriverError::PoisonedLock),
                Err(e) => trace!("angle frame {} of {} failed: {}", i + 1, repeat, e),
            }
        }

        if !report.all_delivered() {
            warn!(
                "Angle {:.2}°: {}/{} frames delivered",
                angle_deg, report.delivered, report.attempted
            );
        }
        Ok(report)
    }

    // ========================================================================
    // 速度模式
    // ========================================================================

    /// 启动速度流控制线程（已运行时不做任何事）
    pub fn start_streaming(&mut self) -> Result<(), DriverError> {
        self.streamer_mut()?.start();
        Ok(())
    }

    /// 停止速度流控制线程，返回后不会再发送流帧
    pub fn stop_streaming(&mut self) {
        if let Some(streamer) = self.streamer.as_mut() {
            streamer.stop();
        }
    }

    /// 设置目标速度（r/s），0.0 触发制动
    pub fn set_velocity(&self, velocity_rps: f64) -> Result<(), DriverError> {
        self.streamer()?.set_velocity(velocity_rps);
        Ok(())
    }

    /// 设置目标加速度（r/s²），取绝对值
    pub fn set_acceleration(&self, acceleration_rps2: f64) -> Result<(), DriverError> {
        self.streamer()?.set_acceleration(acceleration_rps2.abs());
        Ok(())
    }

    /// 同时设置速度和加速度（加速度原样使用）
    pub fn set_velocity_target(
        &self,
        velocity_rps: f64,
        acceleration_rps2: f64,
    ) -> Result<(), DriverError> {
        self.streamer()?.set_target(velocity_rps, acceleration_rps2);
        Ok(())
    }

    pub fn stream_status(&self) -> Option<StreamStatus> {
        self.streamer.as_ref().map(|s| s.status())
    }

    pub fn stream_metrics(&self) -> Option<StreamMetricsSnapshot> {
        self.streamer.as_ref().map(|s| s.metrics().snapshot())
    }
}

impl<A: CanAdapter + Send + 'static> Drop for MotionController<A> {
    fn drop(&mut self) {
        self.stop_streaming();
        // 无论当前状态如何都发送一次失能帧
        if let Err(e) = self.handle.disable(&self.bus) {
            error!(
                "Failed to disable motor {} on drop: {}",
                self.motor_id(),
                e
            );
        }
    }
}
