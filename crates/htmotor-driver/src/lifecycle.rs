//! 电机生命周期
//!
//! `Disabled → Enabling → Enabled`，任何一步发送失败都回到 `Disabled`。

use crate::bus::send_on;
use crate::config::TimingConfig;
use crate::error::DriverError;
use htmotor_can::CanAdapter;
use htmotor_protocol::{ModeWriteCommand, RegisterWriteCommand};
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// 电机状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MotorState {
    #[default]
    Disabled,
    /// 使能序列进行中
    Enabling,
    Enabled,
}

impl MotorState {
    pub fn name(self) -> &'static str {
        match self {
            MotorState::Disabled => "disabled",
            MotorState::Enabling => "enabling",
            MotorState::Enabled => "enabled",
        }
    }
}

impl std::fmt::Display for MotorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// 单个电机的句柄
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MotorHandle {
    motor_id: u8,
    state: MotorState,
}

impl MotorHandle {
    pub fn new(motor_id: u8) -> Self {
        Self {
            motor_id,
            state: MotorState::Disabled,
        }
    }

    pub fn motor_id(&self) -> u8 {
        self.motor_id
    }

    pub fn state(&self) -> MotorState {
        self.state
    }

    pub fn is_enabled(&self) -> bool {
        self.state == MotorState::Enabled
    }

    /// 执行使能序列
    ///
    /// 1. 模式写入 0x0A，等待 `mode_settle`
    /// 2. 依次写入 `registers`，相邻两次之间等待 `register_gap`
    ///
    /// 等待不可中断。任何发送失败返回错误并把状态置回 `Disabled`。
    pub(crate) fn enable<A: CanAdapter>(
        &mut self,
        bus: &Mutex<A>,
        registers: &[RegisterWriteCommand],
        timing: &TimingConfig,
    ) -> Result<(), DriverError> {
        self.state = MotorState::Enabling;
        debug!("Motor {} enabling", self.motor_id);

        let result = self.run_enable_sequence(bus, registers, timing);
        match &result {
            Ok(()) => {
                self.state = MotorState::Enabled;
                info!("Motor {} enabled", self.motor_id);
            },
            Err(e) => {
                self.state = MotorState::Disabled;
                warn!("Motor {} enable failed: {}", self.motor_id, e);
            },
        }
        result
    }

    fn run_enable_sequence<A: CanAdapter>(
        &self,
        bus: &Mutex<A>,
        registers: &[RegisterWriteCommand],
        timing: &TimingConfig,
    ) -> Result<(), DriverError> {
        send_on(bus, ModeWriteCommand::enable(self.motor_id).to_frame())?;
        std::thread::sleep(timing.mode_settle());

        for (index, register) in registers.iter().enumerate() {
            if index > 0 {
                std::thread::sleep(timing.register_gap());
            }
            debug!(
                "Motor {} register 0x{:02X} <- {}",
                self.motor_id, register.register, register.value
            );
            send_on(bus, register.to_frame())?;
        }
        Ok(())
    }

    /// 发送失能帧（模式 0x00）
    ///
    /// 无论发送是否成功，本地状态都置为 `Disabled`。
    pub(crate) fn disable<A: CanAdapter>(&mut self, bus: &Mutex<A>) -> Result<(), DriverError> {
        self.state = MotorState::Disabled;
        send_on(bus, ModeWriteCommand::disable(self.motor_id).to_frame())?;
        info!("Motor {} disabled", self.motor_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use htmotor_can::MockCanAdapter;
    use htmotor_protocol::{CMD_WRITE_MODE, MODE_POSITION, REG_KD, REG_KP};

    fn fast_timing() -> TimingConfig {
        TimingConfig {
            mode_settle_ms: 1,
            register_gap_ms: 1,
        }
    }

    #[test]
    fn test_new_handle_is_disabled() {
        let handle = MotorHandle::new(3);
        assert_eq!(handle.motor_id(), 3);
        assert_eq!(handle.state(), MotorState::Disabled);
        assert!(!handle.is_enabled());
    }

    #[test]
    fn test_enable_sequence_frames() {
        let mock = MockCanAdapter::new();
        let bus = Mutex::new(mock.clone());
        let mut handle = MotorHandle::new(1);
        let registers = [RegisterWriteCommand::kp(1, 1.0), RegisterWriteCommand::kd(1, 0.1)];

        handle.enable(&bus, &registers, &fast_timing()).unwrap();
        assert!(handle.is_enabled());

        let frames = mock.sent_to(1);
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].data[0], CMD_WRITE_MODE);
        assert_eq!(frames[0].data[2], MODE_POSITION);
        assert_eq!(frames[1].data[1], REG_KP);
        assert_eq!(frames[2].data[1], REG_KD);
    }

    #[test]
    fn test_enable_failure_leaves_disabled() {
        let mock = MockCanAdapter::new();
        mock.fail_sends_after(1);
        let bus = Mutex::new(mock.clone());
        let mut handle = MotorHandle::new(1);
        let registers = [RegisterWriteCommand::kp(1, 1.0), RegisterWriteCommand::kd(1, 0.1)];

        let result = handle.enable(&bus, &registers, &fast_timing());
        assert!(matches!(result, Err(DriverError::Can(_))));
        assert_eq!(handle.state(), MotorState::Disabled);
        // 模式写入成功，第一个寄存器写入失败后停止
        assert_eq!(mock.send_attempts(), 2);
    }

    #[test]
    fn test_disable_sends_mode_zero() {
        let mock = MockCanAdapter::new();
        let bus = Mutex::new(mock.clone());
        let mut handle = MotorHandle::new(4);
        handle.disable(&bus).unwrap();
        let frames = mock.sent_to(4);
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0].data[..3], &[0x01, 0x00, 0x00]);
    }
}
