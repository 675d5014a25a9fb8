//! 角度控制命令（位置模式，0x90 流帧）
//!
//! 每个目标角度以突发方式发送；结束（包括 Ctrl+C）时失能电机。

use super::{MotorArgs, RunFlag};
use crate::input::{InputEvent, LineInput};
use crate::patterns;
use crate::validation::{AngleInput, NumberList, parse_angle_input, parse_list_arg, parse_number};
use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use htmotor_can::CanAdapter;
use htmotor_driver::{ControlMode, MotionController, MotorConfig};
use std::io::Write;
use std::time::{Duration, Instant};
use tracing::warn;

/// 多位置测试中每个位置的稳定时间
const TEST_SETTLE: Duration = Duration::from_secs(2);

/// 角度控制模式
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum AnglePattern {
    /// 交互输入角度
    #[default]
    Interactive,
    /// 正弦波
    Sine,
    /// 阶梯
    Step,
    /// 多位置测试（每个位置稳定 2 秒）
    Test,
}

/// 角度命令参数
#[derive(Args, Debug)]
pub struct AngleCommand {
    #[command(flatten)]
    pub motor: MotorArgs,

    /// 控制模式
    #[arg(long, value_enum, default_value_t = AnglePattern::Interactive)]
    pub mode: AnglePattern,

    /// 正弦波幅值（度）
    #[arg(long, default_value_t = 90.0, value_parser = parse_number, allow_hyphen_values = true)]
    pub amplitude: f64,

    /// 正弦波频率（Hz）
    #[arg(long, default_value_t = 0.2, value_parser = parse_number)]
    pub frequency: f64,

    /// 正弦波时长（秒）
    #[arg(long, default_value_t = 10.0, value_parser = parse_number)]
    pub duration: f64,

    /// 阶梯角度序列（逗号分隔，如 0,90,-90）
    #[arg(long, value_parser = parse_list_arg, allow_hyphen_values = true)]
    pub angles: Option<NumberList>,

    /// 阶梯每步时长（秒）
    #[arg(long, default_value_t = 2.0, value_parser = parse_number)]
    pub step_duration: f64,

    /// 测试位置序列（逗号分隔）
    #[arg(long, value_parser = parse_list_arg, allow_hyphen_values = true)]
    pub positions: Option<NumberList>,

    /// 速度限制（r/s，覆盖配置）
    #[arg(long, value_parser = parse_number)]
    pub max_velocity: Option<f64>,

    /// 力矩限制（Nm，覆盖配置）
    #[arg(long, value_parser = parse_number)]
    pub max_torque: Option<f64>,
}

fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value.max(0.0)).unwrap_or(Duration::MAX)
}

impl AngleCommand {
    /// 需要列表参数的模式在连接前检查
    fn required_list(&self) -> Result<Option<&[f64]>> {
        match self.mode {
            AnglePattern::Step => match &self.angles {
                Some(list) => Ok(Some(&list.0)),
                None => anyhow::bail!("阶梯模式需要 --angles 参数"),
            },
            AnglePattern::Test => match &self.positions {
                Some(list) => Ok(Some(&list.0)),
                None => anyhow::bail!("测试模式需要 --positions 参数"),
            },
            AnglePattern::Interactive | AnglePattern::Sine => Ok(None),
        }
    }

    pub fn execute(&self, config: &MotorConfig, running: &RunFlag) -> Result<()> {
        let list = self.required_list()?;

        let mut config = config.clone();
        if let Some(velocity) = self.max_velocity {
            config.position.max_velocity_rps = velocity.abs();
        }
        if let Some(torque) = self.max_torque {
            config.position.max_torque_nm = torque.abs();
        }

        let connection = &self.motor.connection;
        let mut controller = connection
            .builder(&config)
            .motor_id(self.motor.motor_id)
            .mode(ControlMode::Position)
            .build()
            .with_context(|| format!("无法打开 CAN 接口 {}", connection.interface))?;
        println!("✅ 控制器初始化成功 (电机 ID: {})", self.motor.motor_id);

        controller.enable().context("使能电机失败")?;
        println!(
            "✅ 电机已使能 (限速 {} r/s, 限矩 {} Nm)",
            config.position.max_velocity_rps, config.position.max_torque_nm
        );

        let result = match (self.mode, list) {
            (AnglePattern::Sine, _) => run_sine(
                &controller,
                self.amplitude,
                self.frequency,
                secs(self.duration),
                running,
            ),
            (AnglePattern::Step, Some(angles)) => {
                run_sequence(&controller, angles, secs(self.step_duration), "阶梯", running)
            },
            (AnglePattern::Test, Some(positions)) => {
                run_sequence(&controller, positions, TEST_SETTLE, "测试位置", running)
            },
            _ => run_interactive(&controller, running),
        };

        if let Err(e) = controller.disable() {
            warn!("Failed to disable motor: {}", e);
        }
        println!("🛑 电机已禁用");
        result
    }
}

fn run_interactive<A: CanAdapter + Send + 'static>(
    controller: &MotionController<A>,
    running: &RunFlag,
) -> Result<()> {
    println!("{}", "=".repeat(50));
    println!("🚀 0x90 流控制模式");
    println!("输入角度 (如 90) 回车，q 退出");
    println!("{}", "=".repeat(50));

    let input = LineInput::spawn("(0x90) > ");
    while running.is_running() {
        let line = match input.recv_timeout(Duration::from_millis(100)) {
            None => continue,
            Some(InputEvent::Line(line)) => line,
            Some(InputEvent::Interrupted) | Some(InputEvent::Closed) => break,
        };

        match parse_angle_input(&line) {
            Ok(AngleInput::Quit) => break,
            Ok(AngleInput::Angle(angle)) => {
                let report = controller.set_angle(angle)?;
                println!(
                    "   >>> 目标 {}° ({}/{} 帧)",
                    angle, report.delivered, report.attempted
                );
            },
            Err(e) => println!("输入错误: {}", e),
        }
    }
    Ok(())
}

fn run_sine<A: CanAdapter + Send + 'static>(
    controller: &MotionController<A>,
    amplitude: f64,
    frequency: f64,
    duration: Duration,
    running: &RunFlag,
) -> Result<()> {
    println!("{}", "=".repeat(50));
    println!("🌊 正弦波角度控制");
    println!(
        "幅值: {}°, 频率: {} Hz, 时长: {:.1}s",
        amplitude,
        frequency,
        duration.as_secs_f64()
    );
    println!("{}", "=".repeat(50));

    let start = Instant::now();
    while running.is_running() && start.elapsed() < duration {
        let target = patterns::sine(amplitude, frequency, start.elapsed().as_secs_f64());
        // 突发发送本身决定了更新节奏
        controller.set_angle(target)?;
        print!("\r目标: {:7.1}°", target);
        std::io::stdout().flush().ok();
    }
    println!();
    Ok(())
}

fn run_sequence<A: CanAdapter + Send + 'static>(
    controller: &MotionController<A>,
    angles: &[f64],
    hold: Duration,
    label: &str,
    running: &RunFlag,
) -> Result<()> {
    println!("{}", "=".repeat(50));
    println!("📈 {}: {:?}°，每步 {:.1}s", label, angles, hold.as_secs_f64());
    println!("{}", "=".repeat(50));

    for (i, &angle) in angles.iter().enumerate() {
        if !running.is_running() {
            break;
        }
        println!("--- {} {}/{}: {}° ---", label, i + 1, angles.len(), angle);
        controller.set_angle(angle)?;
        if !running.sleep(hold) {
            println!("\n中断");
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Cli {
        #[command(flatten)]
        angle: AngleCommand,
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["angle"]).unwrap();
        assert_eq!(cli.angle.mode, AnglePattern::Interactive);
        assert_eq!(cli.angle.motor.motor_id, 1);
        assert_eq!(cli.angle.motor.connection.interface, "can0");
        assert_eq!(cli.angle.amplitude, 90.0);
        assert_eq!(cli.angle.frequency, 0.2);
        assert!(cli.angle.required_list().unwrap().is_none());
    }

    #[test]
    fn test_step_requires_angles() {
        let cli = Cli::try_parse_from(["angle", "--mode", "step"]).unwrap();
        assert!(cli.angle.required_list().is_err());

        let cli =
            Cli::try_parse_from(["angle", "--mode", "step", "--angles", "-90,0,90"]).unwrap();
        assert_eq!(cli.angle.required_list().unwrap(), Some(&[-90.0, 0.0, 90.0][..]));
    }

    #[test]
    fn test_rejects_invalid_motor_id() {
        assert!(Cli::try_parse_from(["angle", "--motor-id", "200"]).is_err());
    }
}
