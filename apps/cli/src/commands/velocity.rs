//! 速度控制命令（速度模式，0xAD 流帧）
//!
//! 后台流控制线程持续发送当前目标。任何模式结束时先把目标速度置 0（制动），
//! 等待几个周期后再停止流控制并失能电机。

use super::{MotorArgs, RunFlag};
use crate::input::{InputEvent, LineInput};
use crate::patterns;
use crate::validation::{
    NumberList, VelocityInput, parse_list_arg, parse_number, parse_velocity_input,
};
use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use htmotor_can::CanAdapter;
use htmotor_driver::{ControlMode, MotionController, MotorConfig};
use std::io::Write;
use std::time::{Duration, Instant};
use tracing::warn;

/// 制动帧在停止流控制前的持续时间
const BRAKE_HOLD: Duration = Duration::from_millis(200);

/// 前台更新目标的周期
const UPDATE_PERIOD: Duration = Duration::from_millis(10);

/// 速度控制模式
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum VelocityPattern {
    /// 交互输入速度 / 加速度
    #[default]
    Interactive,
    /// 正弦波
    Sine,
    /// 阶梯
    Step,
    /// 线性斜坡
    Ramp,
}

/// 速度命令参数
#[derive(Args, Debug)]
pub struct VelocityCommand {
    #[command(flatten)]
    pub motor: MotorArgs,

    /// 控制模式
    #[arg(long, value_enum, default_value_t = VelocityPattern::Interactive)]
    pub mode: VelocityPattern,

    /// 行驶加速度（r/s²，覆盖配置）
    #[arg(short, long, value_parser = parse_number)]
    pub acceleration: Option<f64>,

    /// 最大制动加速度（r/s²，覆盖配置）
    #[arg(long, value_parser = parse_number)]
    pub brake_acceleration: Option<f64>,

    /// 正弦波幅值（r/s）
    #[arg(long, default_value_t = 2.0, value_parser = parse_number, allow_hyphen_values = true)]
    pub amplitude: f64,

    /// 正弦波频率（Hz）
    #[arg(long, default_value_t = 0.5, value_parser = parse_number)]
    pub frequency: f64,

    /// 正弦波 / 斜坡时长（秒）
    #[arg(long, default_value_t = 10.0, value_parser = parse_number)]
    pub duration: f64,

    /// 阶梯速度序列（逗号分隔）
    #[arg(long, value_parser = parse_list_arg, allow_hyphen_values = true)]
    pub velocities: Option<NumberList>,

    /// 阶梯每步时长（秒）
    #[arg(long, default_value_t = 2.0, value_parser = parse_number)]
    pub step_duration: f64,

    /// 斜坡起始速度（r/s）
    #[arg(long, value_parser = parse_number, allow_hyphen_values = true)]
    pub start_vel: Option<f64>,

    /// 斜坡结束速度（r/s）
    #[arg(long, value_parser = parse_number, allow_hyphen_values = true)]
    pub end_vel: Option<f64>,
}

fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value.max(0.0)).unwrap_or(Duration::MAX)
}

impl VelocityCommand {
    /// 连接前检查模式所需的参数
    fn check_arguments(&self) -> Result<()> {
        match self.mode {
            VelocityPattern::Step if self.velocities.is_none() => {
                anyhow::bail!("阶梯模式需要 --velocities 参数")
            },
            VelocityPattern::Ramp if self.start_vel.is_none() || self.end_vel.is_none() => {
                anyhow::bail!("斜坡模式需要 --start-vel 和 --end-vel 参数")
            },
            _ => Ok(()),
        }
    }

    pub fn execute(&self, config: &MotorConfig, running: &RunFlag) -> Result<()> {
        self.check_arguments()?;

        let mut config = config.clone();
        if let Some(acceleration) = self.acceleration {
            config.velocity.default_acceleration_rps2 = acceleration.abs();
        }
        if let Some(brake) = self.brake_acceleration {
            config.velocity.max_brake_acceleration_rps2 = brake.abs();
        }

        let connection = &self.motor.connection;
        let mut controller = connection
            .builder(&config)
            .motor_id(self.motor.motor_id)
            .mode(ControlMode::Velocity)
            .build()
            .with_context(|| format!("无法打开 CAN 接口 {}", connection.interface))?;
        println!("✅ 控制器初始化成功 (电机 ID: {})", self.motor.motor_id);

        controller.enable().context("使能电机失败")?;
        std::thread::sleep(Duration::from_millis(100));
        controller.start_streaming()?;
        println!(
            "✅ 电机已激活 (加速度 {} r/s², 制动 {} r/s²)",
            config.velocity.default_acceleration_rps2, config.velocity.max_brake_acceleration_rps2
        );

        let result = match self.mode {
            VelocityPattern::Interactive => run_interactive(&controller, running),
            VelocityPattern::Sine => run_timed(&controller, secs(self.duration), running, |t| {
                patterns::sine(self.amplitude, self.frequency, t)
            }),
            VelocityPattern::Step => {
                let velocities = self.velocities.as_ref().map(|l| l.0.as_slice()).unwrap_or(&[]);
                run_step(&controller, velocities, secs(self.step_duration), running)
            },
            VelocityPattern::Ramp => {
                let start = self.start_vel.unwrap_or_default();
                let end = self.end_vel.unwrap_or_default();
                run_timed(&controller, secs(self.duration), running, |t| {
                    patterns::ramp(start, end, self.duration, t)
                })
            },
        };

        brake_and_stop(&mut controller);
        result
    }
}

/// 制动、停止流控制、失能
fn brake_and_stop<A: CanAdapter + Send + 'static>(controller: &mut MotionController<A>) {
    if let Err(e) = controller.set_velocity(0.0) {
        warn!("Failed to command brake: {}", e);
    }
    std::thread::sleep(BRAKE_HOLD);
    controller.stop_streaming();

    if let Some(metrics) = controller.stream_metrics() {
        println!(
            "📊 流控制: 发送 {} 帧, 失败 {} ({:.1}%), 超时 {} 次",
            metrics.frames_sent,
            metrics.send_failures,
            metrics.failure_rate(),
            metrics.overruns
        );
    }

    if let Err(e) = controller.disable() {
        warn!("Failed to disable motor: {}", e);
    }
    println!("🛑 电机已禁用");
}

fn print_status<A: CanAdapter + Send + 'static>(controller: &MotionController<A>) {
    if let Some(status) = controller.stream_status() {
        println!(
            "   (Vel={:.1}, Acc={:.1}, 实际 Acc={:.1})",
            status.target_velocity, status.target_acceleration, status.effective_acceleration
        );
    }
}

fn run_interactive<A: CanAdapter + Send + 'static>(
    controller: &MotionController<A>,
    running: &RunFlag,
) -> Result<()> {
    println!("{}", "=".repeat(50));
    println!("🏎️  速度 + 加速度模式");
    println!("命令:");
    println!("  [速度值]     -> 设置目标速度 (例如: 5.0, -2.0)");
    println!("  acc [数值]   -> 设置行驶加速度 (例如: acc 10.0)");
    println!("  0            -> 紧急制动");
    println!("  q            -> 退出");
    println!("{}", "=".repeat(50));

    let input = LineInput::spawn("(0xAD) > ");
    while running.is_running() {
        let line = match input.recv_timeout(Duration::from_millis(100)) {
            None => continue,
            Some(InputEvent::Line(line)) => line,
            Some(InputEvent::Interrupted) | Some(InputEvent::Closed) => break,
        };

        match parse_velocity_input(&line) {
            Ok(VelocityInput::Quit) => break,
            Ok(VelocityInput::Velocity(velocity)) => {
                controller.set_velocity(velocity)?;
                if velocity == 0.0 {
                    println!("   -> 🛑 紧急制动");
                } else {
                    println!("   -> 目标速度: {} r/s", velocity);
                }
                print_status(controller);
            },
            Ok(VelocityInput::Acceleration(acceleration)) => {
                controller.set_acceleration(acceleration)?;
                println!("   -> 行驶加速度: {} r/s²", acceleration.abs());
                print_status(controller);
            },
            Err(e) => println!("输入错误: {}", e),
        }
    }
    Ok(())
}

/// 按时间函数更新目标速度，直到时长结束或被中断
fn run_timed<A, F>(
    controller: &MotionController<A>,
    duration: Duration,
    running: &RunFlag,
    target: F,
) -> Result<()>
where
    A: CanAdapter + Send + 'static,
    F: Fn(f64) -> f64,
{
    println!("{}", "=".repeat(50));
    println!("🌊 时长 {:.1}s（Ctrl+C 提前停止）", duration.as_secs_f64());
    println!("{}", "=".repeat(50));

    let start = Instant::now();
    while running.is_running() && start.elapsed() < duration {
        let velocity = target(start.elapsed().as_secs_f64());
        controller.set_velocity(velocity)?;
        print!("\r目标速度: {:6.2} r/s", velocity);
        std::io::stdout().flush().ok();
        std::thread::sleep(UPDATE_PERIOD);
    }
    println!();
    Ok(())
}

fn run_step<A: CanAdapter + Send + 'static>(
    controller: &MotionController<A>,
    velocities: &[f64],
    hold: Duration,
    running: &RunFlag,
) -> Result<()> {
    println!("{}", "=".repeat(50));
    println!("📈 阶梯速度: {:?} r/s，每步 {:.1}s", velocities, hold.as_secs_f64());
    println!("{}", "=".repeat(50));

    for (i, &velocity) in velocities.iter().enumerate() {
        if !running.is_running() {
            break;
        }
        println!("--- 步骤 {}/{}: {} r/s ---", i + 1, velocities.len(), velocity);
        controller.set_velocity(velocity)?;
        if !running.sleep(hold) {
            println!("\n中断");
            break;
        }
    }
    Ok(())
}
