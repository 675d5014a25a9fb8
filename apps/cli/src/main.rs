//! # HTMotor CLI
//!
//! Command-line interface for high-torque motor scanning and control.
//!
//! ```bash
//! # 扫描总线上的电机，保存 JSON 报告
//! htmotor-cli scan --interface can0 --start 1 --end 14 --save scan.json
//!
//! # 位置模式：交互输入角度
//! htmotor-cli angle --motor-id 1
//!
//! # 速度模式：正弦波
//! htmotor-cli velocity --motor-id 1 --mode sine --amplitude 2.0 --frequency 0.5
//! ```
//!
//! Ctrl+C 会结束当前模式：速度模式先制动，然后失能电机。

#[cfg(not(target_os = "linux"))]
compile_error!("htmotor-cli requires SocketCAN (Linux)");

use anyhow::Result;
use clap::{Parser, Subcommand};
use htmotor_driver::MotorConfig;
use std::path::{Path, PathBuf};

mod commands;
mod input;
mod patterns;
mod validation;

use commands::config::load_config;
use commands::{AngleCommand, ConfigCommand, RunFlag, ScanCommand, VelocityCommand};

/// HTMotor CLI - 高扭矩电机命令行工具
#[derive(Parser, Debug)]
#[command(name = "htmotor-cli")]
#[command(about = "Command-line interface for high-torque motor scanning and control", long_about = None)]
#[command(version)]
struct Cli {
    /// 配置文件（默认 <config_dir>/htmotor/config.toml）
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 扫描在线电机
    Scan {
        #[command(flatten)]
        args: ScanCommand,
    },

    /// 角度控制（位置模式）
    Angle {
        #[command(flatten)]
        args: AngleCommand,
    },

    /// 速度控制（速度模式）
    Velocity {
        #[command(flatten)]
        args: VelocityCommand,
    },

    /// 配置管理
    #[command(subcommand)]
    Config(ConfigCommand),
}

fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("htmotor_cli=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Scan { args } => {
            let (config, running) = prepare(config_path)?;
            args.execute(&config, &running)
        },

        Commands::Angle { args } => {
            let (config, running) = prepare(config_path)?;
            args.execute(&config, &running)
        },

        Commands::Velocity { args } => {
            let (config, running) = prepare(config_path)?;
            args.execute(&config, &running)
        },

        Commands::Config(cmd) => cmd.execute(config_path),
    }
}

/// 加载配置并安装 Ctrl+C 处理（结束当前模式，由各命令负责制动和失能）
fn prepare(config_path: Option<&Path>) -> Result<(MotorConfig, RunFlag)> {
    let config = load_config(config_path)?;

    let running = RunFlag::new();
    let flag = running.clone();
    ctrlc::set_handler(move || {
        eprintln!("\n🛑 收到 Ctrl+C，正在停止...");
        flag.stop();
    })?;

    Ok((config, running))
}
