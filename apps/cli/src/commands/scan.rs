//! 扫描命令
//!
//! 扫描总线上在线的电机，可选查询模式、持续监控、可靠性测试和保存 JSON 报告。

use super::{ConnectionArgs, RunFlag};
use crate::validation::{parse_motor_id, parse_number, validate_output_path, validate_scan_range};
use anyhow::{Context, Result};
use clap::Args;
use htmotor_can::CanAdapter;
use htmotor_driver::{
    DiscoveryResult, LinkQuality, MotorConfig, MotorDiscovery, MotorStatus, ReliabilityReport,
};
use serde::Serialize;
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// 扫描命令参数
#[derive(Args, Debug)]
pub struct ScanCommand {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// 起始 ID
    #[arg(long, default_value = "1", value_parser = parse_motor_id)]
    pub start: u8,

    /// 结束 ID
    #[arg(long, default_value = "14", value_parser = parse_motor_id)]
    pub end: u8,

    /// 每个电机的回复等待窗口（毫秒，覆盖配置）
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// 查询在线电机的模式
    #[arg(long)]
    pub detailed: bool,

    /// 持续监控在线电机（秒）
    #[arg(long, value_parser = parse_number)]
    pub monitor: Option<f64>,

    /// 测试指定电机的通信可靠性（不扫描）
    #[arg(long, value_parser = parse_motor_id)]
    pub test: Option<u8>,

    /// 可靠性测试次数
    #[arg(long, default_value_t = 10)]
    pub attempts: u32,

    /// 保存扫描报告（JSON）
    #[arg(long)]
    pub save: Option<PathBuf>,
}

/// 扫描报告
#[derive(Debug, Serialize)]
pub struct ScanReport {
    /// Unix 时间戳（秒）
    pub timestamp: u64,
    pub interface: String,
    pub bitrate: u32,
    pub scan_range: String,
    pub found_motors: Vec<u8>,
    pub motor_count: usize,
    pub results: Vec<DiscoveryResult>,
    pub details: Vec<MotorStatus>,
}

impl ScanReport {
    pub fn new(
        connection: &ConnectionArgs,
        start: u8,
        end: u8,
        results: Vec<DiscoveryResult>,
        details: Vec<MotorStatus>,
    ) -> Self {
        let found_motors: Vec<u8> =
            results.iter().filter(|r| r.is_online).map(|r| r.motor_id).collect();
        Self {
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default(),
            interface: connection.interface.clone(),
            bitrate: connection.bitrate,
            scan_range: format!("{}-{}", start, end),
            motor_count: found_motors.len(),
            found_motors,
            results,
            details,
        }
    }
}

impl ScanCommand {
    pub fn execute(&self, config: &MotorConfig, running: &RunFlag) -> Result<()> {
        validate_scan_range(self.start, self.end)?;
        if let Some(path) = &self.save {
            validate_output_path(path)?;
        }

        let mut config = config.clone();
        if let Some(timeout) = self.timeout_ms {
            config.discovery.response_window_ms = timeout.max(config.discovery.poll_timeout_ms);
        }

        println!("🔌 打开 {} ({} bps)...", self.connection.interface, self.connection.bitrate);
        let mut discovery = self
            .connection
            .builder(&config)
            .build_discovery()
            .with_context(|| format!("无法打开 CAN 接口 {}", self.connection.interface))?;

        let flushed = discovery.flush();
        if flushed > 0 {
            println!("🧹 清除 {} 个残留帧", flushed);
        }

        if let Some(motor_id) = self.test {
            let report = discovery.probe_reliability(motor_id, self.attempts);
            print_reliability(&report);
            return Ok(());
        }

        let results = self.scan(&mut discovery, running);
        if !running.is_running() {
            println!("\n⚠️  用户中断扫描，已扫描 {} 个 ID", results.len());
        }
        let found: Vec<u8> = results.iter().filter(|r| r.is_online).map(|r| r.motor_id).collect();

        println!("{}", "=".repeat(50));
        if found.is_empty() {
            println!("❌ 未扫描到任何电机");
            println!();
            println!("建议:");
            println!("  1. 检查 120Ω 终端电阻");
            println!("  2. 确认波特率与电机一致");
            println!("  3. 手动转动一下电机（部分电机休眠后需要唤醒）");
        } else {
            println!("✅ 扫描完成，在线电机: {:?}", found);
            println!("总计: {} 个电机", found.len());
        }

        let mut details = Vec::new();
        if self.detailed || self.save.is_some() {
            details = query_details(&mut discovery, &found);
            if self.detailed {
                print_details(&found, &details);
            }
        }

        if let Some(seconds) = self.monitor
            && !found.is_empty()
        {
            let duration = Duration::try_from_secs_f64(seconds.max(0.0)).unwrap_or(Duration::MAX);
            monitor(&mut discovery, &found, duration, running);
        }

        if let Some(path) = &self.save {
            let report = ScanReport::new(&self.connection, self.start, self.end, results, details);
            let json = serde_json::to_string_pretty(&report)?;
            std::fs::write(path, json)
                .with_context(|| format!("写入报告失败: {}", path.display()))?;
            println!("📄 报告已保存到: {}", path.display());
        }

        Ok(())
    }

    fn scan<A: CanAdapter>(
        &self,
        discovery: &mut MotorDiscovery<A>,
        running: &RunFlag,
    ) -> Vec<DiscoveryResult> {
        println!("🔍 扫描电机 ID {}-{}...", self.start, self.end);
        discovery.scan_range_with(self.start, self.end, |result| {
            if result.is_online {
                println!("  {}", format_result(result));
            }
            if running.is_running() {
                ControlFlow::Continue(())
            } else {
                ControlFlow::Break(())
            }
        })
    }
}

/// 单行显示一个在线电机
pub fn format_result(result: &DiscoveryResult) -> String {
    let mut line = format!("✅ 电机 {:3}", result.motor_id);
    if let Some(name) = &result.name {
        line.push_str(&format!("  名称: {}", name));
    }
    if let Some(version) = &result.hardware_version {
        line.push_str(&format!("  硬件: {}", version));
    }
    if let Some(ms) = result.response_time_ms {
        line.push_str(&format!("  响应: {}ms", ms));
    }
    line
}

fn mode_text(status: &MotorStatus) -> String {
    match (status.mode, status.mode_raw) {
        (Some(mode), Some(raw)) => format!("{} (0x{:02X})", mode, raw),
        (None, Some(raw)) => format!("未知模式 (0x{:02X})", raw),
        _ => "未知模式".to_string(),
    }
}

fn query_details<A: CanAdapter>(discovery: &mut MotorDiscovery<A>, ids: &[u8]) -> Vec<MotorStatus> {
    ids.iter()
        .filter_map(|&id| match discovery.query_mode(id) {
            Ok(status) => status,
            Err(e) => {
                eprintln!("⚠️  查询电机 {} 失败: {}", id, e);
                None
            },
        })
        .collect()
}

fn print_details(ids: &[u8], details: &[MotorStatus]) {
    println!("{}", "=".repeat(50));
    println!("电机详细信息:");
    for &id in ids {
        match details.iter().find(|s| s.motor_id == id) {
            Some(status) => {
                println!();
                println!("电机 {}:", id);
                println!("  CAN ID: 0x{:X}", status.can_id);
                println!("  模式: {}", mode_text(status));
                println!("  数据: {:02X?}", status.data);
            },
            None => println!("\n电机 {}: 无回复", id),
        }
    }
}

fn monitor<A: CanAdapter>(
    discovery: &mut MotorDiscovery<A>,
    ids: &[u8],
    duration: Duration,
    running: &RunFlag,
) {
    println!("{}", "=".repeat(50));
    println!("📊 监控电机 {:?}，时长 {:.1}s（Ctrl+C 提前停止）", ids, duration.as_secs_f64());

    let start = Instant::now();
    while running.is_running() && start.elapsed() < duration {
        println!();
        println!("时间: {:.1}s", start.elapsed().as_secs_f64());
        println!("{}", "-".repeat(40));
        for &id in ids {
            match discovery.query_mode(id) {
                Ok(Some(status)) => {
                    println!("电机 {:2}: CAN ID=0x{:<6X} 模式={}", id, status.can_id, mode_text(&status))
                },
                Ok(None) => println!("电机 {:2}: 通信失败", id),
                Err(e) => println!("电机 {:2}: 发送失败 ({})", id, e),
            }
        }
        if !running.sleep(Duration::from_secs(1)) {
            println!("\n⚠️  用户中断监控");
        }
    }
}

fn print_reliability(report: &ReliabilityReport) {
    println!(
        "通信可靠性 (电机 {}): {}/{} ({:.1}%)",
        report.motor_id,
        report.successes,
        report.attempts,
        report.percent()
    );
    match report.grade() {
        LinkQuality::Excellent => println!("✅ 通信质量优秀"),
        LinkQuality::Fair => println!("⚠️  通信质量一般"),
        LinkQuality::Poor => println!("❌ 通信质量较差"),
    }
}
