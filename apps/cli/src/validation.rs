//! 输入验证模块
//!
//! 命令行参数和交互输入的解析。错误只报告给操作者，不影响正在运行的流控制。

use htmotor_protocol::{MOTOR_ID_MAX, MOTOR_ID_MIN};
use std::path::Path;
use thiserror::Error;

/// 操作者输入错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InputError {
    #[error("输入为空")]
    Empty,

    #[error("无效的数值: {0}")]
    InvalidNumber(String),

    #[error("数值必须是有限值: {0}")]
    NotFinite(String),

    #[error("缺少参数: {0}")]
    MissingValue(&'static str),

    #[error("电机 ID 必须在 1..=127 之间，得到: {0}")]
    InvalidMotorId(String),

    #[error("起始 ID {start} 大于结束 ID {end}")]
    InvalidRange { start: u8, end: u8 },

    #[error("{0}")]
    InvalidPath(String),
}

/// 解析有限浮点数
pub fn parse_number(text: &str) -> Result<f64, InputError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(InputError::Empty);
    }
    let value: f64 = text
        .parse()
        .map_err(|_| InputError::InvalidNumber(text.to_string()))?;
    if !value.is_finite() {
        return Err(InputError::NotFinite(text.to_string()));
    }
    Ok(value)
}

/// 解析逗号分隔的数值列表（如 `0,90,-90`）
pub fn parse_list(text: &str) -> Result<Vec<f64>, InputError> {
    let values = text
        .split(',')
        .filter(|part| !part.trim().is_empty())
        .map(parse_number)
        .collect::<Result<Vec<_>, _>>()?;
    if values.is_empty() {
        return Err(InputError::Empty);
    }
    Ok(values)
}

/// clap `value_parser`：电机 ID
pub fn parse_motor_id(text: &str) -> Result<u8, InputError> {
    text.trim()
        .parse::<u8>()
        .ok()
        .filter(|id| (MOTOR_ID_MIN..=MOTOR_ID_MAX).contains(id))
        .ok_or_else(|| InputError::InvalidMotorId(text.to_string()))
}

/// 命令行中的逗号分隔数值列表
#[derive(Debug, Clone, PartialEq)]
pub struct NumberList(pub Vec<f64>);

/// clap `value_parser`：数值列表
pub fn parse_list_arg(text: &str) -> Result<NumberList, InputError> {
    parse_list(text).map(NumberList)
}

/// 扫描范围
pub fn validate_scan_range(start: u8, end: u8) -> Result<(), InputError> {
    if start > end {
        return Err(InputError::InvalidRange { start, end });
    }
    Ok(())
}

/// 验证输出路径（父目录必须存在）
pub fn validate_output_path(path: &Path) -> Result<(), InputError> {
    if path.as_os_str().is_empty() {
        return Err(InputError::InvalidPath("文件路径为空".to_string()));
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        return Err(InputError::InvalidPath(format!(
            "输出目录不存在: {}",
            parent.display()
        )));
    }
    Ok(())
}

/// 退出命令
pub fn is_quit(line: &str) -> bool {
    matches!(line, "q" | "quit" | "exit")
}

/// 角度模式的交互命令
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AngleInput {
    Angle(f64),
    Quit,
}

/// 解析角度交互输入：`<角度>` 或 `q`
pub fn parse_angle_input(line: &str) -> Result<AngleInput, InputError> {
    let line = line.trim().to_lowercase();
    if line.is_empty() {
        return Err(InputError::Empty);
    }
    if is_quit(&line) {
        return Ok(AngleInput::Quit);
    }
    parse_number(&line).map(AngleInput::Angle)
}

/// 速度模式的交互命令
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VelocityInput {
    /// 目标速度（0 触发制动）
    Velocity(f64),
    /// `acc <值>`
    Acceleration(f64),
    Quit,
}

/// 解析速度交互输入：`<速度>`、`acc <值>`、`0` 或 `q`
pub fn parse_velocity_input(line: &str) -> Result<VelocityInput, InputError> {
    let line = line.trim().to_lowercase();
    if line.is_empty() {
        return Err(InputError::Empty);
    }
    if is_quit(&line) {
        return Ok(VelocityInput::Quit);
    }

    let mut parts = line.split_whitespace();
    match parts.next() {
        Some("acc") => {
            let value = parts.next().ok_or(InputError::MissingValue("acc <加速度>"))?;
            parse_number(value).map(VelocityInput::Acceleration)
        },
        Some(value) => parse_number(value).map(VelocityInput::Velocity),
        None => Err(InputError::Empty),
    }
}
