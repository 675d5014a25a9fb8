//! 测试波形

use std::f64::consts::PI;

/// 正弦波：`amplitude * sin(2π f t)`
pub fn sine(amplitude: f64, frequency_hz: f64, t_secs: f64) -> f64 {
    amplitude * (2.0 * PI * frequency_hz * t_secs).sin()
}

/// 线性斜坡，`t` 超出 `[0, duration]` 时钳位到端点
pub fn ramp(start: f64, end: f64, duration_secs: f64, t_secs: f64) -> f64 {
    if duration_secs <= 0.0 {
        return end;
    }
    let progress = (t_secs / duration_secs).clamp(0.0, 1.0);
    start + (end - start) * progress
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sine() {
        assert_eq!(sine(90.0, 0.2, 0.0), 0.0);
        assert!((sine(90.0, 0.25, 1.0) - 90.0).abs() < 1e-9);
        assert!((sine(2.0, 0.5, 1.5) + 2.0).abs() < 1e-9);
        assert!(sine(2.0, 0.5, 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_ramp() {
        assert_eq!(ramp(0.0, 4.0, 2.0, 0.0), 0.0);
        assert_eq!(ramp(0.0, 4.0, 2.0, 1.0), 2.0);
        assert_eq!(ramp(0.0, 4.0, 2.0, 5.0), 4.0);
        assert_eq!(ramp(-1.0, 1.0, 0.0, 0.0), 1.0);
    }
}
