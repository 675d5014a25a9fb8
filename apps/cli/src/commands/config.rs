//! 配置管理命令
//!
//! 配置文件默认位于 `<config_dir>/htmotor/config.toml`，
//! 也可以通过全局参数 `--config <file>` 指定。

use anyhow::{Context, Result};
use clap::Subcommand;
use htmotor_driver::MotorConfig;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// 默认配置文件路径
pub fn default_config_path() -> Result<PathBuf> {
    let mut path = dirs::config_dir().ok_or_else(|| anyhow::anyhow!("无法确定配置目录"))?;
    path.push("htmotor");
    path.push("config.toml");
    Ok(path)
}

/// 加载配置
///
/// 显式指定的文件必须存在；默认位置没有文件时使用内置默认值。
pub fn load_config(explicit: Option<&Path>) -> Result<MotorConfig> {
    if let Some(path) = explicit {
        return MotorConfig::load(path)
            .with_context(|| format!("加载配置文件失败: {}", path.display()));
    }

    let path = match default_config_path() {
        Ok(path) => path,
        Err(_) => return Ok(MotorConfig::default()),
    };
    if !path.exists() {
        debug!("No config file at {}, using defaults", path.display());
        return Ok(MotorConfig::default());
    }
    MotorConfig::load(&path).with_context(|| format!("加载配置文件失败: {}", path.display()))
}

/// 配置命令
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// 显示生效的配置（TOML）
    Show,

    /// 写入默认配置文件
    Init {
        /// 覆盖已有文件
        #[arg(short, long)]
        force: bool,
    },

    /// 显示配置文件路径
    Path,
}

impl ConfigCommand {
    pub fn execute(self, explicit: Option<&Path>) -> Result<()> {
        match self {
            ConfigCommand::Show => {
                let config = load_config(explicit)?;
                print!("{}", config.to_toml_string()?);
                Ok(())
            },

            ConfigCommand::Init { force } => {
                let path = match explicit {
                    Some(path) => path.to_path_buf(),
                    None => default_config_path()?,
                };
                init_config(&path, force)?;
                println!("✅ 已写入默认配置: {}", path.display());
                Ok(())
            },

            ConfigCommand::Path => {
                let path = match explicit {
                    Some(path) => path.to_path_buf(),
                    None => default_config_path()?,
                };
                let state = if path.exists() { "" } else { "（不存在，使用默认值）" };
                println!("{}{}", path.display(), state);
                Ok(())
            },
        }
    }
}

fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!("配置文件已存在: {}（使用 --force 覆盖）", path.display());
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).context("创建配置目录失败")?;
    }
    MotorConfig::default().save(path)?;
    Ok(())
}
