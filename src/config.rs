//! 通知配置
//!
//! 读取优先级：
//! 1. 环境变量 `PUSH_RULES_CONFIG` 指向的 JSON 文件
//! 2. `~/.config/push-rules/config.json`
//! 3. 默认值

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::push::GlobMode;

/// 配置文件路径环境变量
pub const CONFIG_ENV: &str = "PUSH_RULES_CONFIG";

/// 通知默认自动关闭时间（秒）
pub const DEFAULT_DISMISS_SECS: u64 = 5;

/// 默认通知 tag
pub const DEFAULT_TAG: &str = "matrix";

fn default_dismiss_secs() -> u64 {
    DEFAULT_DISMISS_SECS
}

fn default_tag() -> String {
    DEFAULT_TAG.to_string()
}

/// 通知配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// 当前用户 ID（邀请、加入消息和 contains_display_name 条件使用）
    #[serde(default)]
    pub user_id: Option<String>,
    /// 全局静音
    #[serde(default)]
    pub mute_notifications: bool,
    /// 是否播放声音
    #[serde(default)]
    pub audio_notifications: bool,
    /// glob 翻译模式
    #[serde(default)]
    pub glob_mode: GlobMode,
    /// 通知自动关闭时间（秒）
    #[serde(default = "default_dismiss_secs")]
    pub dismiss_after_secs: u64,
    /// 通知 tag
    #[serde(default = "default_tag")]
    pub default_tag: String,
    /// 展示记录文件（JSONL），为空时不记录
    #[serde(default)]
    pub record_path: Option<PathBuf>,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            user_id: None,
            mute_notifications: false,
            audio_notifications: false,
            glob_mode: GlobMode::default(),
            dismiss_after_secs: DEFAULT_DISMISS_SECS,
            default_tag: DEFAULT_TAG.to_string(),
            record_path: None,
        }
    }
}

impl NotifierConfig {
    /// 默认配置文件路径
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".config").join("push-rules").join("config.json"))
    }

    /// 按优先级自动加载；文件不存在时返回默认配置
    pub fn auto_load() -> Result<Self> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            if !path.is_empty() {
                debug!(path = %path, "Loading config from {}", CONFIG_ENV);
                return Self::load_from(Path::new(&path));
            }
        }

        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => {
                debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// 从指定文件加载
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        Ok(config)
    }

    pub fn dismiss_after(&self) -> Duration {
        Duration::from_secs(self.dismiss_after_secs)
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = NotifierConfig::default();
        assert!(!config.mute_notifications);
        assert_eq!(config.dismiss_after(), Duration::from_secs(5));
        assert_eq!(config.default_tag, "matrix");
        assert_eq!(config.glob_mode, GlobMode::Strict);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"user_id": "@me:example.org", "audio_notifications": true, "glob_mode": "legacy"}"#,
        )
        .unwrap();

        let config = NotifierConfig::load_from(&path).unwrap();
        assert_eq!(config.user_id.as_deref(), Some("@me:example.org"));
        assert!(config.audio_notifications);
        assert_eq!(config.glob_mode, GlobMode::Legacy);
        assert_eq!(config.dismiss_after_secs, 5);
        assert_eq!(config.default_tag, "matrix");
    }

    #[test]
    fn test_invalid_file_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "not json").unwrap();
        let err = NotifierConfig::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
    }
}
