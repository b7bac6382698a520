//! 展示端 trait 定义

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::push::Result;

/// 展示请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresentationRequest {
    /// 标题：`<显示名> (<房间名>)`
    pub title: String,
    /// 正文
    pub body: String,
    /// 图标（发送者头像）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// 点击后跳转的目标，如 `room/!abc:example.org`
    pub click_target: String,
    /// 通知 tag，同 tag 的通知互相替换
    pub tag: String,
    /// 声音（`default` 或具体音频名）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
    /// 自动关闭时间（秒），到期时一并停止声音
    pub dismiss_after_secs: u64,
    pub room_id: String,
    /// 触发通知的规则
    pub rule_id: String,
}

impl PresentationRequest {
    pub fn dismiss_after(&self) -> Duration {
        Duration::from_secs(self.dismiss_after_secs)
    }
}

/// 展示结果
#[derive(Debug, Clone, PartialEq)]
pub enum SendResult {
    /// 已展示
    Sent,
    /// 跳过
    Skipped(String),
    /// 展示失败
    Failed(String),
}

/// 展示端（桌面通知、声音播放等）
///
/// 展示端负责实际显示和到期自动关闭。
pub trait PresentationSink: Send + Sync {
    /// 名称（用于日志）
    fn name(&self) -> &str;

    fn present(&self, request: &PresentationRequest) -> Result<SendResult>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization_skips_empty_optionals() {
        let request = PresentationRequest {
            title: "Bob (Lobby)".to_string(),
            body: "hello".to_string(),
            icon: None,
            click_target: "room/!r:x".to_string(),
            tag: "matrix".to_string(),
            audio: None,
            dismiss_after_secs: 5,
            room_id: "!r:x".to_string(),
            rule_id: ".m.rule.message".to_string(),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("icon").is_none());
        assert!(value.get("audio").is_none());
        assert_eq!(request.dismiss_after(), Duration::from_secs(5));
    }
}
