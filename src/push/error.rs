//! 推送规则引擎错误类型

use thiserror::Error;

/// 推送规则引擎错误
///
/// 需要 `Clone`：同一次规则拉取失败要交给所有等待者。
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PushRuleError {
    /// 规则源不可达或拒绝请求
    #[error("failed to fetch push rules: {0}")]
    Fetch(String),
    /// 规则增删失败
    #[error("failed to mutate push rule {scope}/{kind}/{rule_id}: {reason}")]
    Mutation {
        scope: String,
        kind: String,
        rule_id: String,
        reason: String,
    },
    /// 展示端失败
    #[error("presentation sink failed: {0}")]
    Sink(String),
    /// 配置错误
    #[error("invalid configuration: {0}")]
    Config(String),
    /// JSON 解析失败
    #[error("failed to parse {what}: {reason}")]
    Parse { what: String, reason: String },
}

impl PushRuleError {
    pub fn parse(what: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Parse {
            what: what.into(),
            reason: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PushRuleError>;
