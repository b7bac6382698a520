//! 通知分发器 - 规则匹配后决定是否通知，并把展示请求路由到各展示端
//!
//! 流程：
//! 1. 静音或用户正在前台活跃时直接抑制，不做匹配
//! 2. 拉取规则并匹配，无匹配规则则抑制
//! 3. 折叠动作，notify 为假则抑制
//! 4. 生成消息，无消息则抑制
//! 5. 生成展示请求交给所有展示端

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::channel::{PresentationRequest, PresentationSink, SendResult};
use super::formatter::MessageFormatter;
use crate::config::NotifierConfig;
use crate::push::{ActionDecision, Event, MatchedRule, Presence, PushRules, Result};

/// 抑制原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressReason {
    /// 用户全局静音
    Muted,
    /// 用户在前台活跃
    UserActive,
    /// 没有匹配规则（默认不通知）
    NoMatchingRule,
    /// 规则动作不要求通知
    NotifyDisabled,
    /// 事件无法生成消息
    NoMessage,
}

impl SuppressReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuppressReason::Muted => "muted",
            SuppressReason::UserActive => "user_active",
            SuppressReason::NoMatchingRule => "no_matching_rule",
            SuppressReason::NotifyDisabled => "notify_disabled",
            SuppressReason::NoMessage => "no_message",
        }
    }
}

/// 通知决策
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Notify {
        rule: MatchedRule,
        actions: ActionDecision,
        request: PresentationRequest,
    },
    Suppressed(SuppressReason),
}

impl Decision {
    pub fn is_notify(&self) -> bool {
        matches!(self, Decision::Notify { .. })
    }

    pub fn request(&self) -> Option<&PresentationRequest> {
        match self {
            Decision::Notify { request, .. } => Some(request),
            Decision::Suppressed(_) => None,
        }
    }
}

/// 处理结果
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchOutcome {
    pub decision: Decision,
    /// 各展示端的结果
    pub results: Vec<(String, SendResult)>,
}

/// 通知分发器
pub struct NotificationDispatcher {
    rules: Arc<PushRules>,
    presence: Arc<dyn Presence>,
    sinks: Vec<Arc<dyn PresentationSink>>,
    config: NotifierConfig,
    /// 是否为 dry-run 模式
    dry_run: bool,
}

impl NotificationDispatcher {
    pub fn new(rules: Arc<PushRules>, presence: Arc<dyn Presence>, config: NotifierConfig) -> Self {
        Self {
            rules,
            presence,
            sinks: Vec::new(),
            config,
            dry_run: false,
        }
    }

    /// 设置 dry-run 模式
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// 注册展示端
    pub fn register_sink(&mut self, sink: Arc<dyn PresentationSink>) {
        info!(sink = sink.name(), "Registering presentation sink");
        self.sinks.push(sink);
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    pub fn sink_names(&self) -> Vec<&str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }

    pub fn rules(&self) -> &PushRules {
        &self.rules
    }

    pub fn config(&self) -> &NotifierConfig {
        &self.config
    }

    /// 决定事件是否需要通知（不展示）
    pub async fn decide(&self, event: &Event) -> Result<Decision> {
        if self.config.mute_notifications {
            return Ok(Decision::Suppressed(SuppressReason::Muted));
        }
        if !self.presence.is_user_idle_or_hidden() {
            return Ok(Decision::Suppressed(SuppressReason::UserActive));
        }

        let Some(rule) = self.rules.matching_rule_for_event(event).await? else {
            return Ok(Decision::Suppressed(SuppressReason::NoMatchingRule));
        };

        let actions = ActionDecision::resolve(rule.actions());
        if !actions.notify {
            return Ok(Decision::Suppressed(SuppressReason::NotifyDisabled));
        }

        match self.build_request(event, &rule, &actions) {
            Some(request) => Ok(Decision::Notify {
                rule,
                actions,
                request,
            }),
            None => Ok(Decision::Suppressed(SuppressReason::NoMessage)),
        }
    }

    fn build_request(
        &self,
        event: &Event,
        rule: &MatchedRule,
        actions: &ActionDecision,
    ) -> Option<PresentationRequest> {
        let formatter = MessageFormatter::new(self.rules.names(), self.config.user_id.as_deref());
        let body = formatter.message(event)?;
        let room_id = event.room_id().unwrap_or_default().to_string();
        let icon = event
            .user_id()
            .and_then(|user| self.rules.rooms().avatar_url(&room_id, user));

        Some(PresentationRequest {
            title: formatter.title(event),
            body,
            icon,
            click_target: format!("room/{}", room_id),
            tag: self.config.default_tag.clone(),
            audio: self.audio_for(actions),
            dismiss_after_secs: self.config.dismiss_after_secs,
            room_id,
            rule_id: rule.rule_id().to_string(),
        })
    }

    /// 开启声音时由 sound tweak 决定音频：字符串值原样使用，其他值用 `default`
    fn audio_for(&self, actions: &ActionDecision) -> Option<String> {
        if !self.config.audio_notifications {
            return None;
        }
        let sound = match actions.sound()? {
            Value::String(s) if !s.is_empty() => s.clone(),
            _ => "default".to_string(),
        };
        Some(sound)
    }

    /// 完整处理一个事件：决策并展示
    pub async fn process_event(&self, event: &Event) -> Result<DispatchOutcome> {
        let decision = self.decide(event).await?;

        let results = match &decision {
            Decision::Notify { request, .. } => {
                info!(
                    room_id = %request.room_id,
                    rule_id = %request.rule_id,
                    audio = request.audio.is_some(),
                    "Displaying notification"
                );
                self.present(request)
            }
            Decision::Suppressed(reason) => {
                debug!(reason = reason.as_str(), event_type = ?event.event_type(), "Notification suppressed");
                Vec::new()
            }
        };

        Ok(DispatchOutcome { decision, results })
    }

    fn present(&self, request: &PresentationRequest) -> Vec<(String, SendResult)> {
        let mut results = Vec::new();

        for sink in &self.sinks {
            let name = sink.name().to_string();

            if self.dry_run {
                eprintln!("[DRY-RUN] Would present on sink: {}", name);
                results.push((name, SendResult::Skipped("dry-run".to_string())));
                continue;
            }

            let result = match sink.present(request) {
                Ok(r) => r,
                Err(e) => {
                    warn!(sink = %name, error = %e, "Sink present failed");
                    SendResult::Failed(e.to_string())
                }
            };
            results.push((name, result));
        }

        results
    }
}
