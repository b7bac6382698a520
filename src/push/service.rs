//! 推送规则服务：缓存 + 匹配 + 规则增删
//!
//! # 使用示例
//! ```ignore
//! use push_rules::push::{PushRules, FileRuleSource, StaticRoomDirectory};
//!
//! let source = Arc::new(FileRuleSource::new("rules.json"));
//! let rooms = Arc::new(StaticRoomDirectory::new());
//! let rules = PushRules::new(source.clone(), source, rooms.clone(), rooms);
//!
//! if let Some(rule) = rules.matching_rule_for_event(&event).await? {
//!     println!("matched {}", rule.rule_id());
//! }
//! ```

use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

use super::actions::ActionDecision;
use super::cache::RulesetCache;
use super::condition::ConditionEvaluator;
use super::context::{DisplayNames, RoomDirectory};
use super::error::Result;
use super::event::Event;
use super::glob::{GlobCache, GlobMode};
use super::matcher::RuleMatcher;
use super::rule::{Action, MatchedRule, RuleKind, Ruleset};
use super::rule_id::generate_content_rule_id;
use super::source::{RuleMutator, RulesetSource, GLOBAL_SCOPE};

/// 推送规则服务
pub struct PushRules {
    cache: RulesetCache,
    mutator: Arc<dyn RuleMutator>,
    rooms: Arc<dyn RoomDirectory>,
    names: Arc<dyn DisplayNames>,
    glob_mode: GlobMode,
    own_user_id: Option<String>,
    globs: GlobCache,
}

impl PushRules {
    pub fn new(
        source: Arc<dyn RulesetSource>,
        mutator: Arc<dyn RuleMutator>,
        rooms: Arc<dyn RoomDirectory>,
        names: Arc<dyn DisplayNames>,
    ) -> Self {
        Self {
            cache: RulesetCache::new(source),
            mutator,
            rooms,
            names,
            glob_mode: GlobMode::default(),
            own_user_id: None,
            globs: GlobCache::new(),
        }
    }

    pub fn with_glob_mode(mut self, mode: GlobMode) -> Self {
        self.glob_mode = mode;
        self
    }

    /// 当前用户（contains_display_name 条件按此用户的显示名匹配）
    pub fn with_own_user_id(mut self, user_id: Option<String>) -> Self {
        self.own_user_id = user_id;
        self
    }

    pub fn cache(&self) -> &RulesetCache {
        &self.cache
    }

    pub fn rooms(&self) -> &dyn RoomDirectory {
        self.rooms.as_ref()
    }

    pub fn names(&self) -> &dyn DisplayNames {
        self.names.as_ref()
    }

    /// 让规则缓存失效
    pub fn clear_cache(&self) {
        self.cache.invalidate();
    }

    pub async fn get_rulesets(&self) -> Result<Arc<Ruleset>> {
        self.cache.get().await
    }

    fn matcher(&self) -> RuleMatcher<'_> {
        let evaluator = ConditionEvaluator::new(self.rooms.as_ref(), self.names.as_ref())
            .with_glob_mode(self.glob_mode)
            .with_own_user_id(self.own_user_id.as_deref())
            .with_glob_cache(&self.globs);
        RuleMatcher::new(evaluator)
    }

    /// 用指定规则集匹配
    pub fn matching_rule_with(&self, event: &Event, ruleset: &Ruleset) -> Option<MatchedRule> {
        self.matcher().matching_rule(event, ruleset)
    }

    /// 匹配事件（必要时等待规则拉取）
    pub async fn matching_rule_for_event(&self, event: &Event) -> Result<Option<MatchedRule>> {
        let ruleset = self.get_rulesets().await?;
        Ok(self.matching_rule_with(event, &ruleset))
    }

    /// 用当前缓存立即匹配，不等待拉取（缓存可能过期或为空）
    pub fn matching_rule_for_event_now(&self, event: &Event) -> Option<MatchedRule> {
        let ruleset = self.cache.get_now();
        self.matching_rule_with(event, &ruleset)
    }

    /// 事件是否需要高亮：命中规则、notify 为真且 highlight tweak 为真值
    pub fn should_highlight_event(&self, event: &Event) -> bool {
        let Some(rule) = self.matching_rule_for_event_now(event) else {
            return false;
        };
        let decision = ActionDecision::resolve(rule.actions());
        decision.notify && decision.highlight()
    }

    /// 新增全局 content 规则，返回生成的 rule_id
    pub async fn add_global_content_rule(&self, pattern: &str, actions: Vec<Action>) -> Result<String> {
        if !self.cache.has_rules() {
            self.get_rulesets().await?;
        }

        let rules = self.cache.get_now();
        let rule_id = generate_content_rule_id(
            pattern,
            rules.global.content.iter().map(|r| r.rule_id.as_str()),
        );
        debug!(pattern = %pattern, rule_id = %rule_id, "Generated content rule id");

        let body = json!({ "pattern": pattern, "actions": actions });
        self.add_rule(RuleKind::Content, &rule_id, body).await?;
        Ok(rule_id)
    }

    /// 新增全局 room 规则（rule_id 即房间 ID）
    pub async fn add_global_room_rule(&self, room_id: &str, actions: Vec<Action>) -> Result<()> {
        self.add_rule(RuleKind::Room, room_id, json!({ "actions": actions }))
            .await
    }

    /// 新增全局 sender 规则（rule_id 即用户 ID）
    pub async fn add_global_sender_rule(&self, user_id: &str, actions: Vec<Action>) -> Result<()> {
        self.add_rule(RuleKind::Sender, user_id, json!({ "actions": actions }))
            .await
    }

    pub async fn delete_global_content_rule(&self, rule_id: &str) -> Result<()> {
        self.delete_rule(RuleKind::Content, rule_id).await
    }

    pub async fn delete_global_room_rule(&self, room_id: &str) -> Result<()> {
        self.delete_rule(RuleKind::Room, room_id).await
    }

    pub async fn delete_global_sender_rule(&self, user_id: &str) -> Result<()> {
        self.delete_rule(RuleKind::Sender, user_id).await
    }

    async fn add_rule(&self, kind: RuleKind, rule_id: &str, body: Value) -> Result<()> {
        let result = self.mutator.add_rule(GLOBAL_SCOPE, kind, rule_id, body).await;
        self.cache.invalidate();
        result?;
        info!(kind = %kind, rule_id = %rule_id, "Added global push rule");
        Ok(())
    }

    async fn delete_rule(&self, kind: RuleKind, rule_id: &str) -> Result<()> {
        let result = self.mutator.delete_rule(GLOBAL_SCOPE, kind, rule_id).await;
        self.cache.invalidate();
        result?;
        info!(kind = %kind, rule_id = %rule_id, "Deleted global push rule");
        Ok(())
    }
}
