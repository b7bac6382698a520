//! 推送规则数据模型
//!
//! 与推送规则 JSON 结构一一对应：
//! ```json
//! {
//!   "global": { "override": [...], "content": [...], "room": [...], "sender": [...], "underride": [...] },
//!   "device": { "<device name>": { "override": [...], ... } }
//! }
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

/// 规则种类，决定匹配优先级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    Override,
    Content,
    Room,
    Sender,
    Underride,
}

impl RuleKind {
    /// 固定的匹配优先级：override > content > room > sender > underride
    pub const PRECEDENCE: [RuleKind; 5] = [
        RuleKind::Override,
        RuleKind::Content,
        RuleKind::Room,
        RuleKind::Sender,
        RuleKind::Underride,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::Override => "override",
            RuleKind::Content => "content",
            RuleKind::Room => "room",
            RuleKind::Sender => "sender",
            RuleKind::Underride => "underride",
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 规则条件
///
/// 反序列化是宽松的，单条坏条件不会让整个规则集解析失败：
/// 未识别的 `kind` 解析为 [`Condition::Unknown`]，求值时视为满足；
/// 缺少 `kind` 或字段类型不对的条件解析为 [`Condition::Malformed`]，求值时视为不满足。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum Condition {
    /// 按点分路径取值，做 glob 匹配
    EventMatch {
        key: Option<String>,
        pattern: Option<String>,
    },
    /// 设备 profile tag（不支持，恒为 false）
    Device { profile_tag: Option<String> },
    /// 消息正文包含当前用户的显示名
    ContainsDisplayName,
    /// 房间成员数比较，如 `">2"`、`"<=10"`
    RoomMemberCount { is: Option<String> },
    /// 未识别的条件类型（保留原始 JSON）
    Unknown(Value),
    /// 格式错误的条件（保留原始 JSON）
    Malformed(Value),
}

impl Condition {
    pub fn event_match(key: impl Into<String>, pattern: impl Into<String>) -> Self {
        Condition::EventMatch {
            key: Some(key.into()),
            pattern: Some(pattern.into()),
        }
    }

    pub fn room_member_count(is: impl Into<String>) -> Self {
        Condition::RoomMemberCount { is: Some(is.into()) }
    }
}

const CONDITION_KINDS: [&str; 4] = ["event_match", "device", "contains_display_name", "room_member_count"];

/// 条件的严格 JSON 形式
#[derive(Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum TaggedCondition {
    EventMatch {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        key: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pattern: Option<String>,
    },
    Device {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        profile_tag: Option<String>,
    },
    ContainsDisplayName,
    RoomMemberCount {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        is: Option<String>,
    },
}

impl From<TaggedCondition> for Condition {
    fn from(tagged: TaggedCondition) -> Self {
        match tagged {
            TaggedCondition::EventMatch { key, pattern } => Condition::EventMatch { key, pattern },
            TaggedCondition::Device { profile_tag } => Condition::Device { profile_tag },
            TaggedCondition::ContainsDisplayName => Condition::ContainsDisplayName,
            TaggedCondition::RoomMemberCount { is } => Condition::RoomMemberCount { is },
        }
    }
}

impl From<Value> for Condition {
    fn from(raw: Value) -> Self {
        let kind = raw.get("kind").and_then(Value::as_str).map(str::to_string);
        match kind.as_deref() {
            Some(kind) if !CONDITION_KINDS.contains(&kind) => Condition::Unknown(raw),
            Some(_) => match serde_json::from_value::<TaggedCondition>(raw.clone()) {
                Ok(tagged) => tagged.into(),
                Err(e) => {
                    warn!(condition = %raw, error = %e, "Malformed push rule condition");
                    Condition::Malformed(raw)
                }
            },
            None => {
                warn!(condition = %raw, "Push rule condition without kind");
                Condition::Malformed(raw)
            }
        }
    }
}

impl From<Condition> for Value {
    fn from(condition: Condition) -> Self {
        let tagged = match condition {
            Condition::Unknown(raw) | Condition::Malformed(raw) => return raw,
            Condition::EventMatch { key, pattern } => TaggedCondition::EventMatch { key, pattern },
            Condition::Device { profile_tag } => TaggedCondition::Device { profile_tag },
            Condition::ContainsDisplayName => TaggedCondition::ContainsDisplayName,
            Condition::RoomMemberCount { is } => TaggedCondition::RoomMemberCount { is },
        };
        serde_json::to_value(tagged).unwrap_or(Value::Null)
    }
}

/// 规则动作
///
/// 无法识别的动作（包括格式错误的 tweak）解析为 [`Action::Other`]，解析时不报错。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "RawAction")]
pub enum Action {
    Notify,
    DontNotify,
    Coalesce,
    /// `{"set_tweak": name, "value": ...}`，value 缺省为 `true`
    SetTweak { name: String, value: Option<Value> },
    /// 未知或格式错误的动作，忽略
    Other(String),
}

impl Action {
    pub fn tweak(name: impl Into<String>, value: Option<Value>) -> Self {
        Action::SetTweak {
            name: name.into(),
            value,
        }
    }
}

impl From<Value> for Action {
    fn from(raw: Value) -> Self {
        match &raw {
            Value::String(token) => match token.as_str() {
                "notify" => Action::Notify,
                "dont_notify" => Action::DontNotify,
                "coalesce" => Action::Coalesce,
                _ => Action::Other(token.clone()),
            },
            Value::Object(map) => match map.get("set_tweak").and_then(Value::as_str) {
                Some(name) => Action::SetTweak {
                    name: name.to_string(),
                    value: map.get("value").filter(|v| !v.is_null()).cloned(),
                },
                None => {
                    warn!(action = %raw, "Malformed push rule action");
                    Action::Other(raw.to_string())
                }
            },
            _ => Action::Other(raw.to_string()),
        }
    }
}

#[derive(Serialize)]
#[serde(untagged)]
enum RawAction {
    Token(String),
    Tweak {
        set_tweak: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        value: Option<Value>,
    },
}

impl From<Action> for RawAction {
    fn from(action: Action) -> Self {
        match action {
            Action::Notify => RawAction::Token("notify".to_string()),
            Action::DontNotify => RawAction::Token("dont_notify".to_string()),
            Action::Coalesce => RawAction::Token("coalesce".to_string()),
            Action::SetTweak { name, value } => RawAction::Tweak {
                set_tweak: name,
                value,
            },
            Action::Other(token) => RawAction::Token(token),
        }
    }
}

fn default_enabled() -> bool {
    true
}

/// 单条推送规则
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub rule_id: String,
    /// `None` 表示服务端下发的规则模板（条件由种类推导）；
    /// `Some(vec![])` 表示无条件匹配
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Vec<Condition>>,
    #[serde(default)]
    pub actions: Vec<Action>,
    /// content 规则的 glob 模式
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub default: bool,
}

impl Rule {
    pub fn new(rule_id: impl Into<String>, conditions: Vec<Condition>, actions: Vec<Action>) -> Self {
        Self {
            rule_id: rule_id.into(),
            conditions: Some(conditions),
            actions,
            pattern: None,
            enabled: true,
            default: false,
        }
    }

    /// content 规则模板
    pub fn content(rule_id: impl Into<String>, pattern: impl Into<String>, actions: Vec<Action>) -> Self {
        Self {
            rule_id: rule_id.into(),
            conditions: None,
            actions,
            pattern: Some(pattern.into()),
            enabled: true,
            default: false,
        }
    }

    /// room / sender 规则模板（rule_id 即房间或用户 ID）
    pub fn template(rule_id: impl Into<String>, actions: Vec<Action>) -> Self {
        Self {
            rule_id: rule_id.into(),
            conditions: None,
            actions,
            pattern: None,
            enabled: true,
            default: false,
        }
    }

    /// 规则在给定种类下实际生效的条件
    ///
    /// 显式条件优先；没有条件的模板按种类推导：
    /// content 匹配 `content.body`，room 匹配 `room_id`，sender 匹配 `user_id`。
    /// content 模板缺少 pattern 时返回 `None`，表示规则无法匹配。
    pub fn effective_conditions(&self, kind: RuleKind) -> Option<Vec<Condition>> {
        if let Some(conditions) = &self.conditions {
            return Some(conditions.clone());
        }
        match kind {
            RuleKind::Content => self
                .pattern
                .as_ref()
                .map(|p| vec![Condition::event_match("content.body", p.clone())]),
            RuleKind::Room => Some(vec![Condition::event_match("room_id", self.rule_id.clone())]),
            RuleKind::Sender => Some(vec![Condition::event_match("user_id", self.rule_id.clone())]),
            RuleKind::Override | RuleKind::Underride => Some(Vec::new()),
        }
    }
}

/// 按种类分组的规则集合（global 或某个 device）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KindSet {
    #[serde(rename = "override", default, deserialize_with = "lenient_rules")]
    pub override_rules: Vec<Rule>,
    #[serde(default, deserialize_with = "lenient_rules")]
    pub content: Vec<Rule>,
    #[serde(default, deserialize_with = "lenient_rules")]
    pub room: Vec<Rule>,
    #[serde(default, deserialize_with = "lenient_rules")]
    pub sender: Vec<Rule>,
    #[serde(default, deserialize_with = "lenient_rules")]
    pub underride: Vec<Rule>,
}

/// 逐条解析规则，跳过无法解析的规则（如缺少 rule_id）
fn lenient_rules<'de, D>(deserializer: D) -> std::result::Result<Vec<Rule>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<Rule>(value) {
            Ok(rule) => Some(rule),
            Err(e) => {
                warn!(error = %e, "Skipping malformed push rule");
                None
            }
        })
        .collect())
}

impl KindSet {
    pub fn rules(&self, kind: RuleKind) -> &[Rule] {
        match kind {
            RuleKind::Override => &self.override_rules,
            RuleKind::Content => &self.content,
            RuleKind::Room => &self.room,
            RuleKind::Sender => &self.sender,
            RuleKind::Underride => &self.underride,
        }
    }

    pub fn is_empty(&self) -> bool {
        RuleKind::PRECEDENCE.iter().all(|k| self.rules(*k).is_empty())
    }
}

/// 用户的完整规则集
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ruleset {
    #[serde(default)]
    pub global: KindSet,
    /// 设备名 -> 规则组，按设备名排序遍历
    #[serde(default)]
    pub device: BTreeMap<String, KindSet>,
}

impl Ruleset {
    pub fn from_json(value: Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }

    pub fn is_empty(&self) -> bool {
        self.global.is_empty() && self.device.values().all(KindSet::is_empty)
    }
}

/// 匹配命中的规则，带上命中时所在的种类
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedRule {
    pub kind: RuleKind,
    /// 命中于某个设备的规则组时为设备名
    pub device: Option<String>,
    pub rule: Rule,
}

impl MatchedRule {
    pub fn rule_id(&self) -> &str {
        &self.rule.rule_id
    }

    pub fn actions(&self) -> &[Action] {
        &self.rule.actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_ruleset() {
        let ruleset = Ruleset::from_json(json!({
            "global": {
                "override": [{
                    "rule_id": ".m.rule.suppress_notices",
                    "conditions": [{"kind": "event_match", "key": "content.msgtype", "pattern": "m.notice"}],
                    "actions": ["dont_notify"]
                }],
                "content": [{
                    "rule_id": "foobar",
                    "pattern": "foo*bar",
                    "actions": ["notify", {"set_tweak": "sound", "value": "default"}]
                }],
                "underride": [{
                    "rule_id": ".m.rule.message",
                    "conditions": [],
                    "actions": ["notify"],
                    "enabled": false
                }]
            },
            "device": {
                "laptop": { "room": [{"rule_id": "!abc:example.org", "actions": ["notify"]}] }
            }
        }))
        .unwrap();

        assert_eq!(ruleset.global.override_rules.len(), 1);
        assert_eq!(ruleset.global.override_rules[0].actions, vec![Action::DontNotify]);
        assert_eq!(ruleset.global.content[0].pattern.as_deref(), Some("foo*bar"));
        assert_eq!(
            ruleset.global.content[0].actions[1],
            Action::tweak("sound", Some(json!("default")))
        );
        assert!(ruleset.global.room.is_empty());
        assert!(!ruleset.global.underride[0].enabled);
        assert_eq!(ruleset.device["laptop"].room[0].rule_id, "!abc:example.org");
    }

    #[test]
    fn test_unknown_condition_kind() {
        let cond: Condition =
            serde_json::from_value(json!({"kind": "sender_notification_permission", "key": "room"}))
                .unwrap();
        assert_eq!(
            cond,
            Condition::Unknown(json!({"kind": "sender_notification_permission", "key": "room"}))
        );
    }

    #[test]
    fn test_condition_variants() {
        let cond: Condition =
            serde_json::from_value(json!({"kind": "room_member_count", "is": "2"})).unwrap();
        assert_eq!(cond, Condition::room_member_count("2"));

        let cond: Condition = serde_json::from_value(json!({"kind": "contains_display_name"})).unwrap();
        assert_eq!(cond, Condition::ContainsDisplayName);

        let cond: Condition = serde_json::from_value(json!({"kind": "event_match", "key": "type"})).unwrap();
        assert_eq!(
            cond,
            Condition::EventMatch {
                key: Some("type".to_string()),
                pattern: None
            }
        );
    }

    #[test]
    fn test_action_serialization() {
        let actions = vec![
            Action::Notify,
            Action::tweak("highlight", None),
            Action::Other("custom".to_string()),
        ];
        let value = serde_json::to_value(&actions).unwrap();
        assert_eq!(value, json!(["notify", {"set_tweak": "highlight"}, "custom"]));
    }

    #[test]
    fn test_effective_conditions_for_templates() {
        let content = Rule::content("foobar", "foo*bar", vec![Action::Notify]);
        assert_eq!(
            content.effective_conditions(RuleKind::Content),
            Some(vec![Condition::event_match("content.body", "foo*bar")])
        );

        let room = Rule::template("!abc:example.org", vec![Action::Notify]);
        assert_eq!(
            room.effective_conditions(RuleKind::Room),
            Some(vec![Condition::event_match("room_id", "!abc:example.org")])
        );

        let sender = Rule::template("@bob:example.org", vec![Action::Notify]);
        assert_eq!(
            sender.effective_conditions(RuleKind::Sender),
            Some(vec![Condition::event_match("user_id", "@bob:example.org")])
        );

        let broken = Rule::template("no-pattern", vec![]);
        assert_eq!(broken.effective_conditions(RuleKind::Content), None);
    }

    #[test]
    fn test_malformed_condition_is_kept_not_fatal() {
        let cond: Condition =
            serde_json::from_value(json!({"kind": "room_member_count", "is": 2})).unwrap();
        assert_eq!(cond, Condition::Malformed(json!({"kind": "room_member_count", "is": 2})));

        let cond: Condition = serde_json::from_value(json!({"key": "type", "pattern": "x"})).unwrap();
        assert!(matches!(cond, Condition::Malformed(_)));

        // 原样写回
        assert_eq!(serde_json::to_value(&cond).unwrap(), json!({"key": "type", "pattern": "x"}));
    }

    #[test]
    fn test_malformed_actions_become_other() {
        let actions: Vec<Action> =
            serde_json::from_value(json!(["notify", {"set_tweak": 5}, 7, {"set_tweak": "sound", "value": null}]))
                .unwrap();
        assert_eq!(actions[0], Action::Notify);
        assert_eq!(actions[1], Action::Other(r#"{"set_tweak":5}"#.to_string()));
        assert_eq!(actions[2], Action::Other("7".to_string()));
        assert_eq!(actions[3], Action::tweak("sound", None));
    }

    #[test]
    fn test_malformed_rule_is_skipped() {
        let ruleset = Ruleset::from_json(json!({
            "global": {
                "override": [
                    {"conditions": [], "actions": ["notify"]},
                    {"rule_id": "bad-count", "conditions": [{"kind": "room_member_count", "is": 2}], "actions": ["notify"]}
                ],
                "underride": null
            }
        }))
        .unwrap();
        assert_eq!(ruleset.global.override_rules.len(), 1);
        assert_eq!(ruleset.global.override_rules[0].rule_id, "bad-count");
        assert!(ruleset.global.underride.is_empty());
    }

    #[test]
    fn test_explicit_conditions_win() {
        let rule = Rule::new("r", vec![], vec![Action::Notify]);
        assert_eq!(rule.effective_conditions(RuleKind::Room), Some(vec![]));
    }

    #[test]
    fn test_rule_kind_display() {
        assert_eq!(RuleKind::Override.to_string(), "override");
        assert_eq!(RuleKind::PRECEDENCE[4], RuleKind::Underride);
    }
}
