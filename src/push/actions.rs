//! 动作解析：把命中规则的动作列表折叠成通知决策

use serde::Serialize;
use serde_json::{Map, Value};

use super::rule::Action;

/// 动作折叠结果
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ActionDecision {
    pub notify: bool,
    /// tweak 名 -> 值，重复的 tweak 后写覆盖先写
    pub tweaks: Map<String, Value>,
}

impl ActionDecision {
    /// 折叠动作列表
    ///
    /// `notify` / `coalesce` 置 notify=true，`dont_notify` 置 false，以最后出现的为准；
    /// tweak 未给值时默认为 `true`；未知字符串动作忽略。
    pub fn resolve(actions: &[Action]) -> Self {
        actions.iter().fold(Self::default(), |mut decision, action| {
            match action {
                Action::Notify | Action::Coalesce => decision.notify = true,
                Action::DontNotify => decision.notify = false,
                Action::SetTweak { name, value } => {
                    decision
                        .tweaks
                        .insert(name.clone(), value.clone().unwrap_or(Value::Bool(true)));
                }
                Action::Other(_) => {}
            }
            decision
        })
    }

    pub fn tweak(&self, name: &str) -> Option<&Value> {
        self.tweaks.get(name)
    }

    /// highlight tweak 是否为真值（`false`、`null`、空串、0 视为假）
    pub fn highlight(&self) -> bool {
        self.tweak("highlight").map(is_truthy).unwrap_or(false)
    }

    pub fn sound(&self) -> Option<&Value> {
        self.tweak("sound")
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
