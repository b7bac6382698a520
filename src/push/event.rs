//! 待匹配的事件
//!
//! 事件保持为原始 JSON，规则条件通过点分路径（如 `content.body`）读取任意字段。

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 发送者字段；部分事件只带 `sender`
pub const USER_ID_KEY: &str = "user_id";
pub const SENDER_KEY: &str = "sender";

/// 房间事件（匹配期间不可变）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Event(Value);

impl Event {
    pub fn new(raw: Value) -> Self {
        Self(raw)
    }

    /// 原始 JSON
    pub fn raw(&self) -> &Value {
        &self.0
    }

    fn str_field(&self, name: &str) -> Option<&str> {
        self.0.get(name)?.as_str()
    }

    /// 事件类型，如 `m.room.message`
    pub fn event_type(&self) -> Option<&str> {
        self.str_field("type")
    }

    pub fn room_id(&self) -> Option<&str> {
        self.str_field("room_id")
    }

    /// 发送者，兼容 `user_id` 与 `sender` 两种字段名
    pub fn user_id(&self) -> Option<&str> {
        self.str_field(USER_ID_KEY).or_else(|| self.str_field(SENDER_KEY))
    }

    pub fn state_key(&self) -> Option<&str> {
        self.str_field("state_key")
    }

    pub fn content(&self) -> Option<&Value> {
        self.0.get("content")
    }

    /// `content.body`（必须是字符串）
    pub fn body(&self) -> Option<&str> {
        self.content()?.get("body")?.as_str()
    }

    pub fn msgtype(&self) -> Option<&str> {
        self.content()?.get("msgtype")?.as_str()
    }

    /// `content.membership`
    pub fn membership(&self) -> Option<&str> {
        self.content()?.get("membership")?.as_str()
    }

    /// 按点分路径逐段读取字段
    ///
    /// 任一段不存在或中间值不是对象时返回 `None`。只检查存在性，
    /// 空字符串、0 等值照常返回，由调用方决定如何处理。
    /// 顶层 `user_id` 缺失时回退到 `sender`，与 [`Event::user_id`] 一致。
    pub fn value_for_dotted_key(&self, key: &str) -> Option<&Value> {
        if key.is_empty() {
            return None;
        }
        let found = key
            .split('.')
            .try_fold(&self.0, |current, part| current.as_object()?.get(part));
        match found {
            None if key == USER_ID_KEY => self.0.get(SENDER_KEY),
            found => found,
        }
    }
}

impl From<Value> for Event {
    fn from(raw: Value) -> Self {
        Self(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message() -> Event {
        Event::new(json!({
            "type": "m.room.message",
            "room_id": "!abc:example.org",
            "user_id": "@alice:example.org",
            "content": {
                "msgtype": "m.text",
                "body": "hello world",
                "count": 0,
                "nested": { "empty": "" }
            }
        }))
    }

    #[test]
    fn test_accessors() {
        let ev = message();
        assert_eq!(ev.event_type(), Some("m.room.message"));
        assert_eq!(ev.room_id(), Some("!abc:example.org"));
        assert_eq!(ev.user_id(), Some("@alice:example.org"));
        assert_eq!(ev.body(), Some("hello world"));
        assert_eq!(ev.msgtype(), Some("m.text"));
        assert_eq!(ev.state_key(), None);
    }

    #[test]
    fn test_sender_fallback() {
        let ev = Event::new(json!({"sender": "@bob:example.org"}));
        assert_eq!(ev.user_id(), Some("@bob:example.org"));
    }

    #[test]
    fn test_dotted_user_id_falls_back_to_sender() {
        let ev = Event::new(json!({"sender": "@bob:example.org"}));
        assert_eq!(ev.value_for_dotted_key("user_id"), Some(&json!("@bob:example.org")));

        // 两者都有时以 user_id 为准
        let ev = Event::new(json!({"user_id": "@alice:example.org", "sender": "@bob:example.org"}));
        assert_eq!(ev.value_for_dotted_key("user_id"), Some(&json!("@alice:example.org")));
    }

    #[test]
    fn test_dotted_key_traverses_nested_objects() {
        let ev = message();
        assert_eq!(
            ev.value_for_dotted_key("content.body"),
            Some(&json!("hello world"))
        );
        assert_eq!(ev.value_for_dotted_key("type"), Some(&json!("m.room.message")));
    }

    #[test]
    fn test_dotted_key_keeps_empty_and_zero_values() {
        let ev = message();
        assert_eq!(ev.value_for_dotted_key("content.count"), Some(&json!(0)));
        assert_eq!(ev.value_for_dotted_key("content.nested.empty"), Some(&json!("")));
    }

    #[test]
    fn test_dotted_key_missing_segment() {
        let ev = message();
        assert_eq!(ev.value_for_dotted_key("content.missing"), None);
        assert_eq!(ev.value_for_dotted_key("content.body.deeper"), None);
        assert_eq!(ev.value_for_dotted_key(""), None);
    }
}
