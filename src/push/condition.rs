//! 条件求值
//!
//! 条件出错（key 缺失、比较语法非法等）一律按不匹配处理，不会中断规则遍历；
//! 未知条件类型视为满足。

use regex::Regex;
use std::sync::OnceLock;
use tracing::trace;

use super::context::{DisplayNames, RoomDirectory};
use super::event::Event;
use super::glob::{GlobCache, GlobMatcher, GlobMode};
use super::rule::Condition;

/// 条件求值器
pub struct ConditionEvaluator<'a> {
    rooms: &'a dyn RoomDirectory,
    names: &'a dyn DisplayNames,
    glob_mode: GlobMode,
    own_user_id: Option<&'a str>,
    /// 未设置时每次求值都重新编译 glob
    globs: Option<&'a GlobCache>,
}

impl<'a> ConditionEvaluator<'a> {
    pub fn new(rooms: &'a dyn RoomDirectory, names: &'a dyn DisplayNames) -> Self {
        Self {
            rooms,
            names,
            glob_mode: GlobMode::default(),
            own_user_id: None,
            globs: None,
        }
    }

    pub fn with_glob_mode(mut self, mode: GlobMode) -> Self {
        self.glob_mode = mode;
        self
    }

    pub fn with_glob_cache(mut self, globs: &'a GlobCache) -> Self {
        self.globs = Some(globs);
        self
    }

    /// contains_display_name 使用的用户；未设置时使用事件发送者
    pub fn with_own_user_id(mut self, user_id: Option<&'a str>) -> Self {
        self.own_user_id = user_id;
        self
    }

    /// 事件是否满足条件
    pub fn evaluate(&self, condition: &Condition, event: &Event) -> bool {
        let result = match condition {
            Condition::EventMatch { key, pattern } => {
                self.event_match(key.as_deref(), pattern.as_deref(), event)
            }
            // TODO: 支持为本客户端实例设置 profile tag 后再按设备匹配
            Condition::Device { .. } => false,
            Condition::ContainsDisplayName => self.contains_display_name(event),
            Condition::RoomMemberCount { is } => self.room_member_count(is.as_deref(), event),
            Condition::Unknown(_) => true,
            Condition::Malformed(_) => false,
        };
        trace!(condition = ?condition, result, "Condition evaluated");
        result
    }

    fn event_match(&self, key: Option<&str>, pattern: Option<&str>, event: &Event) -> bool {
        let (Some(key), Some(pattern)) = (key, pattern) else {
            return false;
        };
        let Some(value) = event.value_for_dotted_key(key).and_then(|v| v.as_str()) else {
            return false;
        };
        match self.globs {
            Some(globs) => globs
                .get(key, pattern, self.glob_mode)
                .map(|m| m.is_match(value))
                .unwrap_or(false),
            None => GlobMatcher::for_key(key, pattern, self.glob_mode)
                .map(|m| m.is_match(value))
                .unwrap_or(false),
        }
    }

    fn contains_display_name(&self, event: &Event) -> bool {
        let Some(body) = event.body().filter(|b| !b.is_empty()) else {
            return false;
        };
        let (Some(user_id), Some(room_id)) = (self.own_user_id.or(event.user_id()), event.room_id())
        else {
            return false;
        };

        let display_name = self.names.display_name(user_id, room_id);
        if display_name.is_empty() {
            return false;
        }
        contains_word(body, &display_name)
    }

    fn room_member_count(&self, is: Option<&str>, event: &Event) -> bool {
        let Some(comparison) = is.and_then(MemberCountComparison::parse) else {
            return false;
        };
        let Some(count) = event.room_id().and_then(|room| self.rooms.member_count(room)) else {
            return false;
        };
        comparison.matches(count)
    }
}

/// 词边界内、区分大小写的字面量查找
pub fn contains_word(haystack: &str, needle: &str) -> bool {
    let pattern = format!(r"\b{}\b", regex::escape(needle));
    Regex::new(&pattern)
        .map(|re| re.is_match(haystack))
        .unwrap_or(false)
}

/// 成员数比较运算符
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountOp {
    Eq,
    Lt,
    Gt,
    Le,
    Ge,
}

/// 解析后的 `room_member_count` 比较式，如 `">2"`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberCountComparison {
    pub op: CountOp,
    pub rhs: u64,
}

fn comparison_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([=<>]*)([0-9]*)$").expect("static regex"))
}

impl MemberCountComparison {
    /// 语法非法、数字缺失或运算符未知时返回 `None`
    pub fn parse(is: &str) -> Option<Self> {
        let caps = comparison_regex().captures(is)?;
        let rhs = caps.get(2)?.as_str().parse::<u64>().ok()?;
        let op = match caps.get(1).map(|m| m.as_str()).unwrap_or("") {
            "" | "==" => CountOp::Eq,
            "<" => CountOp::Lt,
            ">" => CountOp::Gt,
            "<=" => CountOp::Le,
            ">=" => CountOp::Ge,
            _ => return None,
        };
        Some(Self { op, rhs })
    }

    pub fn matches(&self, count: usize) -> bool {
        let count = count as u64;
        match self.op {
            CountOp::Eq => count == self.rhs,
            CountOp::Lt => count < self.rhs,
            CountOp::Gt => count > self.rhs,
            CountOp::Le => count <= self.rhs,
            CountOp::Ge => count >= self.rhs,
        }
    }
}
