//! 推送规则引擎
//!
//! 给定事件和用户的有序规则集，决定是否通知以及附带哪些展示 tweak（声音、高亮）。
//!
//! 数据流：事件 -> [`RuleMatcher`]（借助 [`RulesetCache`] 和 [`ConditionEvaluator`]）
//! -> 命中规则 -> [`ActionDecision`] -> 通知分发。

pub mod actions;
pub mod cache;
pub mod condition;
pub mod context;
pub mod error;
pub mod event;
pub mod glob;
pub mod matcher;
pub mod rule;
pub mod rule_id;
pub mod service;
pub mod source;

pub use actions::ActionDecision;
pub use cache::RulesetCache;
pub use condition::{ConditionEvaluator, MemberCountComparison};
pub use context::{DisplayNames, FixedPresence, Presence, RoomDirectory, StaticRoomDirectory};
pub use error::{PushRuleError, Result};
pub use event::Event;
pub use glob::{GlobCache, GlobMatcher, GlobMode};
pub use matcher::RuleMatcher;
pub use rule::{Action, Condition, KindSet, MatchedRule, Rule, RuleKind, Ruleset};
pub use rule_id::generate_content_rule_id;
pub use service::PushRules;
pub use source::{FileRuleSource, RuleMutator, RulesetSource, GLOBAL_SCOPE};
