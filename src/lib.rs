//! Push Rules - 推送通知规则匹配引擎

pub mod config;
pub mod notification;
pub mod push;

pub use config::NotifierConfig;
pub use push::{
    Action, ActionDecision, Condition, Event, GlobMode, MatchedRule, PushRuleError, PushRules, Rule,
    RuleKind, Ruleset, RulesetCache,
};
pub use notification::{
    Decision, DispatchOutcome, NotificationBuilder, NotificationDispatcher, PresentationRequest,
    PresentationSink, SendResult, SuppressReason,
};
