//! 规则匹配：按种类优先级和规则顺序找第一条完全匹配的规则

use tracing::debug;

use super::condition::ConditionEvaluator;
use super::event::Event;
use super::rule::{KindSet, MatchedRule, Rule, RuleKind, Ruleset};

/// 规则匹配器
pub struct RuleMatcher<'a> {
    evaluator: ConditionEvaluator<'a>,
}

impl<'a> RuleMatcher<'a> {
    pub fn new(evaluator: ConditionEvaluator<'a>) -> Self {
        Self { evaluator }
    }

    /// 规则是否匹配事件（所有条件都满足；空条件列表直接匹配；已禁用的规则不匹配）
    pub fn rule_matches(&self, rule: &Rule, kind: RuleKind, event: &Event) -> bool {
        if !rule.enabled {
            return false;
        }
        match rule.effective_conditions(kind) {
            Some(conditions) => conditions
                .iter()
                .all(|cond| self.evaluator.evaluate(cond, event)),
            None => false,
        }
    }

    /// 在一组规则里按 override > content > room > sender > underride 找第一条匹配
    pub fn first_match<'r>(&self, event: &Event, kind_set: &'r KindSet) -> Option<(RuleKind, &'r Rule)> {
        for kind in RuleKind::PRECEDENCE {
            for rule in kind_set.rules(kind) {
                if self.rule_matches(rule, kind, event) {
                    return Some((kind, rule));
                }
            }
        }
        None
    }

    /// 在完整规则集里找匹配规则
    ///
    /// 先按设备名顺序遍历各设备的规则组，任一设备命中即返回；都不命中时再遍历 global。
    pub fn matching_rule(&self, event: &Event, ruleset: &Ruleset) -> Option<MatchedRule> {
        for (device, kind_set) in &ruleset.device {
            if let Some((kind, rule)) = self.first_match(event, kind_set) {
                debug!(device = %device, kind = %kind, rule_id = %rule.rule_id, "Device rule matched");
                return Some(MatchedRule {
                    kind,
                    device: Some(device.clone()),
                    rule: rule.clone(),
                });
            }
        }

        let matched = self.first_match(event, &ruleset.global).map(|(kind, rule)| MatchedRule {
            kind,
            device: None,
            rule: rule.clone(),
        });

        match &matched {
            Some(m) => debug!(kind = %m.kind, rule_id = %m.rule_id(), "Global rule matched"),
            None => debug!(event_type = ?event.event_type(), "No push rule matched"),
        }
        matched
    }
}
