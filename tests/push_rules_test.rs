use std::sync::Arc;

use push_rules::push::{
    generate_content_rule_id, FileRuleSource, GlobMatcher, GlobMode, RuleMatcher, StaticRoomDirectory,
};
use push_rules::push::glob::Anchor;
use push_rules::push::ConditionEvaluator;
use push_rules::{ActionDecision, Event, PushRules, Ruleset};
use serde_json::json;
use tempfile::TempDir;

const ROOM: &str = "!lobby:example.org";

fn ruleset() -> Ruleset {
    Ruleset::from_json(json!({
        "global": {
            "override": [
                {
                    "rule_id": ".m.rule.suppress_notices",
                    "conditions": [{"kind": "event_match", "key": "content.msgtype", "pattern": "m.notice"}],
                    "actions": ["dont_notify"]
                }
            ],
            "content": [
                {
                    "rule_id": "hello",
                    "pattern": "hello*",
                    "actions": ["notify", {"set_tweak": "sound", "value": "default"}, {"set_tweak": "highlight"}]
                }
            ],
            "room": [
                {"rule_id": ROOM, "actions": ["notify"]}
            ],
            "underride": [
                {
                    "rule_id": ".m.rule.room_two",
                    "conditions": [{"kind": "room_member_count", "is": "2"}],
                    "actions": ["notify", {"set_tweak": "sound", "value": "ring"}]
                }
            ]
        }
    }))
    .unwrap()
}

fn directory() -> StaticRoomDirectory {
    StaticRoomDirectory::new()
        .with_member(ROOM, "@alice:example.org", Some("Alice"))
        .with_member(ROOM, "@bob:example.org", Some("Bob"))
        .with_member(ROOM, "@carol:example.org", None)
        .with_member("!dm:example.org", "@alice:example.org", Some("Alice"))
        .with_member("!dm:example.org", "@bob:example.org", Some("Bob"))
}

fn message(room: &str, msgtype: &str, body: &str) -> Event {
    Event::new(json!({
        "type": "m.room.message",
        "room_id": room,
        "user_id": "@bob:example.org",
        "content": {"msgtype": msgtype, "body": body}
    }))
}

#[test]
fn test_kind_precedence_override_beats_content() {
    let dir = directory();
    let matcher = RuleMatcher::new(ConditionEvaluator::new(&dir, &dir));
    let rules = ruleset();

    // notice 同时命中 override 和 content，override 优先
    let matched = matcher
        .matching_rule(&message(ROOM, "m.notice", "hello world"), &rules)
        .unwrap();
    assert_eq!(matched.rule_id(), ".m.rule.suppress_notices");
    assert!(!ActionDecision::resolve(matched.actions()).notify);

    let matched = matcher
        .matching_rule(&message(ROOM, "m.text", "hello world"), &rules)
        .unwrap();
    assert_eq!(matched.rule_id(), "hello");
}

#[test]
fn test_content_word_boundary_and_fallthrough() {
    let dir = directory();
    let matcher = RuleMatcher::new(ConditionEvaluator::new(&dir, &dir));
    let rules = ruleset();

    // "sayhello" 没有词边界，落到 room 规则
    let matched = matcher
        .matching_rule(&message(ROOM, "m.text", "sayhello world"), &rules)
        .unwrap();
    assert_eq!(matched.rule_id(), ROOM);

    // 两人房间落到 underride
    let matched = matcher
        .matching_rule(&message("!dm:example.org", "m.text", "hi"), &rules)
        .unwrap();
    assert_eq!(matched.rule_id(), ".m.rule.room_two");

    // 未知房间无规则命中
    assert!(matcher
        .matching_rule(&message("!other:example.org", "m.text", "hi"), &rules)
        .is_none());
}

#[test]
fn test_literal_glob_matches_only_itself() {
    for literal in ["alice", "m.room.message", "a+b(c)"] {
        let m = GlobMatcher::compile(literal, Anchor::Full, GlobMode::Strict).unwrap();
        assert!(m.is_match(literal));
        assert!(m.is_match(&literal.to_uppercase()));
        assert!(!m.is_match(&format!("{}x", literal)));
        assert!(!m.is_match(&format!("x{}", literal)));
    }
}

#[test]
fn test_action_resolution_examples() {
    let rules = Ruleset::from_json(json!({
        "global": {
            "override": [
                {"rule_id": "a", "conditions": [], "actions": [{"set_tweak": "sound"}]},
                {"rule_id": "b", "conditions": [], "actions": ["notify", {"set_tweak": "sound", "value": "default"}]}
            ]
        }
    }))
    .unwrap();

    let a = ActionDecision::resolve(&rules.global.override_rules[0].actions);
    assert!(!a.notify);
    assert_eq!(a.sound(), Some(&json!(true)));

    let b = ActionDecision::resolve(&rules.global.override_rules[1].actions);
    assert!(b.notify);
    assert_eq!(b.sound(), Some(&json!("default")));
}

#[test]
fn test_generate_rule_id_skips_taken_suffixes() {
    assert_eq!(generate_content_rule_id("foo*bar", Vec::<&str>::new()), "foobar");
    assert_eq!(generate_content_rule_id("foo*bar", ["foobar", "foobar1"]), "foobar2");
}

#[tokio::test]
async fn test_service_roundtrip_through_rules_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rules.json");
    std::fs::write(&path, serde_json::to_string_pretty(&ruleset()).unwrap()).unwrap();

    let source = Arc::new(FileRuleSource::new(&path));
    let rooms = Arc::new(directory());
    let service = PushRules::new(source.clone(), source, rooms.clone(), rooms);

    // 未加载前同步匹配返回空
    assert!(service.matching_rule_for_event_now(&message(ROOM, "m.text", "hello")).is_none());

    let matched = service
        .matching_rule_for_event(&message(ROOM, "m.text", "hello there"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(matched.rule_id(), "hello");
    assert!(service.should_highlight_event(&message(ROOM, "m.text", "hello there")));
    assert!(!service.should_highlight_event(&message(ROOM, "m.text", "goodbye")));

    let id = service
        .add_global_content_rule("good*bye", vec![push_rules::Action::Notify])
        .await
        .unwrap();
    assert_eq!(id, "goodbye");

    // 新增后缓存失效，重新拉取可见
    let matched = service
        .matching_rule_for_event(&message("!other:example.org", "m.text", "goodbye all"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(matched.rule_id(), "goodbye");

    service.delete_global_content_rule("goodbye").await.unwrap();
    assert!(service
        .matching_rule_for_event(&message("!other:example.org", "m.text", "goodbye all"))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_malformed_rule_does_not_break_matching() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rules.json");
    let rules = json!({
        "global": {
            "override": [
                {"rule_id": "bad-count", "conditions": [{"kind": "room_member_count", "is": 2}], "actions": ["notify"]},
                {"rule_id": "no-kind", "conditions": [{"key": "type", "pattern": "*"}], "actions": ["notify"]},
                {"rule_id": "bad-tweak", "conditions": [{"kind": "future_condition"}], "actions": ["dont_notify", {"set_tweak": 5}]}
            ],
            "underride": [
                {"rule_id": "all", "conditions": [], "actions": ["notify"]}
            ]
        }
    });
    std::fs::write(&path, rules.to_string()).unwrap();

    let source = Arc::new(FileRuleSource::new(&path));
    let rooms = Arc::new(directory());
    let service = PushRules::new(source.clone(), source, rooms.clone(), rooms);

    // 未知条件类型视为满足，格式错误的条件不满足
    let matched = service
        .matching_rule_for_event(&message(ROOM, "m.text", "hi"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(matched.rule_id(), "bad-tweak");
    assert!(!ActionDecision::resolve(matched.actions()).notify);

    service
        .add_global_content_rule("hi", vec![push_rules::Action::Notify])
        .await
        .unwrap();
    let ruleset = service.get_rulesets().await.unwrap();
    assert_eq!(ruleset.global.override_rules.len(), 3);
}

#[tokio::test]
async fn test_malformed_conditions_fall_through_to_underride() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rules.json");
    let rules = json!({
        "global": {
            "override": [
                {"rule_id": "bad-count", "conditions": [{"kind": "room_member_count", "is": 2}], "actions": ["notify"]}
            ],
            "underride": [
                {"rule_id": "all", "conditions": [], "actions": ["notify"]}
            ]
        }
    });
    std::fs::write(&path, rules.to_string()).unwrap();

    let source = Arc::new(FileRuleSource::new(&path));
    let rooms = Arc::new(directory());
    let service = PushRules::new(source.clone(), source, rooms.clone(), rooms);

    let matched = service
        .matching_rule_for_event(&message(ROOM, "m.text", "hi"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(matched.rule_id(), "all");
}
