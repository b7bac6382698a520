//! 规则源与规则增删服务
//!
//! [`FileRuleSource`] 把规则集保存在本地 JSON 文件里，同时实现拉取和增删，
//! 写入时加文件锁。文件读写和加锁都是阻塞操作，放到 `spawn_blocking` 里执行。

use async_trait::async_trait;
use fs2::FileExt;
use serde_json::{Map, Value};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::error::{PushRuleError, Result};
use super::rule::{RuleKind, Ruleset};

/// 全局规则作用域
pub const GLOBAL_SCOPE: &str = "global";

/// 规则源
#[async_trait]
pub trait RulesetSource: Send + Sync {
    async fn fetch_rules(&self) -> Result<Ruleset>;
}

/// 规则增删服务
///
/// 调用方负责在增删之后让规则缓存失效。
#[async_trait]
pub trait RuleMutator: Send + Sync {
    /// `body` 为规则内容（如 `{"pattern": ..., "actions": [...]}`），不含 rule_id
    async fn add_rule(&self, scope: &str, kind: RuleKind, rule_id: &str, body: Value) -> Result<()>;

    async fn delete_rule(&self, scope: &str, kind: RuleKind, rule_id: &str) -> Result<()>;
}

/// 基于 JSON 文件的规则源
#[derive(Debug, Clone)]
pub struct FileRuleSource {
    path: PathBuf,
}

impl FileRuleSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 读取原始 JSON；文件不存在时视为空规则集
    fn read_raw(&self) -> Result<Value> {
        if !self.path.exists() {
            return Ok(Value::Object(Map::new()));
        }
        let content = fs::read_to_string(&self.path)
            .map_err(|e| PushRuleError::Fetch(format!("{}: {}", self.path.display(), e)))?;
        if content.trim().is_empty() {
            return Ok(Value::Object(Map::new()));
        }
        serde_json::from_str(&content).map_err(|e| PushRuleError::parse("ruleset file", e))
    }

    fn load(&self) -> Result<Ruleset> {
        let raw = self.read_raw()?;
        let ruleset = Ruleset::from_json(raw).map_err(|e| PushRuleError::parse("ruleset", e))?;
        debug!(path = %self.path.display(), "Loaded push rules from file");
        Ok(ruleset)
    }

    /// 加锁读-改-写，文件操作在阻塞线程池里执行
    async fn modify<F>(&self, scope: &str, kind: RuleKind, rule_id: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut Vec<Value>) -> std::result::Result<(), String> + Send + 'static,
    {
        let mutation_err = |reason: String| PushRuleError::Mutation {
            scope: scope.to_string(),
            kind: kind.to_string(),
            rule_id: rule_id.to_string(),
            reason,
        };

        let path = self.path.clone();
        let task_scope = scope.to_string();
        tokio::task::spawn_blocking(move || Self::modify_blocking(&path, &task_scope, kind, f))
            .await
            .map_err(|e| mutation_err(e.to_string()))?
            .map_err(mutation_err)
    }

    fn modify_blocking<F>(path: &Path, scope: &str, kind: RuleKind, f: F) -> std::result::Result<(), String>
    where
        F: FnOnce(&mut Vec<Value>) -> std::result::Result<(), String>,
    {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| e.to_string())?;
            }
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| e.to_string())?;
        file.lock_exclusive().map_err(|e| e.to_string())?;

        let result = Self::modify_locked(&mut file, scope, kind, f);
        let _ = file.unlock();
        result
    }

    fn modify_locked<F>(file: &mut File, scope: &str, kind: RuleKind, f: F) -> std::result::Result<(), String>
    where
        F: FnOnce(&mut Vec<Value>) -> std::result::Result<(), String>,
    {
        let mut content = String::new();
        file.read_to_string(&mut content).map_err(|e| e.to_string())?;
        let mut root: Value = if content.trim().is_empty() {
            Value::Object(Map::new())
        } else {
            serde_json::from_str(&content).map_err(|e| e.to_string())?
        };

        let rules = kind_array_mut(&mut root, scope, kind)?;
        f(rules)?;

        let serialized = serde_json::to_string_pretty(&root).map_err(|e| e.to_string())?;
        file.seek(SeekFrom::Start(0)).map_err(|e| e.to_string())?;
        file.set_len(0).map_err(|e| e.to_string())?;
        file.write_all(serialized.as_bytes()).map_err(|e| e.to_string())?;
        file.flush().map_err(|e| e.to_string())
    }
}

/// 定位 `scope` 下某个种类的规则数组，缺失的层级自动创建
///
/// scope 为 `global` 或 `device/<设备名>`。
fn kind_array_mut<'v>(
    root: &'v mut Value,
    scope: &str,
    kind: RuleKind,
) -> std::result::Result<&'v mut Vec<Value>, String> {
    let root = root
        .as_object_mut()
        .ok_or_else(|| "ruleset file is not a JSON object".to_string())?;

    let kind_set = if scope == GLOBAL_SCOPE {
        root.entry(GLOBAL_SCOPE).or_insert_with(|| Value::Object(Map::new()))
    } else if let Some(device) = scope.strip_prefix("device/").filter(|d| !d.is_empty()) {
        root.entry("device")
            .or_insert_with(|| Value::Object(Map::new()))
            .as_object_mut()
            .ok_or_else(|| "device scope is not an object".to_string())?
            .entry(device)
            .or_insert_with(|| Value::Object(Map::new()))
    } else {
        return Err(format!("unknown scope '{}'", scope));
    };

    kind_set
        .as_object_mut()
        .ok_or_else(|| format!("scope '{}' is not an object", scope))?
        .entry(kind.as_str())
        .or_insert_with(|| Value::Array(Vec::new()))
        .as_array_mut()
        .ok_or_else(|| format!("{}/{} is not an array", scope, kind))
}

fn has_rule_id(rule: &Value, rule_id: &str) -> bool {
    rule.get("rule_id").and_then(|v| v.as_str()) == Some(rule_id)
}

#[async_trait]
impl RulesetSource for FileRuleSource {
    async fn fetch_rules(&self) -> Result<Ruleset> {
        let source = self.clone();
        tokio::task::spawn_blocking(move || source.load())
            .await
            .map_err(|e| PushRuleError::Fetch(format!("{}: {}", self.path.display(), e)))?
    }
}

#[async_trait]
impl RuleMutator for FileRuleSource {
    /// 同 id 的规则会被替换，新规则追加到该种类末尾
    async fn add_rule(&self, scope: &str, kind: RuleKind, rule_id: &str, body: Value) -> Result<()> {
        let mut rule = match body {
            Value::Object(map) => map,
            _ => {
                return Err(PushRuleError::Mutation {
                    scope: scope.to_string(),
                    kind: kind.to_string(),
                    rule_id: rule_id.to_string(),
                    reason: "rule body must be a JSON object".to_string(),
                })
            }
        };
        rule.insert("rule_id".to_string(), Value::String(rule_id.to_string()));

        let id = rule_id.to_string();
        self.modify(scope, kind, rule_id, move |rules| {
            rules.retain(|r| !has_rule_id(r, &id));
            rules.push(Value::Object(rule));
            Ok(())
        })
        .await?;
        info!(scope = %scope, kind = %kind, rule_id = %rule_id, "Push rule added");
        Ok(())
    }

    async fn delete_rule(&self, scope: &str, kind: RuleKind, rule_id: &str) -> Result<()> {
        let id = rule_id.to_string();
        self.modify(scope, kind, rule_id, move |rules| {
            let before = rules.len();
            rules.retain(|r| !has_rule_id(r, &id));
            if rules.len() == before {
                return Err("rule not found".to_string());
            }
            Ok(())
        })
        .await?;
        info!(scope = %scope, kind = %kind, rule_id = %rule_id, "Push rule deleted");
        Ok(())
    }
}
