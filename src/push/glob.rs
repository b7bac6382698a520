//! Glob 模式 -> 正则
//!
//! `*` 匹配任意长度（非贪婪），`?` 匹配单个字符，`[...]` / `[!...]` 为字符类，
//! 其余正则元字符一律转义。`content.body` 只要求词边界内出现，其余 key 必须整串匹配。
//! 匹配不区分大小写。

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// 按词边界匹配的 key
pub const BODY_KEY: &str = "content.body";

/// Glob 翻译模式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GlobMode {
    /// 完整的 glob 展开
    #[default]
    Strict,
    /// 只转义不展开，`*`、`?`、`[...]` 都按字面量匹配（兼容旧客户端的行为）
    Legacy,
}

/// 锚定方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Anchor {
    /// `\b...\b`
    WordBoundary,
    /// `^...$`
    Full,
}

impl Anchor {
    pub fn for_key(key: &str) -> Self {
        if key == BODY_KEY {
            Anchor::WordBoundary
        } else {
            Anchor::Full
        }
    }
}

/// 编译后的 glob 匹配器
#[derive(Debug, Clone)]
pub struct GlobMatcher {
    regex: Regex,
}

impl GlobMatcher {
    /// 编译 glob
    ///
    /// 翻译结果总是合法的正则；极端情况下（如超出正则大小限制）编译失败，返回 `None`。
    pub fn compile(glob: &str, anchor: Anchor, mode: GlobMode) -> Option<Self> {
        let body = glob_to_regex(glob, mode);
        let pattern = match anchor {
            Anchor::WordBoundary => format!(r"\b{}\b", body),
            Anchor::Full => format!("^{}$", body),
        };
        match RegexBuilder::new(&pattern).case_insensitive(true).build() {
            Ok(regex) => Some(Self { regex }),
            Err(e) => {
                debug!(glob = %glob, error = %e, "Glob pattern failed to compile");
                None
            }
        }
    }

    /// 为某个条件 key 编译（自动选择锚定方式）
    pub fn for_key(key: &str, glob: &str, mode: GlobMode) -> Option<Self> {
        Self::compile(glob, Anchor::for_key(key), mode)
    }

    /// 空字符串永不匹配
    pub fn is_match(&self, value: &str) -> bool {
        !value.is_empty() && self.regex.is_match(value)
    }
}

/// 缓存条目上限，超出后整体清空
const GLOB_CACHE_LIMIT: usize = 1024;

type GlobCacheKey = (Anchor, String, GlobMode);

/// 已编译匹配器的缓存，同一 (锚定方式, glob, 模式) 只编译一次
///
/// 编译失败的结果也会缓存，避免每个事件重复编译。
#[derive(Debug, Default)]
pub struct GlobCache {
    compiled: Mutex<HashMap<GlobCacheKey, Option<Arc<GlobMatcher>>>>,
}

impl GlobCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 取出（必要时编译）某个条件 key 下的匹配器
    pub fn get(&self, key: &str, glob: &str, mode: GlobMode) -> Option<Arc<GlobMatcher>> {
        let cache_key = (Anchor::for_key(key), glob.to_string(), mode);
        let mut compiled = self.compiled.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(hit) = compiled.get(&cache_key) {
            return hit.clone();
        }

        if compiled.len() >= GLOB_CACHE_LIMIT {
            debug!(entries = compiled.len(), "Glob cache full, clearing");
            compiled.clear();
        }
        let matcher = GlobMatcher::compile(glob, cache_key.0, mode).map(Arc::new);
        compiled.insert(cache_key, matcher.clone());
        matcher
    }

    pub fn len(&self) -> usize {
        self.compiled.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 把 glob 翻译成未锚定的正则片段
pub fn glob_to_regex(glob: &str, mode: GlobMode) -> String {
    match mode {
        GlobMode::Legacy => regex::escape(glob),
        GlobMode::Strict => translate_strict(glob),
    }
}

fn translate_strict(glob: &str) -> String {
    let chars: Vec<char> = glob.chars().collect();
    let mut out = String::with_capacity(glob.len() * 2);
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '*' => out.push_str(".*?"),
            '?' => out.push('.'),
            '[' => match translate_class(&chars[i + 1..]) {
                Some((class, consumed)) => {
                    out.push_str(&class);
                    i += consumed;
                }
                None => out.push_str(r"\["),
            },
            c => out.push_str(&regex::escape(c.encode_utf8(&mut [0u8; 4]))),
        }
        i += 1;
    }

    out
}

/// 翻译字符类，`rest` 从 `[` 之后开始
///
/// 返回 (正则字符类, 消耗的字符数含 `]`)。没有闭合的 `]` 或类为空时返回 `None`，
/// 此时 `[` 按字面量处理。
fn translate_class(rest: &[char]) -> Option<(String, usize)> {
    let (negated, start) = match rest.first() {
        Some('!') => (true, 1),
        _ => (false, 0),
    };
    let close = rest[start..].iter().position(|c| *c == ']')? + start;
    if close == start {
        return None;
    }

    let mut class = String::from("[");
    if negated {
        class.push('^');
    }
    for c in &rest[start..close] {
        match c {
            '-' => class.push('-'),
            c => class.push_str(&regex::escape(c.encode_utf8(&mut [0u8; 4]))),
        }
    }
    class.push(']');

    Some((class, close + 1))
}
