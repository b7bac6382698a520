//! content 规则 ID 生成

use std::collections::HashSet;

/// 生成 rule_id 时剔除的 glob 特殊字符
pub const GLOB_SPECIAL_CHARS: [char; 5] = ['*', '[', ']', '?', '!'];

/// 由 pattern 生成唯一的 content 规则 ID
///
/// 去掉 glob 特殊字符作为基础 ID；已被占用（或为空）时依次尝试 `<基础ID>2`、`<基础ID>3`……
pub fn generate_content_rule_id<'a, I>(pattern: &str, existing: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let base: String = pattern
        .chars()
        .filter(|c| !GLOB_SPECIAL_CHARS.contains(c))
        .collect();
    let taken: HashSet<&str> = existing.into_iter().collect();

    if !base.is_empty() && !taken.contains(base.as_str()) {
        return base;
    }

    let mut suffix: u64 = 2;
    loop {
        let candidate = format!("{}{}", base, suffix);
        if !taken.contains(candidate.as_str()) {
            return candidate;
        }
        suffix += 1;
    }
}
