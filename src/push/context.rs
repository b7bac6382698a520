//! 外部协作者接口
//!
//! 规则求值和通知分发依赖的房间状态、显示名、在线状态都通过这些 trait 注入。
//! [`StaticRoomDirectory`] 是基于 JSON 描述的实现，供 CLI 和测试使用。

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// 房间 / 成员查询
pub trait RoomDirectory: Send + Sync {
    /// 房间当前成员，未知房间返回 `None`
    fn members(&self, room_id: &str) -> Option<BTreeSet<String>>;

    /// 房间当前成员数
    fn member_count(&self, room_id: &str) -> Option<usize> {
        self.members(room_id).map(|m| m.len())
    }

    /// 成员头像
    fn avatar_url(&self, _room_id: &str, _user_id: &str) -> Option<String> {
        None
    }
}

/// 显示名 / 房间名格式化
pub trait DisplayNames: Send + Sync {
    fn display_name(&self, user_id: &str, room_id: &str) -> String;

    fn room_name(&self, room_id: &str) -> String;
}

/// 在线状态：用户是否空闲或窗口不可见
pub trait Presence: Send + Sync {
    fn is_user_idle_or_hidden(&self) -> bool;
}

/// 固定的在线状态
#[derive(Debug, Clone, Copy)]
pub struct FixedPresence(pub bool);

impl Presence for FixedPresence {
    fn is_user_idle_or_hidden(&self) -> bool {
        self.0
    }
}

/// 成员信息
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemberInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub displayname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// 房间信息
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoomInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub members: BTreeMap<String, MemberInfo>,
}

/// 静态房间目录
///
/// ```json
/// { "rooms": { "!abc:example.org": { "name": "Lobby", "members": { "@alice:example.org": { "displayname": "Alice" } } } } }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StaticRoomDirectory {
    #[serde(default)]
    pub rooms: BTreeMap<String, RoomInfo>,
}

impl StaticRoomDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加成员（房间不存在时自动创建）
    pub fn with_member(
        mut self,
        room_id: impl Into<String>,
        user_id: impl Into<String>,
        displayname: Option<&str>,
    ) -> Self {
        self.rooms
            .entry(room_id.into())
            .or_default()
            .members
            .insert(
                user_id.into(),
                MemberInfo {
                    displayname: displayname.map(str::to_string),
                    avatar_url: None,
                },
            );
        self
    }

    pub fn with_room_name(mut self, room_id: impl Into<String>, name: impl Into<String>) -> Self {
        self.rooms.entry(room_id.into()).or_default().name = Some(name.into());
        self
    }

    fn member(&self, room_id: &str, user_id: &str) -> Option<&MemberInfo> {
        self.rooms.get(room_id)?.members.get(user_id)
    }
}

impl RoomDirectory for StaticRoomDirectory {
    fn members(&self, room_id: &str) -> Option<BTreeSet<String>> {
        self.rooms
            .get(room_id)
            .map(|room| room.members.keys().cloned().collect())
    }

    fn avatar_url(&self, room_id: &str, user_id: &str) -> Option<String> {
        self.member(room_id, user_id)?.avatar_url.clone()
    }
}

impl DisplayNames for StaticRoomDirectory {
    /// 没有 displayname 时退回到 user_id 的 localpart
    fn display_name(&self, user_id: &str, room_id: &str) -> String {
        self.member(room_id, user_id)
            .and_then(|m| m.displayname.clone())
            .filter(|name| !name.is_empty())
            .or_else(|| localpart(user_id).map(str::to_string))
            .unwrap_or_else(|| user_id.to_string())
    }

    fn room_name(&self, room_id: &str) -> String {
        self.rooms
            .get(room_id)
            .and_then(|room| room.name.clone())
            .unwrap_or_else(|| room_id.to_string())
    }
}

/// `@alice:example.org` -> `alice`
pub fn localpart(user_id: &str) -> Option<&str> {
    let rest = user_id.strip_prefix('@')?;
    let (local, server) = rest.rsplit_once(':')?;
    if local.is_empty() || server.is_empty() {
        return None;
    }
    Some(local)
}
