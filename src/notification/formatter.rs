//! 消息格式化模块 - 将房间事件转换为通知标题和正文
//!
//! - `m.room.message`：正文；`m.emote` 显示为 `* <名字> <正文>`；`m.image` 显示为 `<名字> sent an image.`
//! - `m.room.member`：他人加入显示 `<名字> joined`；自己被邀请显示 `<名字> invited you to a room`
//! - 其他事件不生成消息（即使规则要求通知也不展示）

use crate::push::{DisplayNames, Event};

pub const EVENT_MESSAGE: &str = "m.room.message";
pub const EVENT_MEMBER: &str = "m.room.member";

/// 消息格式化器
pub struct MessageFormatter<'a> {
    names: &'a dyn DisplayNames,
    /// 当前用户 ID
    own_user_id: Option<&'a str>,
}

impl<'a> MessageFormatter<'a> {
    pub fn new(names: &'a dyn DisplayNames, own_user_id: Option<&'a str>) -> Self {
        Self { names, own_user_id }
    }

    /// 发送者在该房间的显示名
    pub fn sender_name(&self, event: &Event) -> String {
        match (event.user_id(), event.room_id()) {
            (Some(user), Some(room)) => self.names.display_name(user, room),
            (Some(user), None) => user.to_string(),
            _ => String::new(),
        }
    }

    /// 通知标题：`<发送者显示名> (<房间名>)`
    pub fn title(&self, event: &Event) -> String {
        let room = event
            .room_id()
            .map(|r| self.names.room_name(r))
            .unwrap_or_default();
        format!("{} ({})", self.sender_name(event), room)
    }

    /// 通知正文，不需要展示时返回 `None`
    pub fn message(&self, event: &Event) -> Option<String> {
        match event.event_type()? {
            EVENT_MESSAGE => self.room_message(event),
            EVENT_MEMBER => self.member_message(event),
            _ => None,
        }
    }

    fn room_message(&self, event: &Event) -> Option<String> {
        match event.msgtype() {
            Some("m.emote") => {
                let body = event.body()?;
                Some(format!("* {} {}", self.sender_name(event), body))
            }
            Some("m.image") => Some(format!("{} sent an image.", self.sender_name(event))),
            _ => event.body().filter(|b| !b.is_empty()).map(str::to_string),
        }
    }

    fn member_message(&self, event: &Event) -> Option<String> {
        let state_key = event.state_key()?;
        let is_self = self.own_user_id == Some(state_key);

        match event.membership()? {
            "join" if !is_self => {
                let room = event.room_id()?;
                Some(format!("{} joined", self.names.display_name(state_key, room)))
            }
            "invite" if is_self => Some(format!("{} invited you to a room", self.sender_name(event))),
            _ => None,
        }
    }
}
