//! 通知系统构建器 - 按配置组装规则服务、协作者和展示端

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use super::channels::LocalFileSink;
use super::channel::PresentationSink;
use super::dispatcher::NotificationDispatcher;
use super::store::PresentationStore;
use crate::config::NotifierConfig;
use crate::push::{
    DisplayNames, FileRuleSource, FixedPresence, Presence, PushRules, RoomDirectory, RuleMutator,
    RulesetSource, StaticRoomDirectory,
};

/// 通知系统构建器
pub struct NotificationBuilder {
    config: NotifierConfig,
    rules_path: Option<PathBuf>,
    source: Option<(Arc<dyn RulesetSource>, Arc<dyn RuleMutator>)>,
    rooms: Option<(Arc<dyn RoomDirectory>, Arc<dyn DisplayNames>)>,
    presence: Arc<dyn Presence>,
    sinks: Vec<Arc<dyn PresentationSink>>,
    dry_run: bool,
}

impl NotificationBuilder {
    pub fn new(config: NotifierConfig) -> Self {
        Self {
            config,
            rules_path: None,
            source: None,
            rooms: None,
            // 默认视为空闲，所有事件都走规则匹配
            presence: Arc::new(FixedPresence(true)),
            sinks: Vec::new(),
            dry_run: false,
        }
    }

    /// 使用本地 JSON 规则文件
    pub fn rules_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.rules_path = Some(path.into());
        self
    }

    /// 使用自定义规则源和增删服务
    pub fn rule_source(mut self, source: Arc<dyn RulesetSource>, mutator: Arc<dyn RuleMutator>) -> Self {
        self.source = Some((source, mutator));
        self
    }

    pub fn room_directory(mut self, rooms: Arc<dyn RoomDirectory>, names: Arc<dyn DisplayNames>) -> Self {
        self.rooms = Some((rooms, names));
        self
    }

    pub fn presence(mut self, presence: Arc<dyn Presence>) -> Self {
        self.presence = presence;
        self
    }

    pub fn sink(mut self, sink: Arc<dyn PresentationSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// 设置 dry-run 模式
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// 构建规则服务
    pub fn build_rules(&mut self) -> Result<Arc<PushRules>> {
        let (source, mutator) = match (self.source.take(), self.rules_path.take()) {
            (Some(pair), _) => pair,
            (None, Some(path)) => {
                info!(path = %path.display(), "Using file push rule source");
                let file = Arc::new(FileRuleSource::new(path));
                (file.clone() as Arc<dyn RulesetSource>, file as Arc<dyn RuleMutator>)
            }
            (None, None) => anyhow::bail!("No push rule source configured"),
        };

        let (rooms, names) = self.rooms.take().unwrap_or_else(|| {
            let dir = Arc::new(StaticRoomDirectory::new());
            (dir.clone() as Arc<dyn RoomDirectory>, dir as Arc<dyn DisplayNames>)
        });

        Ok(Arc::new(
            PushRules::new(source, mutator, rooms, names)
                .with_glob_mode(self.config.glob_mode)
                .with_own_user_id(self.config.user_id.clone()),
        ))
    }

    /// 构建 NotificationDispatcher
    pub fn build(mut self) -> Result<NotificationDispatcher> {
        let rules = self.build_rules()?;
        let mut dispatcher = NotificationDispatcher::new(rules, self.presence.clone(), self.config.clone())
            .with_dry_run(self.dry_run);

        if let Some(path) = &self.config.record_path {
            info!(sink = "local_file", path = %path.display(), "Enabling local file sink");
            dispatcher.register_sink(Arc::new(LocalFileSink::new(PresentationStore::new(path.clone()))));
        }
        for sink in self.sinks {
            dispatcher.register_sink(sink);
        }

        Ok(dispatcher)
    }
}
