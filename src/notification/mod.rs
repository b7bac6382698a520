//! 通知分发层 - 规则匹配结果到展示端
//!
//! # 设计目标
//! 1. 统一接口：所有展示端实现 `PresentationSink` trait
//! 2. 策略前置：静音或用户活跃时不做匹配
//! 3. 依赖注入：规则服务、在线状态、展示端都由 `NotificationBuilder` 组装
//!
//! # 使用示例
//! ```ignore
//! use push_rules::notification::NotificationBuilder;
//! use push_rules::NotifierConfig;
//!
//! let dispatcher = NotificationBuilder::new(NotifierConfig::auto_load()?)
//!     .rules_file("rules.json")
//!     .build()?;
//!
//! let outcome = dispatcher.process_event(&event).await?;
//! ```

pub mod builder;
pub mod channel;
pub mod channels;
pub mod dispatcher;
pub mod formatter;
pub mod store;

pub use builder::NotificationBuilder;
pub use channel::{PresentationRequest, PresentationSink, SendResult};
pub use channels::{LocalFileSink, MemorySink};
pub use dispatcher::{Decision, DispatchOutcome, NotificationDispatcher, SuppressReason};
pub use formatter::MessageFormatter;
pub use store::{PresentationRecord, PresentationStore};
