//! Push Rules CLI
//!
//! 用本地规则文件对事件做推送规则匹配

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

use push_rules::notification::channels::MemorySink;
use push_rules::push::{
    generate_content_rule_id, DisplayNames, FileRuleSource, FixedPresence, RoomDirectory,
    RulesetSource, StaticRoomDirectory,
};
use push_rules::{
    Action, ActionDecision, Decision, Event, GlobMode, NotificationBuilder, NotifierConfig, RuleKind,
};

#[derive(Parser)]
#[command(name = "pushrules")]
#[command(about = "Push Rules - 推送通知规则匹配")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct RuleArgs {
    /// 规则集 JSON 文件
    #[arg(long, short)]
    rules: PathBuf,
    /// 房间目录 JSON 文件（成员、显示名、房间名）
    #[arg(long)]
    rooms: Option<PathBuf>,
    /// 配置文件（默认按 PUSH_RULES_CONFIG / ~/.config/push-rules/config.json 加载）
    #[arg(long)]
    config: Option<PathBuf>,
    /// 当前用户 ID（覆盖配置）
    #[arg(long)]
    user_id: Option<String>,
    /// 使用旧版 glob 行为（只转义不展开）
    #[arg(long)]
    legacy_glob: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// 匹配事件，输出命中的规则和动作
    Match {
        #[command(flatten)]
        rules: RuleArgs,
        /// 事件 JSON 文件
        #[arg(long, short)]
        event: PathBuf,
    },
    /// 判断事件是否需要高亮
    Highlight {
        #[command(flatten)]
        rules: RuleArgs,
        #[arg(long, short)]
        event: PathBuf,
    },
    /// 完整处理事件（决策并展示）
    Process {
        #[command(flatten)]
        rules: RuleArgs,
        #[arg(long, short)]
        event: PathBuf,
        /// 模拟用户在前台活跃
        #[arg(long)]
        active: bool,
        /// Dry-run 模式（只打印不展示）
        #[arg(long)]
        dry_run: bool,
    },
    /// 预览 content 规则自动生成的 rule_id
    RuleId {
        #[arg(long, short)]
        rules: PathBuf,
        pattern: String,
    },
    /// 新增全局 content 规则
    AddContent {
        #[command(flatten)]
        rules: RuleArgs,
        pattern: String,
        /// 声音 tweak
        #[arg(long)]
        sound: Option<String>,
        /// 高亮
        #[arg(long)]
        highlight: bool,
    },
    /// 删除全局规则
    Delete {
        #[command(flatten)]
        rules: RuleArgs,
        /// 规则种类：content / room / sender
        #[arg(long, short)]
        kind: String,
        rule_id: String,
    },
}

fn read_event(path: &Path) -> Result<Event> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read event {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse event {}", path.display()))?;
    Ok(Event::new(value))
}

fn load_config(args: &RuleArgs) -> Result<NotifierConfig> {
    let mut config = match &args.config {
        Some(path) => NotifierConfig::load_from(path)?,
        None => NotifierConfig::auto_load()?,
    };
    if let Some(user_id) = &args.user_id {
        config.user_id = Some(user_id.clone());
    }
    if args.legacy_glob {
        config.glob_mode = GlobMode::Legacy;
    }
    Ok(config)
}

fn load_rooms(path: Option<&Path>) -> Result<StaticRoomDirectory> {
    match path {
        Some(path) => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read rooms {}", path.display()))?;
            serde_json::from_str(&content).with_context(|| format!("Failed to parse rooms {}", path.display()))
        }
        None => Ok(StaticRoomDirectory::new()),
    }
}

fn builder(args: &RuleArgs) -> Result<NotificationBuilder> {
    let config = load_config(args)?;
    let rooms = Arc::new(load_rooms(args.rooms.as_deref())?);
    Ok(NotificationBuilder::new(config)
        .rules_file(&args.rules)
        .room_directory(rooms.clone() as Arc<dyn RoomDirectory>, rooms as Arc<dyn DisplayNames>))
}

fn parse_kind(kind: &str) -> Result<RuleKind> {
    match kind {
        "content" => Ok(RuleKind::Content),
        "room" => Ok(RuleKind::Room),
        "sender" => Ok(RuleKind::Sender),
        other => anyhow::bail!("Unsupported rule kind '{}' (expected content, room or sender)", other),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // 通过 RUST_LOG 环境变量控制日志级别，默认为 info
    // 例如: RUST_LOG=debug pushrules match -r rules.json -e event.json
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("push_rules=info,pushrules=info"));

    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Match { rules, event } => {
            let event = read_event(&event)?;
            let service = builder(&rules)?.build_rules()?;
            match service.matching_rule_for_event(&event).await? {
                Some(rule) => {
                    let decision = ActionDecision::resolve(rule.actions());
                    let output = json!({
                        "rule_id": rule.rule_id(),
                        "kind": rule.kind,
                        "device": rule.device,
                        "actions": rule.actions(),
                        "decision": decision,
                    });
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
                None => println!("{}", json!({ "rule_id": null })),
            }
        }
        Commands::Highlight { rules, event } => {
            let event = read_event(&event)?;
            let service = builder(&rules)?.build_rules()?;
            service.get_rulesets().await?;
            println!("{}", service.should_highlight_event(&event));
        }
        Commands::Process {
            rules,
            event,
            active,
            dry_run,
        } => {
            let event = read_event(&event)?;
            let sink = Arc::new(MemorySink::new());
            let dispatcher = builder(&rules)?
                .presence(Arc::new(FixedPresence(!active)))
                .sink(sink.clone())
                .dry_run(dry_run)
                .build()?;

            let outcome = dispatcher.process_event(&event).await?;
            match &outcome.decision {
                Decision::Notify { request, .. } => {
                    println!("{}", serde_json::to_string_pretty(request)?);
                    for (sink, result) in &outcome.results {
                        eprintln!("  {}: {:?}", sink, result);
                    }
                }
                Decision::Suppressed(reason) => println!("suppressed: {}", reason.as_str()),
            }
        }
        Commands::RuleId { rules, pattern } => {
            let ruleset = FileRuleSource::new(rules).fetch_rules().await?;
            let id = generate_content_rule_id(
                &pattern,
                ruleset.global.content.iter().map(|r| r.rule_id.as_str()),
            );
            println!("{}", id);
        }
        Commands::AddContent {
            rules,
            pattern,
            sound,
            highlight,
        } => {
            let service = builder(&rules)?.build_rules()?;
            let mut actions = vec![Action::Notify];
            if let Some(sound) = sound {
                actions.push(Action::tweak("sound", Some(json!(sound))));
            }
            if highlight {
                actions.push(Action::tweak("highlight", None));
            }
            let rule_id = service.add_global_content_rule(&pattern, actions).await?;
            println!("{}", rule_id);
        }
        Commands::Delete {
            rules,
            kind,
            rule_id,
        } => {
            let service = builder(&rules)?.build_rules()?;
            match parse_kind(&kind)? {
                RuleKind::Content => service.delete_global_content_rule(&rule_id).await?,
                RuleKind::Room => service.delete_global_room_rule(&rule_id).await?,
                RuleKind::Sender => service.delete_global_sender_rule(&rule_id).await?,
                RuleKind::Override | RuleKind::Underride => unreachable!("rejected by parse_kind"),
            }
            println!("deleted {}/{}", kind, rule_id);
        }
    }

    Ok(())
}
