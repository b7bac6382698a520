//! 展示记录存储 - 本地 JSONL 文件读写

use anyhow::Result;
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use super::channel::PresentationRequest;

/// 展示记录（JSONL 格式）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresentationRecord {
    /// ISO8601 时间戳
    pub ts: DateTime<Utc>,
    pub room_id: String,
    pub rule_id: String,
    pub title: String,
    pub body: String,
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
}

impl PresentationRecord {
    pub fn from_request(request: &PresentationRequest) -> Self {
        Self {
            ts: Utc::now(),
            room_id: request.room_id.clone(),
            rule_id: request.rule_id.clone(),
            title: request.title.clone(),
            body: request.body.clone(),
            tag: request.tag.clone(),
            audio: request.audio.clone(),
        }
    }
}

/// 展示记录存储
#[derive(Debug, Clone)]
pub struct PresentationStore {
    path: PathBuf,
}

const MAX_RECORDS: usize = 200;
const KEEP_AFTER_CLEANUP: usize = 100;

impl PresentationStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// 默认存储路径
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("push-rules")
            .join("presented.jsonl")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 追加记录（带文件锁），超过上限时只保留最近的记录
    pub fn append(&self, record: &PresentationRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.lock_exclusive()?;
        let written = writeln!(file, "{}", serde_json::to_string(record)?);
        file.unlock()?;
        written?;

        self.maybe_cleanup()
    }

    /// 读取最近 N 条记录
    pub fn read_recent(&self, n: usize) -> Vec<PresentationRecord> {
        let records = self.read_all();
        let start = records.len().saturating_sub(n);
        records[start..].to_vec()
    }

    fn read_all(&self) -> Vec<PresentationRecord> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(_) => return Vec::new(),
        };
        BufReader::new(file)
            .lines()
            .map_while(|line| line.ok())
            .filter_map(|line| serde_json::from_str(&line).ok())
            .collect()
    }

    fn maybe_cleanup(&self) -> Result<()> {
        let records = self.read_all();
        if records.len() <= MAX_RECORDS {
            return Ok(());
        }

        let start = records.len().saturating_sub(KEEP_AFTER_CLEANUP);
        let temp_path = self.path.with_extension("tmp");
        {
            let mut temp_file = File::create(&temp_path)?;
            for record in &records[start..] {
                writeln!(temp_file, "{}", serde_json::to_string(record)?)?;
            }
        }
        // 原子替换
        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}
