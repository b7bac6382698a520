//! 本地文件展示端 - 将所有展示请求写入 JSONL 文件

use tracing::{debug, warn};

use crate::notification::channel::{PresentationRequest, PresentationSink, SendResult};
use crate::notification::store::{PresentationRecord, PresentationStore};
use crate::push::Result;

/// 本地文件展示端 - 记录所有展示请求到本地文件
pub struct LocalFileSink {
    store: PresentationStore,
}

impl LocalFileSink {
    pub fn new(store: PresentationStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &PresentationStore {
        &self.store
    }
}

impl Default for LocalFileSink {
    fn default() -> Self {
        Self::new(PresentationStore::new(PresentationStore::default_path()))
    }
}

impl PresentationSink for LocalFileSink {
    fn name(&self) -> &str {
        "local_file"
    }

    fn present(&self, request: &PresentationRequest) -> Result<SendResult> {
        let mut record = PresentationRecord::from_request(request);
        record.body = truncate_body(&record.body, 200);

        match self.store.append(&record) {
            Ok(()) => {
                debug!(
                    sink = "local_file",
                    room_id = %request.room_id,
                    "Presentation recorded to local file"
                );
                Ok(SendResult::Sent)
            }
            Err(e) => {
                warn!(
                    sink = "local_file",
                    error = %e,
                    "Failed to write presentation to local file"
                );
                Ok(SendResult::Failed(e.to_string()))
            }
        }
    }
}

/// 按字符截断正文
fn truncate_body(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
