//! 内存展示端 - 收集展示请求，供嵌入方轮询或测试断言

use std::sync::Mutex;

use crate::notification::channel::{PresentationRequest, PresentationSink, SendResult};
use crate::push::Result;

#[derive(Default)]
pub struct MemorySink {
    presented: Mutex<Vec<PresentationRequest>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已收到的请求（按到达顺序）
    pub fn presented(&self) -> Vec<PresentationRequest> {
        self.presented
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }
}

impl PresentationSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    fn present(&self, request: &PresentationRequest) -> Result<SendResult> {
        match self.presented.lock() {
            Ok(mut presented) => {
                presented.push(request.clone());
                Ok(SendResult::Sent)
            }
            Err(_) => Ok(SendResult::Failed("memory sink poisoned".to_string())),
        }
    }
}
