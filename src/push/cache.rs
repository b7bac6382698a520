//! 规则集缓存
//!
//! - 缓存有效时直接返回缓存值
//! - 同一时刻最多只有一次拉取在进行，并发调用者共享这次拉取的结果（成功或失败）
//! - 拉取失败时保留旧值，不自动重试
//! - `invalidate()` 只标记过期，旧值仍可通过 `get_now()` 读取
//! - 拉取在独立的 tokio 任务里执行，调用者全部放弃等待时拉取照常完成并写入缓存
//!
//! 状态由一把同步锁保护，锁从不跨 `.await` 持有，因此每次状态转换都是原子的。

use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

use super::error::{PushRuleError, Result};
use super::rule::Ruleset;
use super::source::RulesetSource;

type FetchFuture = Shared<BoxFuture<'static, Result<Arc<Ruleset>>>>;

#[derive(Default)]
struct CacheState {
    /// 最近一次成功拉取的规则集
    rules: Option<Arc<Ruleset>>,
    /// 缓存是否有效
    current: bool,
    /// 进行中的拉取
    in_flight: Option<FetchFuture>,
    /// 每次失效 +1；拉取期间发生失效时，结果只更新旧值，不标记为有效
    generation: u64,
}

/// 规则集缓存
pub struct RulesetCache {
    source: Arc<dyn RulesetSource>,
    state: Arc<Mutex<CacheState>>,
    fetch_count: Arc<AtomicU64>,
}

fn lock(state: &Mutex<CacheState>) -> MutexGuard<'_, CacheState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl RulesetCache {
    pub fn new(source: Arc<dyn RulesetSource>) -> Self {
        Self {
            source,
            state: Arc::new(Mutex::new(CacheState::default())),
            fetch_count: Arc::new(AtomicU64::new(0)),
        }
    }

    /// 获取规则集（必要时拉取）
    pub async fn get(&self) -> Result<Arc<Ruleset>> {
        let fetch = {
            let mut state = lock(&self.state);
            if state.current {
                if let Some(rules) = &state.rules {
                    return Ok(Arc::clone(rules));
                }
            }
            match state.in_flight.clone() {
                Some(fetch) => {
                    debug!("Joining in-flight push rule fetch");
                    fetch
                }
                None => {
                    let fetch = self.start_fetch(state.generation);
                    state.in_flight = Some(fetch.clone());
                    fetch
                }
            }
        };
        fetch.await
    }

    fn start_fetch(&self, generation: u64) -> FetchFuture {
        let source = Arc::clone(&self.source);
        let task_state = Arc::clone(&self.state);
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        debug!(generation, "Fetching push rules");

        let task = tokio::spawn(async move {
            let result = source.fetch_rules().await.map(Arc::new);

            let mut state = lock(&task_state);
            state.in_flight = None;
            match &result {
                Ok(rules) => {
                    state.rules = Some(Arc::clone(rules));
                    state.current = state.generation == generation;
                    if !state.current {
                        debug!("Push rules invalidated during fetch, keeping result as stale");
                    }
                }
                Err(e) => warn!(error = %e, "Push rule fetch failed"),
            }
            result
        });

        let state = Arc::clone(&self.state);
        async move {
            task.await.unwrap_or_else(|e| {
                // 任务 panic 或被取消时没有机会清理
                lock(&state).in_flight = None;
                warn!(error = %e, "Push rule fetch task failed");
                Err(PushRuleError::Fetch(format!("fetch task failed: {}", e)))
            })
        }
        .boxed()
        .shared()
    }

    /// 标记缓存过期（保留旧值）
    pub fn invalidate(&self) {
        let mut state = lock(&self.state);
        state.current = false;
        state.generation += 1;
        debug!(generation = state.generation, "Push rule cache invalidated");
    }

    /// 立即返回当前已知的规则集（可能过期或为空），不触发拉取
    pub fn get_now(&self) -> Arc<Ruleset> {
        lock(&self.state).rules.clone().unwrap_or_default()
    }

    /// 是否已有过成功的拉取
    pub fn has_rules(&self) -> bool {
        lock(&self.state).rules.is_some()
    }

    pub fn is_current(&self) -> bool {
        let state = lock(&self.state);
        state.current && state.rules.is_some()
    }

    pub fn is_fetching(&self) -> bool {
        lock(&self.state).in_flight.is_some()
    }

    /// 实际发起的拉取次数
    pub fn fetch_count(&self) -> u64 {
        self.fetch_count.load(Ordering::SeqCst)
    }
}
