use crate::client::{MatchingClient, RecordClient};
use crate::error::{ContextError, ParseError, ReconcileError};
use crate::models::{Page, ReconciliationResult, ResultSummary};
use crate::parser::{self, UploadedFile};
use crate::service::context_gate::{AppliedContext, ContextGate, FeedView, Identity, RecordFeed};
use crate::service::paging::Pager;
use crate::service::submitter::{ReconciliationSubmitter, ResultSet};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// 对账结果的一页 (附统计)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsView {
    pub generation: u64,
    pub page: Page<ReconciliationResult>,
    pub summary: ResultSummary,
}

/// 单个浏览器会话的状态
#[derive(Debug)]
pub struct Session {
    pub gate: ContextGate,
    pub submitter: ReconciliationSubmitter,
    pub feed: RecordFeed,
    pager: Pager,
    paged_generation: u64,
}

impl Session {
    pub fn new(page_size: usize) -> Self {
        Self {
            gate: ContextGate::new(),
            submitter: ReconciliationSubmitter::new(),
            feed: RecordFeed::new(),
            pager: Pager::new(page_size),
            paged_generation: 0,
        }
    }

    /// 换人后上下文, 记录列表和对账结果全部作废
    pub fn observe_identity(&mut self, identity: Identity) {
        if self.gate.observe_identity(identity) {
            self.feed.clear();
            self.submitter.reset();
        }
    }

    /// 上下文真正变化时, 旧上下文的记录 (含进行中的请求) 一并作废
    pub fn apply_context(
        &mut self,
        org_unit_id: Option<i64>,
        fiscal_year: &str,
    ) -> Result<AppliedContext, ContextError> {
        let before = self.gate.snapshot();
        let applied = self.gate.apply(org_unit_id, fiscal_year)?;
        if applied != before {
            self.feed.clear();
        }
        Ok(applied)
    }

    pub fn reset_context(&mut self) {
        self.gate.reset();
        self.feed.clear();
    }

    /// 在最新结果上翻页; 结果被替换时回到第 1 页
    pub fn results_page(&mut self, page_number: Option<usize>) -> Option<ResultsView> {
        let set = self.submitter.latest()?;
        if set.generation != self.paged_generation {
            self.pager.reset(set.results.len());
            self.paged_generation = set.generation;
        }
        if let Some(n) = page_number {
            self.pager.go_to(n);
        }
        Some(view_of(&set, &self.pager))
    }

    pub fn feed_view(&self) -> FeedView {
        self.feed.view(&self.gate)
    }
}

fn view_of(set: &ResultSet, pager: &Pager) -> ResultsView {
    ResultsView {
        generation: set.generation,
        page: pager.window(&set.results),
        summary: set.summary.clone(),
    }
}

pub type SharedSession = Arc<Mutex<Session>>;

struct StoredSession {
    session: SharedSession,
    last_seen: Instant,
    /// 访问序号, 容量满时回收序号最小的
    touched: u64,
}

/// 会话表 (按会话 ID), 空闲超时或超出容量的会话被回收
pub struct SessionStore {
    sessions: DashMap<String, StoredSession>,
    page_size: usize,
    idle_ttl: Duration,
    max_sessions: usize,
    clock: AtomicU64,
}

impl SessionStore {
    pub fn new(page_size: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            page_size,
            idle_ttl: Duration::from_secs(30 * 60),
            max_sessions: 10_000,
            clock: AtomicU64::new(0),
        }
    }

    pub fn with_limits(mut self, idle_ttl: Duration, max_sessions: usize) -> Self {
        self.idle_ttl = idle_ttl;
        self.max_sessions = max_sessions.max(1);
        self
    }

    pub fn get_or_create(&self, session_id: &str) -> SharedSession {
        self.evict_idle();
        if !self.sessions.contains_key(session_id) {
            self.evict_to_capacity();
        }

        let touched = self.clock.fetch_add(1, Ordering::Relaxed);
        let mut entry = self
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(|| StoredSession {
                session: Arc::new(Mutex::new(Session::new(self.page_size))),
                last_seen: Instant::now(),
                touched,
            });
        entry.last_seen = Instant::now();
        entry.touched = touched;
        entry.session.clone()
    }

    /// 登出时调用. 返回会话是否存在
    pub fn remove(&self, session_id: &str) -> bool {
        self.sessions.remove(session_id).is_some()
    }

    fn evict_idle(&self) {
        let idle_ttl = self.idle_ttl;
        self.sessions.retain(|id, stored| {
            let alive = stored.last_seen.elapsed() < idle_ttl;
            if !alive {
                tracing::debug!("Session {} expired after {:?} idle", id, idle_ttl);
            }
            alive
        });
    }

    /// 为新会话腾出一个位置
    fn evict_to_capacity(&self) {
        while self.sessions.len() >= self.max_sessions {
            let oldest = self
                .sessions
                .iter()
                .min_by_key(|e| e.value().touched)
                .map(|e| e.key().clone());
            let Some(id) = oldest else { break };
            tracing::info!("Session store full ({}), evicting {}", self.max_sessions, id);
            self.sessions.remove(&id);
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// 解析 -> 提交 -> 排序, 返回第 1 页
///
/// 锁只在状态转换时持有, 等待远程服务期间不持锁;
/// 期间若有新的提交开始, 本次结果作废 (Superseded).
pub async fn reconcile_upload(
    session: &SharedSession,
    client: &dyn MatchingClient,
    upload: UploadedFile,
    fiscal_year: Option<String>,
) -> Result<ResultsView, ReconcileError> {
    // 1. 重置旧结果, 拿到本次凭据
    let (ticket, fiscal_year) = {
        let mut s = session.lock().await;
        let ticket = s.submitter.begin();
        let applied = s.gate.snapshot();
        let fiscal_year = fiscal_year
            .filter(|y| !y.trim().is_empty())
            .or_else(|| applied.is_applied.then_some(applied.fiscal_year));
        (ticket, fiscal_year)
    };

    // 2. 本地解析 (阻塞线程池), 失败的文件不会发往远程
    let name = upload.name.clone();
    let parsed = tokio::task::spawn_blocking(move || parser::parse(&upload))
        .await
        .unwrap_or_else(|e| Err(ParseError::ReadFailure(format!("parser task failed: {e}"))));
    let rows = match parsed {
        Ok(rows) => rows,
        Err(e) => {
            tracing::warn!("Rejected upload {}: {}", name, e);
            session.lock().await.submitter.fail(&ticket, e.clone().into())?;
            return Err(e.into());
        }
    };
    session.lock().await.submitter.parsed(&ticket)?;

    // 3. 提交匹配服务
    tracing::info!(
        "Submitting {} rows from {} (fiscal year {:?})",
        rows.len(),
        name,
        fiscal_year
    );
    let outcome = client.reconcile(rows, fiscal_year.as_deref()).await;

    // 4. 只有最新的提交可以更新状态
    let mut s = session.lock().await;
    match outcome {
        Ok(results) => {
            s.submitter.succeed(&ticket, results)?;
            s.results_page(Some(1)).ok_or(ReconcileError::Superseded)
        }
        Err(e) => {
            tracing::error!("Reconciliation of {} failed: {}", name, e);
            s.submitter.fail(&ticket, e.clone().into())?;
            Err(e.into())
        }
    }
}

/// 受门控的记录查询: 门控未设置时不发出任何请求
pub async fn load_records(
    session: &SharedSession,
    client: &dyn RecordClient,
    page: usize,
    limit: usize,
) -> FeedView {
    let ticket = {
        let mut guard = session.lock().await;
        let s = &mut *guard;
        match s.feed.begin(&s.gate, page, limit) {
            Some(ticket) => ticket,
            None => {
                tracing::debug!("Record query suppressed: context not applied");
                return s.feed_view();
            }
        }
    };

    let result = client.list_line_items(&ticket.query).await;

    let mut guard = session.lock().await;
    let s = &mut *guard;
    s.feed.complete(&s.gate, &ticket, result);
    s.feed_view()
}
