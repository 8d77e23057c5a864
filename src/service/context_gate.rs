use crate::error::{ContextError, FetchError};
use crate::models::{GroupedOrder, RecordPage, RecordQuery};
use crate::service::grouper;
use serde::{Deserialize, Serialize};

/// 已认证的操作人 (由外部鉴权层提供)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub actor_id: String,
    /// 账号绑定的单位, 存在时不可切换
    pub pinned_org_unit: Option<i64>,
}

/// 当前生效的查询上下文 (单位 + 年度)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedContext {
    pub org_unit_id: Option<i64>,
    pub fiscal_year: String,
    pub is_applied: bool,
}

impl AppliedContext {
    fn unset() -> Self {
        Self {
            org_unit_id: None,
            fiscal_year: String::new(),
            is_applied: false,
        }
    }
}

/// (单位, 年度): 记录列表的数据归属
type ContextKey = (Option<i64>, String);

#[derive(Debug, Clone, PartialEq, Eq)]
enum GateState {
    Unset,
    Set { org_unit_id: Option<i64>, fiscal_year: String },
}

/// 上下文门控: 未显式应用前, 依赖上下文的查询一律不发出
#[derive(Debug, Clone)]
pub struct ContextGate {
    identity: Option<Identity>,
    state: GateState,
}

impl Default for ContextGate {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextGate {
    pub fn new() -> Self {
        Self {
            identity: None,
            state: GateState::Unset,
        }
    }

    /// 身份变化时无条件回到 Unset. 返回是否发生了重置
    pub fn observe_identity(&mut self, identity: Identity) -> bool {
        let changed = self.identity.as_ref() != Some(&identity);
        if changed {
            if self.is_set() {
                tracing::info!("Identity changed to {}, context reset", identity.actor_id);
            }
            self.state = GateState::Unset;
            self.identity = Some(identity);
        }
        changed
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn apply(
        &mut self,
        org_unit_id: Option<i64>,
        fiscal_year: &str,
    ) -> Result<AppliedContext, ContextError> {
        let identity = self.identity.as_ref().ok_or(ContextError::NoIdentity)?;

        let fiscal_year = fiscal_year.trim();
        if fiscal_year.is_empty() {
            return Err(ContextError::MissingFiscalYear);
        }

        let org_unit_id = match identity.pinned_org_unit {
            Some(pinned) => match org_unit_id {
                None => Some(pinned),
                Some(requested) if requested == pinned => Some(pinned),
                Some(_) => return Err(ContextError::OrgUnitPinned { pinned }),
            },
            None => org_unit_id,
        };

        self.state = GateState::Set {
            org_unit_id,
            fiscal_year: fiscal_year.to_string(),
        };
        tracing::info!(
            "Context applied by {}: org_unit={:?}, fiscal_year={}",
            identity.actor_id, org_unit_id, fiscal_year
        );
        Ok(self.snapshot())
    }

    pub fn reset(&mut self) {
        self.state = GateState::Unset;
    }

    pub fn is_set(&self) -> bool {
        matches!(self.state, GateState::Set { .. })
    }

    /// 当前上下文快照; 未应用时, 绑定单位的账号仍显示其单位
    pub fn snapshot(&self) -> AppliedContext {
        match &self.state {
            GateState::Set { org_unit_id, fiscal_year } => AppliedContext {
                org_unit_id: *org_unit_id,
                fiscal_year: fiscal_year.clone(),
                is_applied: true,
            },
            GateState::Unset => AppliedContext {
                org_unit_id: self.identity.as_ref().and_then(|i| i.pinned_org_unit),
                ..AppliedContext::unset()
            },
        }
    }

    fn context_key(&self) -> Option<ContextKey> {
        match &self.state {
            GateState::Set { org_unit_id, fiscal_year } => Some((*org_unit_id, fiscal_year.clone())),
            GateState::Unset => None,
        }
    }

    /// 只有 Set 状态才能构造查询
    pub fn query(&self, page: usize, limit: usize) -> Option<RecordQuery> {
        match &self.state {
            GateState::Set { org_unit_id, fiscal_year } => Some(RecordQuery {
                org_unit_id: *org_unit_id,
                fiscal_year: fiscal_year.clone(),
                page: page.max(1),
                limit: limit.max(1),
            }),
            GateState::Unset => None,
        }
    }
}

/// 一次记录查询的凭据, 用于丢弃过期响应
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    generation: u64,
    pub query: RecordQuery,
}

impl FetchTicket {
    fn context_key(&self) -> ContextKey {
        (self.query.org_unit_id, self.query.fiscal_year.clone())
    }
}

/// 聚合后的一页记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupedPage {
    pub groups: Vec<GroupedOrder>,
    pub page: usize,
    pub total_pages: usize,
    pub total_count: usize,
}

/// 记录列表的展示状态
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedView {
    pub context: AppliedContext,
    pub loading: bool,
    /// 正在加载新页时展示的是上一页数据
    pub is_placeholder: bool,
    pub data: Option<GroupedPage>,
    pub error: Option<String>,
}

/// 受门控的记录列表: 同一上下文翻页时保留上一页, 切换上下文时清空
#[derive(Debug, Default)]
pub struct RecordFeed {
    generation: u64,
    context: Option<ContextKey>,
    pending: Option<u64>,
    current: Option<GroupedPage>,
    error: Option<String>,
}

impl RecordFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// 门控未设置时返回 None, 调用方不得发出请求
    pub fn begin(&mut self, gate: &ContextGate, page: usize, limit: usize) -> Option<FetchTicket> {
        let Some(query) = gate.query(page, limit) else {
            self.clear();
            return None;
        };

        self.generation += 1;
        let ticket = FetchTicket {
            generation: self.generation,
            query,
        };
        let key = ticket.context_key();
        if self.context.as_ref() != Some(&key) {
            self.current = None;
            self.context = Some(key);
        }

        self.pending = Some(ticket.generation);
        self.error = None;
        Some(ticket)
    }

    /// 只接受最新一次请求的结果, 且其上下文必须仍是门控当前的上下文. 返回是否被采纳
    pub fn complete(
        &mut self,
        gate: &ContextGate,
        ticket: &FetchTicket,
        result: Result<RecordPage, FetchError>,
    ) -> bool {
        if self.pending != Some(ticket.generation) {
            tracing::warn!(
                "Discarding stale record page {} (generation {})",
                ticket.query.page, ticket.generation
            );
            return false;
        }
        self.pending = None;

        if gate.context_key() != Some(ticket.context_key()) {
            tracing::warn!(
                "Discarding record page {} fetched for fiscal year {}: context changed",
                ticket.query.page, ticket.query.fiscal_year
            );
            self.context = None;
            self.current = None;
            self.error = None;
            return false;
        }

        match result {
            Ok(page) => {
                self.current = Some(GroupedPage {
                    groups: grouper::group(&page.items),
                    page: ticket.query.page,
                    total_pages: page.total_pages.max(1),
                    total_count: page.total_count,
                });
            }
            Err(e) => {
                tracing::error!("Record fetch failed: {}", e);
                self.error = Some(e.to_string());
            }
        }
        true
    }

    /// 上下文被重置或身份变化时调用
    pub fn clear(&mut self) {
        self.generation += 1;
        self.context = None;
        self.pending = None;
        self.current = None;
        self.error = None;
    }

    /// 数据只在其所属上下文下展示
    pub fn view(&self, gate: &ContextGate) -> FeedView {
        let owned = self.context.is_some() && self.context == gate.context_key();
        let loading = owned && self.pending.is_some();
        let data = if owned { self.current.clone() } else { None };
        FeedView {
            context: gate.snapshot(),
            loading,
            is_placeholder: loading && data.is_some(),
            data,
            error: if owned { self.error.clone() } else { None },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LineItemRecord;
    use bigdecimal::BigDecimal;
    use chrono::NaiveDate;

    fn admin() -> Identity {
        Identity {
            actor_id: "admin".into(),
            pinned_org_unit: None,
        }
    }

    fn operator(unit: i64) -> Identity {
        Identity {
            actor_id: format!("op-{unit}"),
            pinned_org_unit: Some(unit),
        }
    }

    fn page_of(spm: &str) -> RecordPage {
        RecordPage {
            items: vec![LineItemRecord {
                id: 1,
                spm_number: spm.into(),
                spm_date: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
                account_code: "5.1.01".into(),
                account_name: None,
                amount: BigDecimal::from(10),
                completeness: 50.0,
            }],
            total_pages: 2,
            total_count: 12,
        }
    }

    #[test]
    fn unset_gate_suppresses_queries_until_applied() {
        let mut gate = ContextGate::new();
        let mut feed = RecordFeed::new();
        gate.observe_identity(admin());

        let mut fetches = 0;
        for page in 1..=3 {
            if feed.begin(&gate, page, 10).is_some() {
                fetches += 1;
            }
        }
        assert_eq!(fetches, 0);
        assert!(!feed.view(&gate).context.is_applied);

        gate.apply(Some(4), "2024").unwrap();
        let ticket = feed.begin(&gate, 1, 10).unwrap();
        assert_eq!(ticket.query.org_unit_id, Some(4));
        assert_eq!(ticket.query.fiscal_year, "2024");
    }

    #[test]
    fn identity_change_resets_applied_context() {
        let mut gate = ContextGate::new();
        gate.observe_identity(admin());
        gate.apply(None, "2024").unwrap();
        assert!(gate.is_set());

        assert!(!gate.observe_identity(admin()));
        assert!(gate.is_set());

        assert!(gate.observe_identity(operator(9)));
        assert!(!gate.is_set());
        assert_eq!(gate.query(1, 10), None);
    }

    #[test]
    fn pinned_org_unit_is_not_selectable() {
        let mut gate = ContextGate::new();
        gate.observe_identity(operator(7));
        assert_eq!(gate.snapshot().org_unit_id, Some(7));

        assert_eq!(
            gate.apply(Some(8), "2024"),
            Err(ContextError::OrgUnitPinned { pinned: 7 })
        );
        let applied = gate.apply(None, " 2025 ").unwrap();
        assert_eq!(applied.org_unit_id, Some(7));
        assert_eq!(applied.fiscal_year, "2025");
    }

    #[test]
    fn apply_requires_identity_and_fiscal_year() {
        let mut gate = ContextGate::new();
        assert_eq!(gate.apply(None, "2024"), Err(ContextError::NoIdentity));
        gate.observe_identity(admin());
        assert_eq!(gate.apply(None, "  "), Err(ContextError::MissingFiscalYear));
        assert!(!gate.is_set());
    }

    #[test]
    fn page_change_keeps_previous_data_while_loading() {
        let mut gate = ContextGate::new();
        let mut feed = RecordFeed::new();
        gate.observe_identity(admin());
        gate.apply(None, "2024").unwrap();

        let first = feed.begin(&gate, 1, 10).unwrap();
        assert!(feed.complete(&gate, &first, Ok(page_of("001/SPM"))));

        let _second = feed.begin(&gate, 2, 10).unwrap();
        let view = feed.view(&gate);
        assert!(view.loading);
        assert!(view.is_placeholder);
        assert_eq!(view.data.unwrap().groups[0].spm_number, "001/SPM");
    }

    #[test]
    fn context_change_clears_previous_data() {
        let mut gate = ContextGate::new();
        let mut feed = RecordFeed::new();
        gate.observe_identity(admin());
        gate.apply(None, "2024").unwrap();

        let first = feed.begin(&gate, 1, 10).unwrap();
        feed.complete(&gate, &first, Ok(page_of("001/SPM")));

        gate.apply(None, "2025").unwrap();
        feed.begin(&gate, 1, 10).unwrap();
        let view = feed.view(&gate);
        assert!(view.loading);
        assert!(!view.is_placeholder);
        assert!(view.data.is_none());
    }

    #[test]
    fn stale_response_is_discarded() {
        let mut gate = ContextGate::new();
        let mut feed = RecordFeed::new();
        gate.observe_identity(admin());
        gate.apply(None, "2024").unwrap();

        let slow = feed.begin(&gate, 1, 10).unwrap();
        let fast = feed.begin(&gate, 2, 10).unwrap();
        assert!(feed.complete(&gate, &fast, Ok(page_of("002/SPM"))));
        assert!(!feed.complete(&gate, &slow, Ok(page_of("001/SPM"))));

        let data = feed.view(&gate).data.unwrap();
        assert_eq!(data.page, 2);
        assert_eq!(data.groups[0].spm_number, "002/SPM");
    }

    #[test]
    fn failed_fetch_keeps_last_page() {
        let mut gate = ContextGate::new();
        let mut feed = RecordFeed::new();
        gate.observe_identity(admin());
        gate.apply(None, "2024").unwrap();

        let first = feed.begin(&gate, 1, 10).unwrap();
        feed.complete(&gate, &first, Ok(page_of("001/SPM")));
        let second = feed.begin(&gate, 2, 10).unwrap();
        feed.complete(&gate, &second, Err(FetchError::NetworkFailure("timeout".into())));

        let view = feed.view(&gate);
        assert!(!view.loading);
        assert_eq!(view.data.unwrap().page, 1);
        assert!(view.error.unwrap().contains("timeout"));
    }

    #[test]
    fn response_for_replaced_context_is_discarded() {
        let mut gate = ContextGate::new();
        let mut feed = RecordFeed::new();
        gate.observe_identity(admin());
        gate.apply(None, "2024").unwrap();

        let in_flight = feed.begin(&gate, 1, 10).unwrap();
        gate.apply(None, "2025").unwrap();
        assert!(!feed.view(&gate).loading);

        assert!(!feed.complete(&gate, &in_flight, Ok(page_of("001/SPM"))));
        let view = feed.view(&gate);
        assert_eq!(view.context.fiscal_year, "2025");
        assert!(!view.loading);
        assert!(view.data.is_none());

        // 新上下文下的请求照常采纳
        let fresh = feed.begin(&gate, 1, 10).unwrap();
        assert!(feed.complete(&gate, &fresh, Ok(page_of("002/SPM"))));
        assert_eq!(feed.view(&gate).data.unwrap().groups[0].spm_number, "002/SPM");
    }
}
