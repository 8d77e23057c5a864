use crate::error::ReconcileError;
use crate::models::{ReconciliationResult, ResultSummary};
use crate::service::orderer;
use std::sync::Arc;
use tokio::sync::watch;

/// 一次成功对账的有序结果
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSet {
    pub generation: u64,
    pub results: Vec<ReconciliationResult>,
    pub summary: ResultSummary,
}

/// 提交生命周期: Idle -> Parsing -> Submitting -> Succeeded | Failed
#[derive(Debug, Clone)]
pub enum SubmissionState {
    Idle,
    Parsing,
    Submitting,
    Succeeded(Arc<ResultSet>),
    Failed(ReconcileError),
}

impl SubmissionState {
    pub fn name(&self) -> &'static str {
        match self {
            SubmissionState::Idle => "idle",
            SubmissionState::Parsing => "parsing",
            SubmissionState::Submitting => "submitting",
            SubmissionState::Succeeded(_) => "succeeded",
            SubmissionState::Failed(_) => "failed",
        }
    }
}

/// 一次提交的凭据, generation 不是最新时所有状态更新都被忽略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmissionTicket {
    generation: u64,
}

impl SubmissionTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// 对账提交状态机 (最新请求胜出)
#[derive(Debug)]
pub struct ReconciliationSubmitter {
    generation: u64,
    state: SubmissionState,
    notifier: watch::Sender<Option<Arc<ResultSet>>>,
}

impl Default for ReconciliationSubmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl ReconciliationSubmitter {
    pub fn new() -> Self {
        let (notifier, _) = watch::channel(None);
        Self {
            generation: 0,
            state: SubmissionState::Idle,
            notifier,
        }
    }

    pub fn state(&self) -> &SubmissionState {
        &self.state
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.state, SubmissionState::Parsing | SubmissionState::Submitting)
    }

    /// 最近一次成功的结果
    pub fn latest(&self) -> Option<Arc<ResultSet>> {
        match &self.state {
            SubmissionState::Succeeded(set) => Some(Arc::clone(set)),
            _ => None,
        }
    }

    /// 订阅结果: 每次成功恰好推送一次, 新提交开始时推送 None
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<ResultSet>>> {
        self.notifier.subscribe()
    }

    /// 开始新的一次提交, 丢弃之前的结果 (包括进行中的提交)
    pub fn begin(&mut self) -> SubmissionTicket {
        self.generation += 1;
        if self.is_busy() {
            tracing::warn!("Submission {} superseded by {}", self.generation - 1, self.generation);
        }
        self.state = SubmissionState::Parsing;
        self.notifier.send_replace(None);
        SubmissionTicket {
            generation: self.generation,
        }
    }

    fn is_current(&self, ticket: &SubmissionTicket) -> bool {
        ticket.generation == self.generation
    }

    /// 解析完成, 进入提交阶段
    pub fn parsed(&mut self, ticket: &SubmissionTicket) -> Result<(), ReconcileError> {
        if !self.is_current(ticket) {
            return Err(ReconcileError::Superseded);
        }
        self.state = SubmissionState::Submitting;
        Ok(())
    }

    /// 失败时不保留旧结果, 调用方需从 Idle 重新开始
    pub fn fail(&mut self, ticket: &SubmissionTicket, error: ReconcileError) -> Result<(), ReconcileError> {
        if !self.is_current(ticket) {
            tracing::warn!("Discarding stale failure of submission {}: {}", ticket.generation, error);
            return Err(ReconcileError::Superseded);
        }
        self.state = SubmissionState::Failed(error);
        Ok(())
    }

    /// 排序并发布结果
    pub fn succeed(
        &mut self,
        ticket: &SubmissionTicket,
        results: Vec<ReconciliationResult>,
    ) -> Result<Arc<ResultSet>, ReconcileError> {
        if !self.is_current(ticket) {
            tracing::warn!(
                "Discarding stale results of submission {} ({} rows)",
                ticket.generation,
                results.len()
            );
            return Err(ReconcileError::Superseded);
        }

        let ordered = orderer::order(&results);
        let set = Arc::new(ResultSet {
            generation: ticket.generation,
            summary: ResultSummary::from_results(&ordered),
            results: ordered,
        });

        self.state = SubmissionState::Succeeded(Arc::clone(&set));
        self.notifier.send_replace(Some(Arc::clone(&set)));
        tracing::info!(
            "Submission {} succeeded: {} match, {} mismatch, {} not found",
            set.generation, set.summary.matched, set.summary.mismatched, set.summary.not_found
        );
        Ok(set)
    }

    pub fn reset(&mut self) {
        self.generation += 1;
        self.state = SubmissionState::Idle;
        self.notifier.send_replace(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ParseError, SubmissionError};
    use crate::models::MatchStatus;

    fn result(spm: &str, status: MatchStatus) -> ReconciliationResult {
        ReconciliationResult {
            spm_number: Some(spm.into()),
            line_description: None,
            account_code: None,
            account_name: None,
            app_amount: None,
            external_amount: None,
            difference: None,
            status,
        }
    }

    #[test]
    fn lifecycle_moves_through_states() {
        let mut submitter = ReconciliationSubmitter::new();
        assert_eq!(submitter.state().name(), "idle");

        let ticket = submitter.begin();
        assert_eq!(submitter.state().name(), "parsing");
        assert!(submitter.is_busy());

        submitter.parsed(&ticket).unwrap();
        assert_eq!(submitter.state().name(), "submitting");

        let set = submitter
            .succeed(&ticket, vec![result("B", MatchStatus::NotFound), result("A", MatchStatus::Match)])
            .unwrap();
        assert!(!submitter.is_busy());
        assert_eq!(set.results[0].spm_key(), "A");
        assert_eq!(submitter.latest().unwrap().generation, ticket.generation());
    }

    #[test]
    fn failure_discards_previous_success() {
        let mut submitter = ReconciliationSubmitter::new();
        let first = submitter.begin();
        submitter.succeed(&first, vec![result("A", MatchStatus::Match)]).unwrap();

        let second = submitter.begin();
        assert!(submitter.latest().is_none());
        submitter
            .fail(&second, SubmissionError::RemoteRejected("invalid".into()).into())
            .unwrap();
        assert!(submitter.latest().is_none());
        assert!(matches!(
            submitter.state(),
            SubmissionState::Failed(ReconcileError::Submission(SubmissionError::RemoteRejected(_)))
        ));
    }

    #[test]
    fn stale_completion_never_overwrites_newer_state() {
        let mut submitter = ReconciliationSubmitter::new();
        let old = submitter.begin();
        submitter.parsed(&old).unwrap();
        let new = submitter.begin();

        assert_eq!(
            submitter.succeed(&old, vec![result("OLD", MatchStatus::Match)]),
            Err(ReconcileError::Superseded)
        );
        assert_eq!(
            submitter.fail(&old, ParseError::ReadFailure("x".into()).into()),
            Err(ReconcileError::Superseded)
        );
        assert_eq!(submitter.state().name(), "parsing");

        submitter.parsed(&new).unwrap();
        let set = submitter.succeed(&new, vec![result("NEW", MatchStatus::Match)]).unwrap();
        assert_eq!(set.results[0].spm_key(), "NEW");
    }

    #[tokio::test]
    async fn subscribers_see_each_success_once() {
        let mut submitter = ReconciliationSubmitter::new();
        let mut rx = submitter.subscribe();

        let ticket = submitter.begin();
        submitter.parsed(&ticket).unwrap();
        submitter.succeed(&ticket, vec![result("A", MatchStatus::Match)]).unwrap();

        rx.changed().await.unwrap();
        let seen = rx.borrow_and_update().clone().unwrap();
        assert_eq!(seen.results.len(), 1);
        assert!(!rx.has_changed().unwrap());
    }
}
