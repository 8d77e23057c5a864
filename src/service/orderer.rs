use crate::models::ReconciliationResult;
use std::cmp::Ordering;

/// 比较器: 已找到 (MATCH/MISMATCH) 在前, NOT_FOUND 在后;
/// 同组内按 SPM 单号升序, 再按明细描述升序
pub fn compare(a: &ReconciliationResult, b: &ReconciliationResult) -> Ordering {
    b.status
        .is_found()
        .cmp(&a.status.is_found())
        .then_with(|| a.spm_key().cmp(b.spm_key()))
        .then_with(|| a.description_key().cmp(b.description_key()))
}

/// 对比对结果做稳定排序, 幂等
pub fn order(results: &[ReconciliationResult]) -> Vec<ReconciliationResult> {
    let mut ordered = results.to_vec();
    ordered.sort_by(compare);
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MatchStatus;

    fn result(spm: Option<&str>, desc: Option<&str>, status: MatchStatus) -> ReconciliationResult {
        ReconciliationResult {
            spm_number: spm.map(str::to_string),
            line_description: desc.map(str::to_string),
            account_code: None,
            account_name: None,
            app_amount: None,
            external_amount: None,
            difference: None,
            status,
        }
    }

    fn sample() -> Vec<ReconciliationResult> {
        vec![
            result(Some("C"), Some("x"), MatchStatus::NotFound),
            result(Some("B"), Some("b"), MatchStatus::Match),
            result(Some("A"), Some("z"), MatchStatus::Mismatch),
            result(None, Some("a"), MatchStatus::NotFound),
            result(Some("A"), Some("y"), MatchStatus::Match),
            result(Some("B"), None, MatchStatus::Mismatch),
        ]
    }

    #[test]
    fn found_entries_precede_not_found() {
        let ordered = order(&sample());
        let first_missing = ordered
            .iter()
            .position(|r| r.status == MatchStatus::NotFound)
            .unwrap();
        assert!(ordered[..first_missing].iter().all(|r| r.status.is_found()));
        assert!(ordered[first_missing..].iter().all(|r| !r.status.is_found()));
    }

    #[test]
    fn ties_break_on_spm_then_description() {
        let ordered = order(&sample());
        let keys: Vec<(&str, &str)> = ordered
            .iter()
            .map(|r| (r.spm_key(), r.description_key()))
            .collect();
        assert_eq!(
            keys,
            vec![("A", "y"), ("A", "z"), ("B", ""), ("B", "b"), ("", "a"), ("C", "x")]
        );
    }

    #[test]
    fn ordering_is_idempotent() {
        let once = order(&sample());
        let twice = order(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn equal_keys_keep_input_order() {
        let mut first = result(Some("A"), Some("same"), MatchStatus::Match);
        first.account_code = Some("1".into());
        let mut second = result(Some("A"), Some("same"), MatchStatus::Mismatch);
        second.account_code = Some("2".into());

        let ordered = order(&[first.clone(), second.clone()]);
        assert_eq!(ordered, vec![first, second]);
    }
}
