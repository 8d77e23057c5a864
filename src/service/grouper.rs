use crate::models::{GroupedOrder, LineItemRecord};
use bigdecimal::{BigDecimal, Zero};
use indexmap::IndexMap;

/// 将一页扁平明细按 SPM 单号聚合
///
/// 首条记录决定分组的父级信息, 后续同单号记录按出现顺序追加;
/// 分组按 SPM 日期降序 (稳定排序, 同日期保持出现顺序).
/// 每页独立计算, 不跨页合并.
pub fn group(records: &[LineItemRecord]) -> Vec<GroupedOrder> {
    let mut groups: IndexMap<&str, GroupedOrder> = IndexMap::new();

    for record in records {
        let entry = groups
            .entry(record.spm_number.as_str())
            .or_insert_with(|| GroupedOrder {
                spm_number: record.spm_number.clone(),
                spm_date: record.spm_date,
                row_span: 0,
                total_amount: BigDecimal::zero(),
                items: Vec::new(),
            });
        entry.row_span += 1;
        entry.total_amount += &record.amount;
        entry.items.push(record.clone());
    }

    let mut grouped: Vec<GroupedOrder> = groups.into_values().collect();
    grouped.sort_by(|a, b| b.spm_date.cmp(&a.spm_date));

    tracing::debug!("Grouped {} records into {} orders", records.len(), grouped.len());
    grouped
}
