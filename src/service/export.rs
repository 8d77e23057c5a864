use crate::models::ReconciliationResult;
use bigdecimal::BigDecimal;
use csv::Writer;

const HEADER: [&str; 8] = [
    "spm_number",
    "line_description",
    "account_code",
    "account_name",
    "app_amount",
    "external_amount",
    "difference",
    "status",
];

/// 将 Option<BigDecimal> 转换为 CSV 字符串
fn option_to_csv(val: &Option<BigDecimal>) -> String {
    val.as_ref().map(|v| v.to_string()).unwrap_or_default()
}

/// 导出有序对账结果为 CSV (保持传入顺序)
pub fn export_to_csv(results: &[ReconciliationResult]) -> Result<Vec<u8>, csv::Error> {
    let mut writer = Writer::from_writer(Vec::new());
    writer.write_record(HEADER)?;

    for result in results {
        writer.write_record(&[
            result.spm_key().to_string(),
            result.description_key().to_string(),
            result.account_code.clone().unwrap_or_default(),
            result.account_name.clone().unwrap_or_default(),
            option_to_csv(&result.app_amount),
            option_to_csv(&result.external_amount),
            option_to_csv(&result.difference),
            result.status.as_str().to_string(),
        ])?;
    }

    writer.into_inner().map_err(|e| e.into_error().into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MatchStatus;

    #[test]
    fn writes_header_and_rows_in_order() {
        let results = vec![
            ReconciliationResult {
                spm_number: Some("001/SPM".into()),
                line_description: Some("Belanja, ATK".into()),
                account_code: Some("5.1.02".into()),
                account_name: None,
                app_amount: Some(BigDecimal::from(1500)),
                external_amount: Some(BigDecimal::from(1200)),
                difference: Some(BigDecimal::from(300)),
                status: MatchStatus::Mismatch,
            },
            ReconciliationResult {
                spm_number: None,
                line_description: None,
                account_code: None,
                account_name: None,
                app_amount: None,
                external_amount: None,
                difference: None,
                status: MatchStatus::NotFound,
            },
        ];

        let csv = String::from_utf8(export_to_csv(&results).unwrap()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("spm_number,line_description"));
        assert_eq!(lines[1], "001/SPM,\"Belanja, ATK\",5.1.02,,1500,1200,300,MISMATCH");
        assert_eq!(lines[2], ",,,,,,,NOT_FOUND");
    }
}
