use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// 结果表格中的一行案件记录
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CaseRecord {
    /// 序号（第 0 列）
    pub sequence_no: String,
    /// 案件编号显示文本（第 1 列）
    pub case_number_display: String,
    /// 案件编号列中的链接
    pub case_number_link: Option<String>,
    /// 判决/裁定日期显示文本（第 2 列）
    pub order_date_display: String,
    /// 日期列中的链接
    pub order_date_link: Option<String>,
    /// 当事人（第 3 列），可能包含 "Vs" 分隔行
    pub parties: String,
    /// 更正说明（第 4 列）
    pub corrigendum_note: String,
    /// 生成的 PDF 文件名，渲染后才会设置
    pub pdf_artifact_name: Option<String>,
}

fn versus_separator() -> Option<&'static Regex> {
    static VERSUS: OnceLock<Option<Regex>> = OnceLock::new();
    VERSUS
        .get_or_init(|| Regex::new(r"(?i)(?:^|\s)(?:vs\.?|v/s\.?|versus)(?:\s|$)").ok())
        .as_ref()
}

impl CaseRecord {
    /// 按 "Vs" / "versus" 拆分当事人为（申请人, 被申请人）
    ///
    /// 任一侧为空时返回 `None`。
    pub fn parties_split(&self) -> Option<(String, String)> {
        let found = versus_separator()?.find(&self.parties)?;
        let petitioner = self.parties[..found.start()].trim();
        let respondent = self.parties[found.end()..].trim();
        if petitioner.is_empty() || respondent.is_empty() {
            return None;
        }
        Some((petitioner.to_string(), respondent.to_string()))
    }
}
