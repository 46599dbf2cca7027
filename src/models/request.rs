//! 查询请求与案件类型目录

use std::collections::HashSet;
use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// 德里高等法院案件类型（与查询页面下拉框的可见文本一致，顺序保持不变）
pub const DEFAULT_CASE_TYPES: &[&str] = &[
    "ARB.A.", "ARB. A. (COMM.)", "ARB.P.", "BAIL APPLN.", "CA", "CA (COMM.IPD-CR)",
    "C.A.(COMM.IPD-GI)", "C.A.(COMM.IPD-PAT)", "C.A.(COMM.IPD-PV)", "C.A.(COMM.IPD-TM)",
    "CAVEAT(CO.)", "CC", "CC(COMM)", "CCP(CO.)", "CCP(O)", "CCP(REF)", "CEAC", "CEAR",
    "CHAT.A.C.", "CHAT.A.REF", "CM APPL.", "CMI", "CM(M)", "CM(M)-IPD", "C.O.", "CO.APP.",
    "CO.APPL.", "CO.APPL.(C)", "CO.APPL.(M)", "CO.A(SB)", "C.O.(COMM.IPD-CR)",
    "C.O.(COMM.IPD-GI)", "C.O.(COMM.IPD-PAT)", "C.O. (COMM.IPD-TM)", "CO.EX.",
    "CONT.APP.(C)", "CONT.CAS(C)", "CONT.CAS.(CRL)", "CO.PET.", "CO.SEC.REF", "CRL.A.",
    "CRL.C.REF.", "CRL.L.P.", "CRL.M.A.", "CRL.M.(BAIL)", "CRL.M.C.", "CRL.M.(CO.)",
    "CRL.M.I.", "CRL.O.", "CRL.O.(CO.)", "CRL.REF.", "CRL.REV.P.", "CRL.REV.P.(MAT.)",
    "CRL.REV.P.(NDPS)", "CRL.REV.P.(NI)", "C.R.P.", "CRP-IPD", "C.RULE", "CS(COMM)",
    "CS(COMM) INFRA", "CS(OS)", "CUSAA", "CUS.A.C.", "CUS.A.R.", "CUSTOM A.",
    "DEATH SENTENCE REF.", "EDC", "EDR", "EFA(COMM)", "EFA(OS)", "EFA(OS) (COMM)",
    "EFA(OS)(IPD)", "EL.PET.", "ETR", "EX.APPL.(OS)", "EX.F.A.", "EX.P.", "EX.S.A.", "FAO",
    "FAO (COMM)", "FAO-IPD", "FAO(OS)", "FAO(OS) (COMM)", "FAO(OS)(IPD)", "GCAC", "GCAR",
    "GTA", "GTC", "GTR", "I.A.", "I.P.A.", "ITA", "ITC", "ITR", "ITSA", "LA.APP.", "LPA",
    "MAC.APP.", "MAT.", "MAT.APP.", "MAT.APP.(F.C.)", "MAT.CASE", "MAT.REF.",
    "MISC. APPEAL(PMLA)", "O.A.", "OA", "OCJA", "O.M.P.", "O.M.P. (COMM)", "OMP (CONT.)",
    "O.M.P. (E)", "O.M.P. (E) (COMM.)", "O.M.P.(EFA)(COMM.)", "O.M.P. (ENF.)",
    "OMP (ENF.) (COMM.)", "O.M.P.(I)", "O.M.P.(I) (COMM.)", "O.M.P. (MISC.)",
    "O.M.P.(MISC.)(COMM.)", "O.M.P.(T)", "O.M.P. (T) (COMM.)", "O.REF.", "RC.REV.",
    "RC.S.A.", "RERA APPEAL", "REVIEW PET.", "RFA", "RFA(COMM)", "RFA-IPD", "RFA(OS)",
    "RFA(OS)(COMM)", "RFA(OS)(IPD)", "RSA", "SCA", "SDR", "SERTA", "ST.APPL.", "ST.REF.",
    "SUR.T.REF.", "TEST.CAS.", "TR.P.(C)", "TR.P.(C.)", "TR.P.(CRL.)", "VAT APPEAL",
    "W.P.(C)", "W.P.(C)-IPD", "WP(C)(IPD)", "W.P.(CRL)", "WTA", "WTC", "WTR",
];

/// 一次案件查询请求
///
/// 创建后不可修改，由工作流消费一次。案件编号与年份原样提交，
/// 格式是否合法由目标站点判断。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    case_type: String,
    case_number: String,
    filing_year: String,
}

impl SearchRequest {
    pub fn new(
        case_type: impl Into<String>,
        case_number: impl Into<String>,
        filing_year: impl Into<String>,
    ) -> Self {
        Self {
            case_type: case_type.into(),
            case_number: case_number.into(),
            filing_year: filing_year.into(),
        }
    }

    pub fn case_type(&self) -> &str {
        &self.case_type
    }

    pub fn case_number(&self) -> &str {
        &self.case_number
    }

    pub fn filing_year(&self) -> &str {
        &self.filing_year
    }
}

impl Display for SearchRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {}/{}",
            self.case_type, self.case_number, self.filing_year
        )
    }
}

/// 案件类型目录
///
/// 启动时注入的有序、不可变集合。请求中的案件类型必须与其中某一项完全一致。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseTypeCatalog {
    entries: Vec<String>,
}

impl CaseTypeCatalog {
    /// 从有序列表构建目录
    ///
    /// 拒绝空目录、空白项、首尾带空格的项以及重复项。
    pub fn new<I, S>(entries: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entries: Vec<String> = entries.into_iter().map(Into::into).collect();
        if entries.is_empty() {
            return Err(ConfigError::EmptyCatalog);
        }

        let mut seen = HashSet::new();
        for entry in &entries {
            if entry.trim().is_empty() || entry.trim() != entry {
                return Err(ConfigError::InvalidCaseType {
                    value: entry.clone(),
                });
            }
            if !seen.insert(entry.as_str()) {
                return Err(ConfigError::DuplicateCaseType {
                    value: entry.clone(),
                });
            }
        }

        Ok(Self { entries })
    }

    /// 精确匹配（区分大小写，不做任何规范化）
    pub fn contains(&self, case_type: &str) -> bool {
        self.entries.iter().any(|entry| entry == case_type)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for CaseTypeCatalog {
    fn default() -> Self {
        Self {
            entries: DEFAULT_CASE_TYPES.iter().map(|s| s.to_string()).collect(),
        }
    }
}
