//! 工作流的终态结果

use serde::{Deserialize, Serialize};

use crate::error::WorkflowError;
use crate::models::record::CaseRecord;

/// 面向最终用户的通用失败提示，不包含任何诊断细节
pub const GENERIC_FAILURE_MESSAGE: &str =
    "Could not retrieve the case details. Please check the case number and try again later.";

/// 失败发生的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    /// 请求校验（案件类型不在目录中）
    Validation,
    /// 浏览器会话建立或页面操作
    Browser,
    /// 导航或挑战媒体下载时的网络故障
    Network,
    /// 控件定位
    Locate,
    /// 表单填写
    Fill,
    /// 验证码
    Challenge,
    /// 提交
    Submit,
    /// 提交后没有结果表格
    NoResultsTable,
    /// 表格存在但没有有效行
    NoResults,
    /// 整体运行超时
    Timeout,
    /// 被调用方取消
    Cancelled,
}

impl FailureStage {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureStage::Validation => "validation",
            FailureStage::Browser => "browser",
            FailureStage::Network => "network",
            FailureStage::Locate => "locate",
            FailureStage::Fill => "fill",
            FailureStage::Challenge => "challenge",
            FailureStage::Submit => "submit",
            FailureStage::NoResultsTable => "no_results_table",
            FailureStage::NoResults => "no_results",
            FailureStage::Timeout => "timeout",
            FailureStage::Cancelled => "cancelled",
        }
    }

    /// 阶段级别的固定说明，不携带任何底层原因
    pub fn summary(self) -> &'static str {
        match self {
            FailureStage::Validation => "案件类型不在目录中",
            FailureStage::Browser => "浏览器会话失败",
            FailureStage::Network => "网络请求失败",
            FailureStage::Locate => "页面控件无法定位",
            FailureStage::Fill => "表单填写失败",
            FailureStage::Challenge => "验证码未能解决",
            FailureStage::Submit => "表单提交失败",
            FailureStage::NoResultsTable => "提交后没有结果表格",
            FailureStage::NoResults => "结果表格中没有可解析的行",
            FailureStage::Timeout => "会话超时",
            FailureStage::Cancelled => "会话被取消",
        }
    }
}

impl std::fmt::Display for FailureStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 一次工作流运行的终态：要么成功（至少一条记录），要么带阶段标签的失败
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WorkflowOutcome {
    Success {
        records: Vec<CaseRecord>,
        /// 第一条记录，兼容只消费单条结果的调用方
        primary: CaseRecord,
    },
    Failure {
        stage: FailureStage,
        /// 只有阶段说明；原因、地址和诊断留在账本与调试文件里
        message: String,
    },
}

impl WorkflowOutcome {
    /// 由解析结果构建成功结果；记录为空时返回 `None`
    pub fn success(records: Vec<CaseRecord>) -> Option<Self> {
        let primary = records.first()?.clone();
        Some(WorkflowOutcome::Success { records, primary })
    }

    pub fn failure(error: &WorkflowError) -> Self {
        let stage = error.stage();
        WorkflowOutcome::Failure {
            stage,
            message: stage.summary().to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, WorkflowOutcome::Success { .. })
    }

    pub fn stage(&self) -> Option<FailureStage> {
        match self {
            WorkflowOutcome::Success { .. } => None,
            WorkflowOutcome::Failure { stage, .. } => Some(*stage),
        }
    }

    pub fn records(&self) -> &[CaseRecord] {
        match self {
            WorkflowOutcome::Success { records, .. } => records,
            WorkflowOutcome::Failure { .. } => &[],
        }
    }

    pub fn primary(&self) -> Option<&CaseRecord> {
        match self {
            WorkflowOutcome::Success { primary, .. } => Some(primary),
            WorkflowOutcome::Failure { .. } => None,
        }
    }

    pub fn total_count(&self) -> usize {
        self.records().len()
    }

    /// 可以展示给用户的失败提示
    pub fn user_message(&self) -> Option<&'static str> {
        match self {
            WorkflowOutcome::Success { .. } => None,
            WorkflowOutcome::Failure { .. } => Some(GENERIC_FAILURE_MESSAGE),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_requires_records() {
        assert!(WorkflowOutcome::success(Vec::new()).is_none());

        let record = CaseRecord {
            sequence_no: "1".to_string(),
            ..Default::default()
        };
        let outcome = WorkflowOutcome::success(vec![record.clone()]).unwrap();
        assert_eq!(outcome.primary(), Some(&record));
        assert_eq!(outcome.total_count(), 1);
        assert!(outcome.user_message().is_none());
    }

    #[test]
    fn test_failure_message_is_generic() {
        let outcome = WorkflowOutcome::failure(&WorkflowError::NoResultsTable);
        assert_eq!(outcome.stage(), Some(FailureStage::NoResultsTable));
        assert_eq!(outcome.user_message(), Some(GENERIC_FAILURE_MESSAGE));
        assert!(outcome.records().is_empty());
    }

    #[test]
    fn test_failure_message_drops_cause() {
        let errors = [
            WorkflowError::browser(
                "could not find chrome at /opt/internal/chrome-build-77 (ws://10.0.0.5:9222)",
            ),
            WorkflowError::TransientNetworkFailure {
                url: "https://delhihighcourt.nic.in/app/get-case-type-status".to_string(),
                cause: "connection reset by 10.0.0.5".to_string(),
            },
            WorkflowError::FormFill {
                field: "case_number".to_string(),
                cause: "element detached at /html/body/form".to_string(),
            },
        ];

        for error in &errors {
            let outcome = WorkflowOutcome::failure(error);
            let WorkflowOutcome::Failure { stage, message } = &outcome else {
                panic!("应为失败结果");
            };
            assert_eq!(*stage, error.stage());
            assert_eq!(message, stage.summary());

            let json = serde_json::to_string(&outcome).unwrap();
            for leaked in ["/opt/", "ws://", "10.0.0.5", "https://", "/html/"] {
                assert!(!json.contains(leaked), "{} 泄露了 {}", json, leaked);
            }
        }
    }
}
