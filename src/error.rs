use std::time::Duration;

use thiserror::Error;

use crate::challenge::ChallengeUnsolved;
use crate::locator::LocatorError;
use crate::models::FailureStage;
use crate::workflow::SessionState;

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 配置文件读取失败
    #[error("读取配置文件失败 ({path}): {source}")]
    FileReadFailed {
        path: String,
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        source: toml::de::Error,
    },
    /// 案件类型目录为空
    #[error("案件类型目录不能为空")]
    EmptyCatalog,
    /// 案件类型项为空或首尾有空白
    #[error("非法的案件类型: '{value}'")]
    InvalidCaseType { value: String },
    /// 案件类型重复
    #[error("重复的案件类型: '{value}'")]
    DuplicateCaseType { value: String },
    /// 定位配置没有任何策略
    #[error("字段 {field} 的定位策略列表不能为空")]
    EmptyLocator { field: String },
}

/// 工作流错误
///
/// 按阶段划分，而不是按底层异常类型划分。只能在整个请求的粒度上重试。
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// 案件类型不在目录中（在任何浏览器交互之前拒绝）
    #[error("案件类型不在目录中: '{case_type}'")]
    UnknownCaseType { case_type: String },

    /// 必需控件无法通过任何策略定位
    #[error(transparent)]
    LocatorNotFound(#[from] LocatorError),

    /// 控件已定位但填写失败
    #[error("填写 {field} 失败: {cause}")]
    FormFill { field: String, cause: String },

    /// 所有验证码策略都不适用或失败
    #[error(transparent)]
    ChallengeUnsolved(#[from] ChallengeUnsolved),

    /// 所有提交方式都失败
    #[error("提交失败: {} 种激活方式均失败", .attempts.len())]
    SubmissionFailed { attempts: Vec<String> },

    /// 提交后页面没有结果表格
    #[error("提交后页面没有结果表格")]
    NoResultsTable,

    /// 表格存在但没有有效行
    #[error("结果表格中没有可解析的行")]
    NoResultsParsed,

    /// 导航或媒体下载的网络故障
    #[error("网络请求失败 ({url}): {cause}")]
    TransientNetworkFailure { url: String, cause: String },

    /// 浏览器会话建立或页面脚本失败
    #[error("浏览器错误: {0}")]
    Browser(String),

    /// 整体运行超时
    #[error("会话超时 ({} 秒)", .0.as_secs())]
    Timeout(Duration),

    /// 被调用方取消
    #[error("会话在 {0} 状态被取消")]
    Cancelled(SessionState),
}

impl WorkflowError {
    pub fn browser(err: impl std::fmt::Display) -> Self {
        WorkflowError::Browser(err.to_string())
    }

    /// 失败阶段标签
    pub fn stage(&self) -> FailureStage {
        match self {
            WorkflowError::UnknownCaseType { .. } => FailureStage::Validation,
            WorkflowError::LocatorNotFound(_) => FailureStage::Locate,
            WorkflowError::FormFill { .. } => FailureStage::Fill,
            WorkflowError::ChallengeUnsolved(_) => FailureStage::Challenge,
            WorkflowError::SubmissionFailed { .. } => FailureStage::Submit,
            WorkflowError::NoResultsTable => FailureStage::NoResultsTable,
            WorkflowError::NoResultsParsed => FailureStage::NoResults,
            WorkflowError::TransientNetworkFailure { .. } => FailureStage::Network,
            WorkflowError::Browser(_) => FailureStage::Browser,
            WorkflowError::Timeout(_) => FailureStage::Timeout,
            WorkflowError::Cancelled(_) => FailureStage::Cancelled,
        }
    }

    /// 只写入内部调试文件的诊断信息，永远不返回给调用方
    pub fn diagnostics(&self) -> String {
        match self {
            WorkflowError::LocatorNotFound(e) => e.diagnostics(),
            WorkflowError::ChallengeUnsolved(e) => e.diagnostics(),
            WorkflowError::SubmissionFailed { attempts } => {
                let mut lines = vec!["提交尝试:".to_string()];
                lines.extend(attempts.iter().map(|a| format!("  - {}", a)));
                lines.join("\n")
            }
            other => other.to_string(),
        }
    }
}

// ========== Result 类型别名 ==========

/// 工作流结果类型
pub type WorkflowResult<T> = Result<T, WorkflowError>;
