//! 按策略顺序解析控件

use std::fmt::Display;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::infrastructure::{ControlSnapshot, PageDriver};
use crate::locator::{ElementLocator, LocatorRegistry, LocatorStep};

/// 解析成功的控件
///
/// 后续的填写、点击都通过命中的那一步策略重新寻址。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedControl {
    pub field: String,
    pub step: LocatorStep,
    /// 命中策略在列表中的位置（从 0 开始）
    pub position: usize,
}

/// 单次策略尝试的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// 查询正常执行但没有匹配
    Absent,
    /// 查询本身出错（如 XPath 非法、页面脚本异常）
    Errored(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyAttempt {
    pub step: LocatorStep,
    pub outcome: AttemptOutcome,
}

impl Display for StrategyAttempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.outcome {
            AttemptOutcome::Absent => write!(f, "{} → 未找到", self.step),
            AttemptOutcome::Errored(cause) => write!(f, "{} → 出错: {}", self.step, cause),
        }
    }
}

/// 定位错误
#[derive(Debug, Error)]
pub enum LocatorError {
    #[error("未能定位控件 {field}（已尝试 {} 种策略）", .attempted.len())]
    NotFound {
        field: String,
        attempted: Vec<StrategyAttempt>,
        /// 页面上相关标签的所有控件，仅用于诊断
        snapshot: Vec<ControlSnapshot>,
    },
    #[error("控件 {field} 没有配置定位策略")]
    Unconfigured { field: String },
}

impl LocatorError {
    pub fn field(&self) -> &str {
        match self {
            LocatorError::NotFound { field, .. } | LocatorError::Unconfigured { field } => field,
        }
    }

    /// 写入内部调试文件的详细信息
    pub fn diagnostics(&self) -> String {
        match self {
            LocatorError::NotFound {
                field,
                attempted,
                snapshot,
            } => {
                let mut lines = vec![format!("字段: {}", field), "已尝试的策略:".to_string()];
                lines.extend(attempted.iter().map(|a| format!("  - {}", a)));
                lines.push(format!("页面上的相关控件 ({} 个):", snapshot.len()));
                lines.extend(
                    snapshot
                        .iter()
                        .enumerate()
                        .map(|(i, c)| format!("  {}: {}", i, c)),
                );
                lines.join("\n")
            }
            LocatorError::Unconfigured { field } => format!("字段 {} 没有定位配置", field),
        }
    }
}

/// 按顺序尝试定位策略，返回第一个命中的控件
///
/// 每个策略最多尝试一次；命中后不再尝试后续策略，也不做跨策略的合并或校验。
/// 全部失败时返回 [`LocatorError::NotFound`]，附带页面相关控件的快照。
pub async fn resolve(
    page: &dyn PageDriver,
    locator: &ElementLocator,
) -> Result<ResolvedControl, LocatorError> {
    let field = locator.field();
    let mut attempted = Vec::with_capacity(locator.steps().len());

    for (position, step) in locator.steps().iter().enumerate() {
        debug!("定位 {}: 尝试 {}", field, step);

        match page.probe(step).await {
            Ok(true) => {
                info!("✓ 通过 {} 定位到 {}", step, field);
                return Ok(ResolvedControl {
                    field: field.to_string(),
                    step: step.clone(),
                    position,
                });
            }
            Ok(false) => {
                attempted.push(StrategyAttempt {
                    step: step.clone(),
                    outcome: AttemptOutcome::Absent,
                });
            }
            Err(e) => {
                debug!("策略 {} 查询出错: {}", step, e);
                attempted.push(StrategyAttempt {
                    step: step.clone(),
                    outcome: AttemptOutcome::Errored(e.to_string()),
                });
            }
        }
    }

    let snapshot = snapshot_controls(page, locator.diagnostic_tags()).await;
    warn!(
        "⚠️ 无法定位 {}，已尝试 {} 种策略，页面上相关控件 {} 个",
        field,
        attempted.len(),
        snapshot.len()
    );

    Err(LocatorError::NotFound {
        field: field.to_string(),
        attempted,
        snapshot,
    })
}

/// 按字段名从配置表中解析
pub async fn resolve_field(
    page: &dyn PageDriver,
    registry: &LocatorRegistry,
    field: &str,
) -> Result<ResolvedControl, LocatorError> {
    let locator = registry
        .get(field)
        .ok_or_else(|| LocatorError::Unconfigured {
            field: field.to_string(),
        })?;
    resolve(page, locator).await
}

/// 诊断快照失败不影响错误本身
async fn snapshot_controls(page: &dyn PageDriver, tags: &[String]) -> Vec<ControlSnapshot> {
    let mut snapshot = Vec::new();
    for tag in tags {
        match page.describe_controls(tag).await {
            Ok(controls) => snapshot.extend(controls),
            Err(e) => debug!("获取 <{}> 控件快照失败: {}", tag, e),
        }
    }
    snapshot
}
