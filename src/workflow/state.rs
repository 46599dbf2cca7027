//! 会话状态
//!
//! START → FORM_LOCATED → FORM_FILLED → CHALLENGE_CHECKED → CHALLENGE_SOLVED（可选）
//! → SUBMITTED → RESULTS_AWAITED → RESULTS_PARSED。
//! 任何一步失败都以 `WorkflowError` 终止，失败阶段由错误本身给出。

use std::fmt::Display;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::{WorkflowError, WorkflowResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    Start,
    FormLocated,
    FormFilled,
    ChallengeChecked,
    ChallengeSolved,
    Submitted,
    ResultsAwaited,
    ResultsParsed,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Start => "START",
            SessionState::FormLocated => "FORM_LOCATED",
            SessionState::FormFilled => "FORM_FILLED",
            SessionState::ChallengeChecked => "CHALLENGE_CHECKED",
            SessionState::ChallengeSolved => "CHALLENGE_SOLVED",
            SessionState::Submitted => "SUBMITTED",
            SessionState::ResultsAwaited => "RESULTS_AWAITED",
            SessionState::ResultsParsed => "RESULTS_PARSED",
        }
    }
}

impl Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 取消检查点：调用方把通道置为 `true` 后，下一次状态转换即以 `Cancelled` 失败
pub fn checkpoint(cancel: &watch::Receiver<bool>, current: SessionState) -> WorkflowResult<()> {
    if *cancel.borrow() {
        return Err(WorkflowError::Cancelled(current));
    }
    Ok(())
}
