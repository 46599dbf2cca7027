//! 人工兜底：由操作员在浏览器里直接完成验证码

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::challenge::{ChallengeError, ChallengeStrategy, SolveSource, SolvedChallenge};
use crate::infrastructure::PageDriver;
use crate::locator::{fields, resolve_field, LocatorRegistry};

/// 等待人工确认已完成验证码
#[async_trait]
pub trait HumanSolver: Send + Sync {
    /// 返回 `true` 表示操作员确认已完成
    async fn await_confirmation(&self, prompt: &str) -> Result<bool>;
}

/// 在终端提示并等待回车
pub struct ConsoleHumanSolver;

#[async_trait]
impl HumanSolver for ConsoleHumanSolver {
    async fn await_confirmation(&self, prompt: &str) -> Result<bool> {
        println!("{}", prompt);
        println!("完成后按回车继续，输入 n 放弃:");

        let mut line = String::new();
        let read = BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
        if read == 0 {
            // stdin 已关闭
            return Ok(false);
        }
        Ok(!line.trim().eq_ignore_ascii_case("n"))
    }
}

pub struct ManualFallbackStrategy {
    solver: Option<Arc<dyn HumanSolver>>,
    timeout: Duration,
}

impl ManualFallbackStrategy {
    pub fn new(solver: Option<Arc<dyn HumanSolver>>, timeout: Duration) -> Self {
        Self { solver, timeout }
    }
}

#[async_trait]
impl ChallengeStrategy for ManualFallbackStrategy {
    fn source(&self) -> SolveSource {
        SolveSource::Manual
    }

    async fn attempt(
        &self,
        page: &dyn PageDriver,
        locators: &LocatorRegistry,
    ) -> Result<Option<SolvedChallenge>, ChallengeError> {
        let Some(solver) = self.solver.as_deref() else {
            return Ok(None);
        };

        // 页面上没有应答框就没有什么可以人工完成的
        if resolve_field(page, locators, fields::CHALLENGE_INPUT)
            .await
            .is_err()
        {
            return Ok(None);
        }

        info!("🙋 等待人工完成验证码（最多 {} 秒）", self.timeout.as_secs());
        let confirmed = tokio::time::timeout(
            self.timeout,
            solver.await_confirmation("请在浏览器窗口中完成验证码。"),
        )
        .await
        .map_err(|_| ChallengeError::ManualTimeout(self.timeout))?
        .map_err(|e| ChallengeError::Manual(e.to_string()))?;

        if !confirmed {
            warn!("操作员放弃了人工验证码");
            return Err(ChallengeError::Manual("操作员放弃".to_string()));
        }
        Ok(Some(SolvedChallenge::human_attested()))
    }
}
