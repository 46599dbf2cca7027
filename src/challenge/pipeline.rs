use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::challenge::{
    AudioChallengeStrategy, ChallengeStrategy, DirectTextStrategy, HumanSolver, ImageOcrStrategy,
    ManualFallbackStrategy, MediaFetcher, OcrEngine, SolveSource, SolvedChallenge, SpeechToText,
};
use crate::infrastructure::PageDriver;
use crate::locator::LocatorRegistry;

/// 单个策略的结论（用于诊断）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrategyVerdict {
    Inapplicable,
    Failed(String),
}

/// 所有策略都不适用或失败
#[derive(Debug, Error)]
#[error("验证码未能解决（已尝试 {} 种策略）", .attempts.len())]
pub struct ChallengeUnsolved {
    pub attempts: Vec<(SolveSource, StrategyVerdict)>,
}

impl ChallengeUnsolved {
    pub fn diagnostics(&self) -> String {
        let mut lines = vec!["验证码策略:".to_string()];
        lines.extend(self.attempts.iter().map(|(source, verdict)| match verdict {
            StrategyVerdict::Inapplicable => format!("  - {}: 不适用", source),
            StrategyVerdict::Failed(cause) => format!("  - {}: 失败 ({})", source, cause),
        }));
        lines.join("\n")
    }
}

/// 按优先级组合的策略列表，第一个成功的结果胜出
pub struct ChallengePipeline {
    strategies: Vec<Box<dyn ChallengeStrategy>>,
}

impl ChallengePipeline {
    pub fn new(strategies: Vec<Box<dyn ChallengeStrategy>>) -> Self {
        Self { strategies }
    }

    /// 标准四级管线：直接读取 → 音频 → OCR → 人工
    pub fn standard(
        fetcher: Arc<dyn MediaFetcher>,
        transcriber: Option<Arc<dyn SpeechToText>>,
        ocr: Arc<dyn OcrEngine>,
        human: Option<Arc<dyn HumanSolver>>,
        audio_activation_delay: Duration,
        manual_timeout: Duration,
    ) -> Self {
        Self::new(vec![
            Box::new(DirectTextStrategy),
            Box::new(AudioChallengeStrategy::new(
                fetcher.clone(),
                transcriber,
                audio_activation_delay,
            )),
            Box::new(ImageOcrStrategy::new(fetcher, ocr)),
            Box::new(ManualFallbackStrategy::new(human, manual_timeout)),
        ])
    }

    /// 策略的尝试顺序
    pub fn order(&self) -> Vec<SolveSource> {
        self.strategies.iter().map(|s| s.source()).collect()
    }

    pub async fn solve(
        &self,
        page: &dyn PageDriver,
        locators: &LocatorRegistry,
    ) -> Result<SolvedChallenge, ChallengeUnsolved> {
        info!("🔐 正在尝试解决验证码...");
        let mut attempts = Vec::with_capacity(self.strategies.len());

        for strategy in &self.strategies {
            let source = strategy.source();
            debug!("验证码策略: {}", source);

            match strategy.attempt(page, locators).await {
                Ok(Some(solved)) => {
                    info!("✓ 验证码已通过 {} 策略解决", source);
                    return Ok(solved);
                }
                Ok(None) => {
                    debug!("{} 策略不适用", source);
                    attempts.push((source, StrategyVerdict::Inapplicable));
                }
                Err(e) => {
                    warn!("⚠️ {} 策略失败: {}", source, e);
                    attempts.push((source, StrategyVerdict::Failed(e.to_string())));
                }
            }
        }

        warn!("❌ 所有验证码策略均失败");
        Err(ChallengeUnsolved { attempts })
    }
}

impl fmt::Debug for ChallengePipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChallengePipeline")
            .field("order", &self.order())
            .finish()
    }
}
