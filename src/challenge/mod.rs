//! 验证码求解管线
//!
//! 四种互相独立的策略按固定优先级组成列表：
//! 直接读取 → 音频转写 → 图片 OCR → 人工兜底。
//! 每种策略单独失败，管线吞掉策略内部的错误继续下一种，全部失败才算失败。
//!
//! 求解出的文本只在当前请求内使用，不写日志也不落盘。

pub mod audio;
pub mod direct;
pub mod manual;
pub mod media;
pub mod ocr;
pub mod pipeline;
pub mod transcribe;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::infrastructure::PageDriver;
use crate::locator::LocatorRegistry;

pub use audio::AudioChallengeStrategy;
pub use direct::DirectTextStrategy;
pub use manual::{ConsoleHumanSolver, HumanSolver, ManualFallbackStrategy};
pub use media::{HttpMediaFetcher, MediaFetcher};
pub use ocr::{ImageOcrStrategy, OcrEngine, TesseractOcr};
pub use pipeline::{ChallengePipeline, ChallengeUnsolved, StrategyVerdict};
pub use transcribe::{SpeechToText, WhisperTranscriber};

/// OCR 允许的字符集
pub const CHALLENGE_CHARSET: &str =
    "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// 求解来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolveSource {
    Direct,
    Audio,
    Ocr,
    Manual,
}

impl SolveSource {
    pub fn as_str(self) -> &'static str {
        match self {
            SolveSource::Direct => "direct",
            SolveSource::Audio => "audio",
            SolveSource::Ocr => "ocr",
            SolveSource::Manual => "manual",
        }
    }
}

impl fmt::Display for SolveSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 一次验证码实例的原始材料，只被消费一次
pub enum ChallengeArtifact {
    InlineText(String),
    Audio(Vec<u8>),
    Image(Vec<u8>),
}

/// 验证码答案
#[derive(Clone, PartialEq, Eq)]
pub enum ChallengeAnswer {
    /// 机器得出的文本，需要填入应答框
    Text(String),
    /// 人工已在页面上直接完成，没有可校验的文本
    HumanAttested,
}

impl fmt::Debug for ChallengeAnswer {
    // 不打印答案本身
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChallengeAnswer::Text(text) => write!(f, "Text(<{} chars>)", text.chars().count()),
            ChallengeAnswer::HumanAttested => f.write_str("HumanAttested"),
        }
    }
}

/// 求解结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolvedChallenge {
    pub answer: ChallengeAnswer,
    pub source: SolveSource,
}

impl SolvedChallenge {
    pub fn text(source: SolveSource, text: impl Into<String>) -> Self {
        Self {
            answer: ChallengeAnswer::Text(text.into()),
            source,
        }
    }

    pub fn human_attested() -> Self {
        Self {
            answer: ChallengeAnswer::HumanAttested,
            source: SolveSource::Manual,
        }
    }

    pub fn is_human_attested(&self) -> bool {
        matches!(self.answer, ChallengeAnswer::HumanAttested)
    }
}

/// 单个策略的失败原因
#[derive(Debug, Error)]
pub enum ChallengeError {
    #[error("{0} 策略得到空结果")]
    EmptyAnswer(SolveSource),
    #[error("下载验证码媒体失败 ({url}): {cause}")]
    TransientNetwork { url: String, cause: String },
    #[error("语音转写失败: {0}")]
    Transcription(String),
    #[error("验证码图片解码失败: {0}")]
    Decode(String),
    #[error("OCR 失败: {0}")]
    Ocr(String),
    #[error("人工处理失败: {0}")]
    Manual(String),
    #[error("等待人工处理超时 ({} 秒)", .0.as_secs())]
    ManualTimeout(Duration),
    #[error("页面操作失败: {0}")]
    Page(#[from] anyhow::Error),
    #[error("临时文件操作失败: {0}")]
    TempFile(#[from] std::io::Error),
}

/// 验证码求解策略
///
/// 返回 `Ok(None)` 表示不适用（相关元素不存在、功能未启用），
/// 返回 `Err` 表示尝试过但失败。两种情况管线都会继续下一种策略。
#[async_trait]
pub trait ChallengeStrategy: Send + Sync {
    fn source(&self) -> SolveSource;

    async fn attempt(
        &self,
        page: &dyn PageDriver,
        locators: &LocatorRegistry,
    ) -> Result<Option<SolvedChallenge>, ChallengeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answer_debug_hides_text() {
        let solved = SolvedChallenge::text(SolveSource::Direct, "A1B2");
        let printed = format!("{:?}", solved);
        assert!(!printed.contains("A1B2"));
        assert!(printed.contains("<4 chars>"));
    }

    #[test]
    fn test_human_attested_is_manual() {
        let solved = SolvedChallenge::human_attested();
        assert!(solved.is_human_attested());
        assert_eq!(solved.source, SolveSource::Manual);
    }
}
