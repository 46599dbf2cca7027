//! 直接读取：验证码文本原样出现在页面元素里

use async_trait::async_trait;
use tracing::debug;

use crate::challenge::{
    ChallengeArtifact, ChallengeError, ChallengeStrategy, SolveSource, SolvedChallenge,
};
use crate::infrastructure::PageDriver;
use crate::locator::{fields, resolve_field, LocatorRegistry};

pub struct DirectTextStrategy;

impl DirectTextStrategy {
    fn solve(artifact: ChallengeArtifact) -> Result<SolvedChallenge, ChallengeError> {
        match artifact {
            ChallengeArtifact::InlineText(text) => {
                let text = text.trim();
                if text.is_empty() {
                    return Err(ChallengeError::EmptyAnswer(SolveSource::Direct));
                }
                Ok(SolvedChallenge::text(SolveSource::Direct, text))
            }
            _ => Err(ChallengeError::EmptyAnswer(SolveSource::Direct)),
        }
    }
}

#[async_trait]
impl ChallengeStrategy for DirectTextStrategy {
    fn source(&self) -> SolveSource {
        SolveSource::Direct
    }

    async fn attempt(
        &self,
        page: &dyn PageDriver,
        locators: &LocatorRegistry,
    ) -> Result<Option<SolvedChallenge>, ChallengeError> {
        let control = match resolve_field(page, locators, fields::CHALLENGE_TEXT).await {
            Ok(control) => control,
            Err(e) => {
                debug!("验证码文本元素不存在: {}", e);
                return Ok(None);
            }
        };

        let Some(text) = page.read_text(&control.step).await? else {
            return Ok(None);
        };

        Self::solve(ChallengeArtifact::InlineText(text)).map(Some)
    }
}
