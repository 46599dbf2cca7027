//! 音频验证码：激活音频 → 下载 → 临时文件 → 转写

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::challenge::media::load_media;
use crate::challenge::{
    ChallengeArtifact, ChallengeError, ChallengeStrategy, MediaFetcher, SolveSource,
    SolvedChallenge, SpeechToText,
};
use crate::infrastructure::PageDriver;
use crate::locator::{fields, resolve_field, LocatorRegistry};

pub struct AudioChallengeStrategy {
    fetcher: Arc<dyn MediaFetcher>,
    transcriber: Option<Arc<dyn SpeechToText>>,
    activation_delay: Duration,
}

impl AudioChallengeStrategy {
    pub fn new(
        fetcher: Arc<dyn MediaFetcher>,
        transcriber: Option<Arc<dyn SpeechToText>>,
        activation_delay: Duration,
    ) -> Self {
        Self {
            fetcher,
            transcriber,
            activation_delay,
        }
    }

    /// 临时文件在函数返回时删除，无论转写成功与否
    async fn transcribe(
        transcriber: &dyn SpeechToText,
        artifact: ChallengeArtifact,
    ) -> Result<SolvedChallenge, ChallengeError> {
        let ChallengeArtifact::Audio(bytes) = artifact else {
            return Err(ChallengeError::EmptyAnswer(SolveSource::Audio));
        };

        let mut file = tempfile::Builder::new()
            .prefix("captcha_audio_")
            .suffix(".mp3")
            .tempfile()?;
        file.write_all(&bytes)?;
        file.flush()?;

        let text = transcriber
            .transcribe(file.path())
            .await
            .map_err(|e| ChallengeError::Transcription(e.to_string()))?;

        let text = text.trim();
        if text.is_empty() {
            return Err(ChallengeError::EmptyAnswer(SolveSource::Audio));
        }
        Ok(SolvedChallenge::text(SolveSource::Audio, text))
    }
}

#[async_trait]
impl ChallengeStrategy for AudioChallengeStrategy {
    fn source(&self) -> SolveSource {
        SolveSource::Audio
    }

    async fn attempt(
        &self,
        page: &dyn PageDriver,
        locators: &LocatorRegistry,
    ) -> Result<Option<SolvedChallenge>, ChallengeError> {
        let Some(transcriber) = self.transcriber.as_deref() else {
            debug!("未配置语音转写服务，跳过音频策略");
            return Ok(None);
        };

        let button = match resolve_field(page, locators, fields::CHALLENGE_AUDIO_BUTTON).await {
            Ok(control) => control,
            Err(e) => {
                debug!("音频按钮不存在: {}", e);
                return Ok(None);
            }
        };

        info!("🔊 激活音频验证码");
        page.click_native(&button.step).await?;
        tokio::time::sleep(self.activation_delay).await;

        let audio = match resolve_field(page, locators, fields::CHALLENGE_AUDIO).await {
            Ok(control) => control,
            Err(e) => {
                debug!("音频元素不存在: {}", e);
                return Ok(None);
            }
        };
        let Some(src) = page.read_attribute(&audio.step, "src").await? else {
            return Ok(None);
        };

        let bytes = load_media(self.fetcher.as_ref(), &src).await?;
        debug!("音频验证码已下载 ({} 字节)", bytes.len());

        Self::transcribe(transcriber, ChallengeArtifact::Audio(bytes))
            .await
            .map(Some)
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    use super::*;

    struct RecordingTranscriber {
        reply: String,
        seen: Mutex<Option<PathBuf>>,
    }

    #[async_trait]
    impl SpeechToText for RecordingTranscriber {
        async fn transcribe(&self, audio_path: &Path) -> anyhow::Result<String> {
            assert!(audio_path.exists());
            assert_eq!(std::fs::read(audio_path)?, b"mp3-bytes");
            *self.seen.lock().unwrap() = Some(audio_path.to_path_buf());
            Ok(self.reply.clone())
        }
    }

    #[tokio::test]
    async fn test_temp_file_removed_after_transcription() {
        let transcriber = RecordingTranscriber {
            reply: "  7 4 K 2 ".to_string(),
            seen: Mutex::new(None),
        };
        let solved = AudioChallengeStrategy::transcribe(
            &transcriber,
            ChallengeArtifact::Audio(b"mp3-bytes".to_vec()),
        )
        .await
        .unwrap();

        assert_eq!(solved, SolvedChallenge::text(SolveSource::Audio, "7 4 K 2"));
        let path = transcriber.seen.lock().unwrap().clone().unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_blank_transcription_is_failure() {
        let transcriber = RecordingTranscriber {
            reply: "   ".to_string(),
            seen: Mutex::new(None),
        };
        let err = AudioChallengeStrategy::transcribe(
            &transcriber,
            ChallengeArtifact::Audio(b"mp3-bytes".to_vec()),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ChallengeError::EmptyAnswer(SolveSource::Audio)));
    }
}
