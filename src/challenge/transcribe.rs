//! 语音转写服务

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

/// 把音频文件转写为文本
#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(&self, audio_path: &Path) -> Result<String>;
}

/// OpenAI 兼容的 `/audio/transcriptions` 接口
pub struct WhisperTranscriber {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

impl WhisperTranscriber {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("创建 HTTP 客户端失败")?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    /// 没有配置 API 密钥时返回 `None`，音频策略随之不适用
    pub fn from_config(config: &crate::config::Config) -> Result<Option<Self>> {
        let Some(api_key) = config.transcription_api_key.as_deref() else {
            return Ok(None);
        };
        if api_key.trim().is_empty() {
            return Ok(None);
        }
        Self::new(
            config.transcription_base_url.as_str(),
            api_key,
            config.transcription_model.as_str(),
            config.media_timeout(),
        )
        .map(Some)
    }

    fn endpoint(&self) -> String {
        format!("{}/audio/transcriptions", self.base_url)
    }
}

#[async_trait]
impl SpeechToText for WhisperTranscriber {
    async fn transcribe(&self, audio_path: &Path) -> Result<String> {
        let bytes = tokio::fs::read(audio_path)
            .await
            .with_context(|| format!("读取音频文件失败: {}", audio_path.display()))?;
        debug!("上传音频进行转写 ({} 字节)", bytes.len());

        let file_name = audio_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "captcha.mp3".to_string());
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("audio/mpeg")?;
        let form = reqwest::multipart::Form::new()
            .text("model", self.model.clone())
            .part("file", part);

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .context("转写请求发送失败")?
            .error_for_status()
            .context("转写服务返回错误状态")?;

        let parsed: TranscriptionResponse =
            response.json().await.context("解析转写响应失败")?;
        Ok(parsed.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_strips_trailing_slash() {
        let t = WhisperTranscriber::new(
            "https://api.openai.com/v1/",
            "key",
            "whisper-1",
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(t.endpoint(), "https://api.openai.com/v1/audio/transcriptions");
    }

    #[test]
    fn test_from_config_without_key_is_none() {
        let config = crate::config::Config::default();
        assert!(WhisperTranscriber::from_config(&config).unwrap().is_none());
    }
}
