//! 验证码媒体下载

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use tracing::debug;

use crate::challenge::ChallengeError;

/// 下载验证码媒体（音频 / 图片）
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// 基于 reqwest 的下载器
pub struct HttpMediaFetcher {
    client: reqwest::Client,
}

impl HttpMediaFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("创建 HTTP 客户端失败")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl MediaFetcher for HttpMediaFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        debug!("下载验证码媒体: {}", url);
        let response = self.client.get(url).send().await?.error_for_status()?;
        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }
}

/// 解码 `data:<mime>;base64,<payload>` 形式的内联数据
pub fn decode_data_url(src: &str) -> Result<Vec<u8>, ChallengeError> {
    let (_, payload) = src
        .split_once(',')
        .ok_or_else(|| ChallengeError::Decode("data URL 缺少 ',' 分隔符".to_string()))?;
    base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| ChallengeError::Decode(format!("base64 解码失败: {}", e)))
}

/// 按来源读取媒体：内联 data URL 直接解码，否则走网络
pub async fn load_media(fetcher: &dyn MediaFetcher, src: &str) -> Result<Vec<u8>, ChallengeError> {
    if src.starts_with("data:") {
        return decode_data_url(src);
    }
    fetcher
        .fetch(src)
        .await
        .map_err(|e| ChallengeError::TransientNetwork {
            url: src.to_string(),
            cause: e.to_string(),
        })
}
