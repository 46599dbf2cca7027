//! 图片验证码 OCR

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use image::DynamicImage;
use tracing::{debug, info};

use crate::challenge::media::load_media;
use crate::challenge::{
    ChallengeArtifact, ChallengeError, ChallengeStrategy, MediaFetcher, SolveSource,
    SolvedChallenge, CHALLENGE_CHARSET,
};
use crate::infrastructure::PageDriver;
use crate::locator::{fields, resolve_field, LocatorRegistry};

/// 单行文字识别
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(&self, image: &DynamicImage) -> Result<String>;
}

/// 调用本地 tesseract 可执行文件
pub struct TesseractOcr {
    binary: PathBuf,
}

impl TesseractOcr {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    async fn recognize(&self, image: &DynamicImage) -> Result<String> {
        let file = tempfile::Builder::new()
            .prefix("captcha_image_")
            .suffix(".png")
            .tempfile()
            .context("创建临时图片文件失败")?;
        image
            .save_with_format(file.path(), image::ImageFormat::Png)
            .context("保存验证码图片失败")?;

        // --psm 8: 把整张图当作一个单词
        let output = tokio::process::Command::new(&self.binary)
            .arg(file.path())
            .arg("stdout")
            .args(["--psm", "8"])
            .arg("-c")
            .arg(format!("tessedit_char_whitelist={}", CHALLENGE_CHARSET))
            .output()
            .await
            .with_context(|| format!("无法启动 {}", self.binary.display()))?;

        if !output.status.success() {
            anyhow::bail!(
                "tesseract 退出码 {:?}: {}",
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

pub struct ImageOcrStrategy {
    fetcher: Arc<dyn MediaFetcher>,
    engine: Arc<dyn OcrEngine>,
}

impl ImageOcrStrategy {
    pub fn new(fetcher: Arc<dyn MediaFetcher>, engine: Arc<dyn OcrEngine>) -> Self {
        Self { fetcher, engine }
    }

    /// 灰度化后识别，只保留字母数字
    async fn recognize(
        engine: &dyn OcrEngine,
        artifact: ChallengeArtifact,
    ) -> Result<SolvedChallenge, ChallengeError> {
        let ChallengeArtifact::Image(bytes) = artifact else {
            return Err(ChallengeError::EmptyAnswer(SolveSource::Ocr));
        };

        let decoded =
            image::load_from_memory(&bytes).map_err(|e| ChallengeError::Decode(e.to_string()))?;
        let gray = DynamicImage::ImageLuma8(decoded.to_luma8());

        let raw = engine
            .recognize(&gray)
            .await
            .map_err(|e| ChallengeError::Ocr(e.to_string()))?;
        let text = filter_charset(&raw);
        if text.is_empty() {
            return Err(ChallengeError::EmptyAnswer(SolveSource::Ocr));
        }
        Ok(SolvedChallenge::text(SolveSource::Ocr, text))
    }
}

fn filter_charset(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

#[async_trait]
impl ChallengeStrategy for ImageOcrStrategy {
    fn source(&self) -> SolveSource {
        SolveSource::Ocr
    }

    async fn attempt(
        &self,
        page: &dyn PageDriver,
        locators: &LocatorRegistry,
    ) -> Result<Option<SolvedChallenge>, ChallengeError> {
        let control = match resolve_field(page, locators, fields::CHALLENGE_IMAGE).await {
            Ok(control) => control,
            Err(e) => {
                debug!("验证码图片不存在: {}", e);
                return Ok(None);
            }
        };
        let Some(src) = page.read_attribute(&control.step, "src").await? else {
            return Ok(None);
        };

        info!("🖼️ 识别图片验证码");
        let bytes = load_media(self.fetcher.as_ref(), &src).await?;
        Self::recognize(self.engine.as_ref(), ChallengeArtifact::Image(bytes))
            .await
            .map(Some)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{ImageBuffer, Rgb};

    use super::*;

    struct FixedOcr(&'static str);

    #[async_trait]
    impl OcrEngine for FixedOcr {
        async fn recognize(&self, image: &DynamicImage) -> Result<String> {
            assert!(matches!(image, DynamicImage::ImageLuma8(_)));
            Ok(self.0.to_string())
        }
    }

    fn png_bytes() -> Vec<u8> {
        let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_pixel(8, 4, Rgb([200, 10, 10]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut out, image::ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn test_filter_charset() {
        assert_eq!(filter_charset(" a1-B2 \n"), "a1B2");
        assert_eq!(filter_charset("!@# \n"), "");
    }

    #[tokio::test]
    async fn test_recognize_filters_noise() {
        let solved = ImageOcrStrategy::recognize(
            &FixedOcr("X 9 k-3\n"),
            ChallengeArtifact::Image(png_bytes()),
        )
        .await
        .unwrap();
        assert_eq!(solved, SolvedChallenge::text(SolveSource::Ocr, "X9k3"));
    }

    #[tokio::test]
    async fn test_recognize_empty_is_failure() {
        let err =
            ImageOcrStrategy::recognize(&FixedOcr("~~~"), ChallengeArtifact::Image(png_bytes()))
                .await
                .unwrap_err();
        assert!(matches!(err, ChallengeError::EmptyAnswer(SolveSource::Ocr)));
    }

    #[tokio::test]
    async fn test_undecodable_image() {
        let err = ImageOcrStrategy::recognize(
            &FixedOcr("ABCD"),
            ChallengeArtifact::Image(b"not an image".to_vec()),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ChallengeError::Decode(_)));
    }
}
