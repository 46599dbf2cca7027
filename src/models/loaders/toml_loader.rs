use crate::models::request::SearchRequest;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::fs;

/// 批量查询文件格式
///
/// ```toml
/// [[request]]
/// case_type = "W.P.(C)"
/// case_number = "101"
/// filing_year = "2020"
/// ```
#[derive(Debug, Deserialize)]
struct BatchFile {
    #[serde(default, rename = "request")]
    requests: Vec<SearchRequest>,
}

/// 从 TOML 文件加载批量查询请求
pub async fn load_search_requests(toml_file_path: &Path) -> Result<Vec<SearchRequest>> {
    let content = fs::read_to_string(toml_file_path)
        .await
        .with_context(|| format!("无法读取TOML文件: {}", toml_file_path.display()))?;

    parse_search_requests(&content)
        .with_context(|| format!("无法解析TOML文件: {}", toml_file_path.display()))
}

/// 解析批量查询内容
pub fn parse_search_requests(content: &str) -> Result<Vec<SearchRequest>> {
    let batch: BatchFile = toml::from_str(content)?;
    Ok(batch.requests)
}

/// 从文件夹中加载所有 TOML 批量文件
pub async fn load_all_request_files(folder_path: &str) -> Result<Vec<SearchRequest>> {
    let folder = PathBuf::from(folder_path);

    if !folder.exists() {
        anyhow::bail!("文件夹不存在: {}", folder_path);
    }

    let mut requests = Vec::new();
    let mut entries = fs::read_dir(&folder)
        .await
        .with_context(|| format!("无法读取文件夹: {}", folder_path))?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            tracing::info!(
                "正在加载: {}",
                path.file_name().unwrap_or_default().to_string_lossy()
            );

            match load_search_requests(&path).await {
                Ok(batch) => {
                    tracing::info!("成功加载 {} 个查询", batch.len());
                    requests.extend(batch);
                }
                Err(e) => {
                    tracing::warn!("加载文件失败 {}: {}", path.display(), e);
                }
            }
        }
    }

    Ok(requests)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_batch_file() {
        let content = r#"
            [[request]]
            case_type = "W.P.(C)"
            case_number = "101"
            filing_year = "2020"

            [[request]]
            case_type = "LPA"
            case_number = "7"
            filing_year = "2019"
        "#;
        let requests = parse_search_requests(content).unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0], SearchRequest::new("W.P.(C)", "101", "2020"));
        assert_eq!(requests[1].case_type(), "LPA");
    }

    #[test]
    fn test_parse_empty_batch_file() {
        assert!(parse_search_requests("").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_load_all_request_files_skips_other_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("a.toml"),
            "[[request]]\ncase_type = \"CA\"\ncase_number = \"1\"\nfiling_year = \"2021\"\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        std::fs::write(dir.path().join("broken.toml"), "[[request]]\ncase_type = 1").unwrap();

        let requests = load_all_request_files(dir.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(requests, vec![SearchRequest::new("CA", "1", "2021")]);
    }
}
