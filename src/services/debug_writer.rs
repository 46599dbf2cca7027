//! 调试文件写入服务 - 业务能力层
//!
//! 只负责把失败现场写到调试目录，不关心流程。
//! 这里的内容永远不会返回给调用方。

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

/// 调试文件写入服务
///
/// - `debug_page_{key}.html`: 失败时的页面源码
/// - `debug_report.txt`: 追加写入的失败报告
pub struct DebugArtifactWriter {
    debug_dir: PathBuf,
}

impl DebugArtifactWriter {
    pub fn new(debug_dir: impl Into<PathBuf>) -> Self {
        Self {
            debug_dir: debug_dir.into(),
        }
    }

    pub fn report_path(&self) -> PathBuf {
        self.debug_dir.join("debug_report.txt")
    }

    pub fn page_path(&self, key: &str) -> PathBuf {
        self.debug_dir.join(format!("debug_page_{}.html", key))
    }

    /// 写入一次失败的现场
    ///
    /// `page_source` 为空时只写报告。文件操作在阻塞线程上执行。
    pub async fn write(
        &self,
        key: &str,
        label: &str,
        stage: &str,
        diagnostics: &str,
        page_source: Option<&str>,
    ) -> Result<()> {
        let debug_dir = self.debug_dir.clone();
        let page_path = self.page_path(key);
        let report_path = self.report_path();
        let page_source = page_source.map(str::to_string);
        let entry = format!(
            "{}\n[{}] 查询 {} | {} | 阶段: {}\n{}\n\n",
            "=".repeat(60),
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            key,
            label,
            stage,
            diagnostics
        );

        tokio::task::spawn_blocking(move || -> Result<()> {
            std::fs::create_dir_all(&debug_dir)
                .with_context(|| format!("创建调试目录失败: {}", debug_dir.display()))?;

            if let Some(source) = page_source {
                std::fs::write(&page_path, source)
                    .with_context(|| format!("写入页面源码失败: {}", page_path.display()))?;
                debug!("页面源码已保存: {}", page_path.display());
            }

            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&report_path)
                .with_context(|| format!("打开调试报告失败: {}", report_path.display()))?;
            file.write_all(entry.as_bytes())?;
            Ok(())
        })
        .await
        .context("调试文件写入任务被中断")?
    }

    pub fn debug_dir(&self) -> &Path {
        &self.debug_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_appends_report_and_page() {
        let dir = tempfile::tempdir().unwrap();
        let writer = DebugArtifactWriter::new(dir.path().join("debug"));

        writer
            .write("7", "W.P.(C) 101/2020", "locate", "字段: case_type_select", Some("<html/>"))
            .await
            .unwrap();
        writer
            .write("8", "CRL.A. 1/2019", "no_results_table", "提交后页面没有结果表格", None)
            .await
            .unwrap();

        assert_eq!(std::fs::read_to_string(writer.page_path("7")).unwrap(), "<html/>");
        assert!(!writer.page_path("8").exists());

        let report = std::fs::read_to_string(writer.report_path()).unwrap();
        assert!(report.contains("查询 7 | W.P.(C) 101/2020 | 阶段: locate"));
        assert!(report.contains("阶段: no_results_table"));
    }
}
