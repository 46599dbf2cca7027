use std::path::PathBuf;

use anyhow::Result;
use chromiumoxide::{Browser, BrowserConfig, Page};
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::browser::session::HandlerTask;

/// 启动参数
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub headless: bool,
    pub executable: Option<PathBuf>,
    /// 每个会话独立的用户数据目录
    pub user_data_dir: PathBuf,
}

/// 启动浏览器并打开一个空白页
pub async fn launch_browser(options: &LaunchOptions) -> Result<(Browser, Page, HandlerTask)> {
    info!("🚀 启动浏览器 (headless: {})...", options.headless);
    debug!("用户数据目录: {}", options.user_data_dir.display());

    let mut builder = BrowserConfig::builder();
    builder = if options.headless {
        builder.new_headless_mode()
    } else {
        builder.with_head()
    };
    if let Some(executable) = &options.executable {
        builder = builder.chrome_executable(executable);
    }

    let config = builder
        .user_data_dir(&options.user_data_dir)
        .args(vec![
            "--disable-gpu",
            "--no-sandbox",
            "--disable-dev-shm-usage",
            // 去掉 navigator.webdriver 等自动化特征
            "--disable-blink-features=AutomationControlled",
            "--remote-debugging-port=0",
        ])
        .build()
        .map_err(|e| {
            error!("配置浏览器失败: {}", e);
            anyhow::anyhow!("配置浏览器失败: {}", e)
        })?;

    let (browser, handler) = Browser::launch(config).await.map_err(|e| {
        error!("启动浏览器失败: {}", e);
        anyhow::anyhow!("启动浏览器失败: {}", e)
    })?;
    debug!("浏览器启动成功");

    // 在后台处理浏览器事件
    let handler_task = HandlerTask::spawn(handler);

    // 添加短暂延迟以等待浏览器状态同步
    sleep(tokio::time::Duration::from_millis(300)).await;

    let page = browser.new_page("about:blank").await.map_err(|e| {
        error!("创建页面失败: {}", e);
        anyhow::anyhow!("创建页面失败: {}", e)
    })?;

    Ok((browser, page, handler_task))
}
