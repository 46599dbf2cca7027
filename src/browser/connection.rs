use anyhow::Result;
use chromiumoxide::{Browser, Page};
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::browser::session::HandlerTask;

/// 连接到已运行的浏览器，并为本次会话新开一个标签页
///
/// 每个会话使用自己的标签页，不复用浏览器里已有的页面。
pub async fn connect_to_browser(port: u16) -> Result<(Browser, Page, HandlerTask)> {
    let browser_url = format!("http://localhost:{}", port);
    info!("正在连接到浏览器: {}", browser_url);

    let (browser, handler) = Browser::connect(&browser_url).await.map_err(|e| {
        error!("连接浏览器失败: {}", e);
        e
    })?;
    debug!("浏览器连接成功");

    // 在后台处理浏览器事件
    let handler_task = HandlerTask::spawn(handler);

    // 添加短暂延迟以等待浏览器状态同步
    sleep(tokio::time::Duration::from_millis(300)).await;

    let page = browser.new_page("about:blank").await.map_err(|e| {
        error!("创建新页面失败: {}", e);
        e
    })?;
    debug!("已创建会话标签页");

    Ok((browser, page, handler_task))
}
