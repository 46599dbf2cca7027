//! 浏览器会话
//!
//! 一个会话只服务一次查询：打开 → 流程 → 关闭。
//! 关闭在任何退出路径上都会发生；即使调用方忘了 `close`，
//! 事件循环任务也会随会话一起终止。

use std::path::PathBuf;

use anyhow::Result;
use async_trait::async_trait;
use chromiumoxide::handler::Handler;
use chromiumoxide::Browser;
use futures::StreamExt;
use tempfile::TempDir;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::browser::connection::connect_to_browser;
use crate::browser::headless::{launch_browser, LaunchOptions};
use crate::config::Config;
use crate::infrastructure::{ChromePage, JsExecutor, PageDriver};

/// CDP 事件循环任务，drop 时终止
pub struct HandlerTask(JoinHandle<()>);

impl HandlerTask {
    pub fn spawn(mut handler: Handler) -> Self {
        Self(tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        }))
    }
}

impl Drop for HandlerTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// 一次查询独占的浏览器会话
#[async_trait]
pub trait BrowserSession: Send + Sync {
    fn page(&self) -> &dyn PageDriver;

    /// 释放会话，消费自身
    async fn close(self: Box<Self>) -> Result<()>;
}

/// 按需打开新会话
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self) -> Result<Box<dyn BrowserSession>>;
}

enum SessionMode {
    /// 自己启动的浏览器，关闭时结束进程；临时用户目录随之删除
    Owned { _profile: TempDir },
    /// 连接到外部浏览器，只关闭自己的标签页
    Attached,
}

pub struct ChromeSession {
    browser: Mutex<Browser>,
    page: ChromePage,
    mode: SessionMode,
    _handler: HandlerTask,
}

#[async_trait]
impl BrowserSession for ChromeSession {
    fn page(&self) -> &dyn PageDriver {
        &self.page
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let ChromeSession {
            browser,
            page,
            mode,
            _handler,
        } = *self;
        let page = page.into_executor().into_page();

        match mode {
            SessionMode::Attached => {
                page.close().await?;
                debug!("已关闭会话标签页");
            }
            SessionMode::Owned { _profile } => {
                let mut browser = browser.into_inner();
                if let Err(e) = page.close().await {
                    debug!("关闭页面失败: {}", e);
                }
                browser.close().await?;
                if let Err(e) = browser.wait().await {
                    warn!("等待浏览器进程退出失败: {}", e);
                }
                debug!("浏览器已关闭");
            }
        }
        Ok(())
    }
}

/// 根据配置启动或连接 Chrome
pub struct ChromeSessionFactory {
    debug_port: Option<u16>,
    headless: bool,
    executable: Option<PathBuf>,
}

impl ChromeSessionFactory {
    pub fn new(config: &Config) -> Self {
        Self {
            debug_port: config.browser_debug_port,
            headless: config.headless,
            executable: config.browser_executable.clone(),
        }
    }
}

#[async_trait]
impl SessionFactory for ChromeSessionFactory {
    async fn open(&self) -> Result<Box<dyn BrowserSession>> {
        let (browser, page, handler, mode) = match self.debug_port {
            Some(port) => {
                let (browser, page, handler) = connect_to_browser(port).await?;
                (browser, page, handler, SessionMode::Attached)
            }
            None => {
                let profile = tempfile::Builder::new()
                    .prefix("court-fetch-profile-")
                    .tempdir()?;
                let options = LaunchOptions {
                    headless: self.headless,
                    executable: self.executable.clone(),
                    user_data_dir: profile.path().to_path_buf(),
                };
                let (browser, page, handler) = launch_browser(&options).await?;
                (browser, page, handler, SessionMode::Owned { _profile: profile })
            }
        };
        info!("✓ 浏览器会话已就绪");

        Ok(Box::new(ChromeSession {
            browser: Mutex::new(browser),
            page: ChromePage::new(JsExecutor::new(page)),
            mode,
            _handler: handler,
        }))
    }
}
