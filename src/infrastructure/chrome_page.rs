//! chromiumoxide 页面上的 [`PageDriver`] 实现

use anyhow::{bail, Result};
use async_trait::async_trait;
use tracing::debug;

use crate::infrastructure::js_executor::JsExecutor;
use crate::infrastructure::page_driver::{ControlSnapshot, PageDriver};
use crate::locator::{xpath_literal, LocatorStep};

/// 隐藏 `navigator.webdriver` 标记
const WEBDRIVER_MASK: &str =
    "(() => { Object.defineProperty(navigator, 'webdriver', { get: () => undefined }); return true; })()";

/// 真实浏览器页面
pub struct ChromePage {
    executor: JsExecutor,
}

impl ChromePage {
    pub fn new(executor: JsExecutor) -> Self {
        Self { executor }
    }

    pub fn into_executor(self) -> JsExecutor {
        self.executor
    }
}

#[async_trait]
impl PageDriver for ChromePage {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.executor.page().goto(url).await?;
        if let Err(e) = self.executor.eval(WEBDRIVER_MASK).await {
            debug!("注入 webdriver 掩码失败: {}", e);
        }
        Ok(())
    }

    async fn probe(&self, step: &LocatorStep) -> Result<bool> {
        self.executor.eval_on(step, "return el !== null;").await
    }

    async fn describe_controls(&self, tag: &str) -> Result<Vec<ControlSnapshot>> {
        let js_code = format!(
            r#"(() => Array.from(document.getElementsByTagName({tag})).map(el => ({{
                tag: el.tagName.toLowerCase(),
                id: el.id || '',
                name: el.getAttribute('name') || '',
                type: el.getAttribute('type') || '',
                text: (el.innerText || '').trim().slice(0, 80)
            }})))()"#,
            tag = serde_json::to_string(tag)?
        );
        self.executor.eval_as(js_code).await
    }

    async fn select_by_text(&self, step: &LocatorStep, text: &str) -> Result<()> {
        let body = format!(
            r#"if (!el) return 'missing';
            const wanted = {wanted};
            const option = Array.from(el.options || []).find(o => (o.text || '').trim() === wanted);
            if (!option) return 'no-option';
            el.value = option.value;
            option.selected = true;
            el.dispatchEvent(new Event('change', {{ bubbles: true }}));
            return 'ok';"#,
            wanted = serde_json::to_string(text)?
        );
        let status: String = self.executor.eval_on(step, &body).await?;
        match status.as_str() {
            "ok" => Ok(()),
            "missing" => bail!("下拉框 {} 不存在", step),
            _ => bail!("下拉框 {} 中没有选项 '{}'", step, text),
        }
    }

    async fn fill(&self, step: &LocatorStep, text: &str, clear_first: bool) -> Result<()> {
        if clear_first {
            let cleared: bool = self
                .executor
                .eval_on(
                    step,
                    "if (!el) return false; el.value = ''; el.dispatchEvent(new Event('input', { bubbles: true })); return true;",
                )
                .await?;
            if !cleared {
                bail!("输入框 {} 不存在", step);
            }
        }

        let element = self.executor.page().find_xpath(step.to_xpath()).await?;
        element.click().await?;
        element.type_str(text).await?;
        Ok(())
    }

    async fn read_text(&self, step: &LocatorStep) -> Result<Option<String>> {
        self.executor
            .eval_on(
                step,
                "return el ? (el.innerText ?? el.textContent ?? '') : null;",
            )
            .await
    }

    async fn read_attribute(&self, step: &LocatorStep, attribute: &str) -> Result<Option<String>> {
        let body = format!(
            r#"if (!el) return null;
            const name = {name};
            const prop = el[name];
            if (typeof prop === 'string' && prop.length > 0) return prop;
            return el.getAttribute(name);"#,
            name = serde_json::to_string(attribute)?
        );
        self.executor.eval_on(step, &body).await
    }

    async fn scroll_into_view(&self, step: &LocatorStep) -> Result<()> {
        let found: bool = self
            .executor
            .eval_on(step, "if (!el) return false; el.scrollIntoView(true); return true;")
            .await?;
        if !found {
            bail!("控件 {} 不存在", step);
        }
        Ok(())
    }

    async fn click_scripted(&self, step: &LocatorStep) -> Result<()> {
        let clicked: bool = self
            .executor
            .eval_on(step, "if (!el) return false; el.click(); return true;")
            .await?;
        if !clicked {
            bail!("控件 {} 不存在", step);
        }
        Ok(())
    }

    async fn click_native(&self, step: &LocatorStep) -> Result<()> {
        let element = self.executor.page().find_xpath(step.to_xpath()).await?;
        element.scroll_into_view().await?;
        element.click().await?;
        Ok(())
    }

    async fn contains_any_text(&self, markers: &[String]) -> Result<bool> {
        if markers.is_empty() {
            return Ok(false);
        }
        let predicate = markers
            .iter()
            .map(|m| format!("contains(text(), {})", xpath_literal(m)))
            .collect::<Vec<_>>()
            .join(" or ");
        let js_code = format!(
            "(() => document.evaluate({xpath}, document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null).snapshotLength > 0)()",
            xpath = serde_json::to_string(&format!("//*[{}]", predicate))?
        );
        self.executor.eval_as(js_code).await
    }

    async fn first_table_html(&self) -> Result<Option<String>> {
        self.executor
            .eval_as("(() => { const t = document.querySelector('table'); return t ? t.outerHTML : null; })()")
            .await
    }

    async fn current_url(&self) -> Result<Option<String>> {
        Ok(self.executor.page().url().await?)
    }

    async fn page_source(&self) -> Result<String> {
        Ok(self.executor.page().content().await?)
    }
}
