//! JS 执行器 - 基础设施层
//!
//! 持有唯一的 page 资源，只暴露"执行 JS"的能力

use anyhow::Result;
use chromiumoxide::Page;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::locator::LocatorStep;

/// JS 执行器
///
/// 职责：
/// - 持有唯一的 Page 资源
/// - 暴露 eval() 能力
/// - 不认识案件 / 验证码
/// - 不处理业务流程
pub struct JsExecutor {
    page: Page,
}

impl JsExecutor {
    /// 创建新的 JS 执行器
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    /// 获取 page 的引用（用于其他操作）
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// 交还 page（关闭会话时使用）
    pub fn into_page(self) -> Page {
        self.page
    }

    /// 执行 JS 代码并返回 JSON 结果
    ///
    /// 脚本必须返回可序列化的值，`undefined` 需写成 `null`。
    pub async fn eval(&self, js_code: impl Into<String>) -> Result<JsonValue> {
        let result = self.page.evaluate(js_code.into()).await?;
        let json_value = result.into_value()?;
        Ok(json_value)
    }

    /// 执行 JS 代码并反序列化为指定类型
    pub async fn eval_as<T: DeserializeOwned>(&self, js_code: impl Into<String>) -> Result<T> {
        let json_value = self.eval(js_code).await?;
        let typed_value = serde_json::from_value(json_value)?;
        Ok(typed_value)
    }

    /// 在定位到的元素上执行脚本片段
    ///
    /// 片段中可以使用变量 `el`（找不到时为 `null`），必须自己 `return`。
    pub async fn eval_on<T: DeserializeOwned>(&self, step: &LocatorStep, body: &str) -> Result<T> {
        self.eval_as(element_script(step, body)?).await
    }
}

/// 生成"先用 XPath 取元素再执行片段"的脚本
pub fn element_script(step: &LocatorStep, body: &str) -> Result<String> {
    let xpath = serde_json::to_string(&step.to_xpath())?;
    Ok(format!(
        r#"(() => {{
            const el = document.evaluate({xpath}, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue;
            {body}
        }})()"#
    ))
}
