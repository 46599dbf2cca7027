//! 页面能力接口
//!
//! 定位引擎、验证码管线和工作流只通过这个 trait 访问页面，
//! 不直接接触 chromiumoxide。测试里用内存中的假页面实现它。

use std::fmt::Display;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::locator::LocatorStep;

/// 页面控件的诊断快照
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlSnapshot {
    pub tag: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: String,
}

impl Display for ControlSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "<{}> id='{}', name='{}', type='{}', text='{}'",
            self.tag, self.id, self.name, self.kind, self.text
        )
    }
}

/// 单个浏览器页面暴露的能力
///
/// 所有控件都以 [`LocatorStep`] 寻址；只读查询不修改 DOM。
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// 导航到指定 URL
    async fn navigate(&self, url: &str) -> Result<()>;

    /// 控件是否存在（只读）
    async fn probe(&self, step: &LocatorStep) -> Result<bool>;

    /// 列出页面上某个标签的所有控件（只读，用于诊断）
    async fn describe_controls(&self, tag: &str) -> Result<Vec<ControlSnapshot>>;

    /// 按可见文本精确选择下拉选项
    async fn select_by_text(&self, step: &LocatorStep, text: &str) -> Result<()>;

    /// 向输入框键入文本，`clear_first` 时先清空
    async fn fill(&self, step: &LocatorStep, text: &str, clear_first: bool) -> Result<()>;

    /// 读取控件的可见文本，控件不存在时返回 `None`
    async fn read_text(&self, step: &LocatorStep) -> Result<Option<String>>;

    /// 读取控件属性（`src`/`href` 返回绝对地址），控件或属性不存在时返回 `None`
    async fn read_attribute(&self, step: &LocatorStep, attribute: &str) -> Result<Option<String>>;

    /// 滚动到控件可见
    async fn scroll_into_view(&self, step: &LocatorStep) -> Result<()>;

    /// 通过脚本激活控件
    async fn click_scripted(&self, step: &LocatorStep) -> Result<()>;

    /// 通过模拟鼠标交互激活控件
    async fn click_native(&self, step: &LocatorStep) -> Result<()>;

    /// 页面上是否存在包含任一标记文本的元素
    async fn contains_any_text(&self, markers: &[String]) -> Result<bool>;

    /// 第一个 `<table>` 的 outerHTML
    async fn first_table_html(&self) -> Result<Option<String>>;

    async fn current_url(&self) -> Result<Option<String>>;

    /// 完整页面源码
    async fn page_source(&self) -> Result<String>;
}
