//! 控件定位引擎
//!
//! 目标页面的标记结构没有稳定约定，同一个逻辑字段可能在不同会话里改名。
//! 每个逻辑字段配置一个有序策略列表（稳定 id → 表单 name → 结构路径），
//! 解析时按顺序尝试，第一个命中即返回。

pub mod registry;
pub mod resolver;

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub use registry::{fields, LocatorRegistry};
pub use resolver::{
    resolve, resolve_field, AttemptOutcome, LocatorError, ResolvedControl, StrategyAttempt,
};

/// 定位策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocatorStrategy {
    /// 元素 id
    Id,
    /// 表单 name 属性
    Name,
    /// XPath 结构表达式
    XPath,
}

impl LocatorStrategy {
    pub fn name(self) -> &'static str {
        match self {
            LocatorStrategy::Id => "id",
            LocatorStrategy::Name => "name",
            LocatorStrategy::XPath => "xpath",
        }
    }
}

/// 一个 (策略, 选择器) 对
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocatorStep {
    pub strategy: LocatorStrategy,
    pub selector: String,
}

impl LocatorStep {
    pub fn id(selector: impl Into<String>) -> Self {
        Self {
            strategy: LocatorStrategy::Id,
            selector: selector.into(),
        }
    }

    pub fn name(selector: impl Into<String>) -> Self {
        Self {
            strategy: LocatorStrategy::Name,
            selector: selector.into(),
        }
    }

    pub fn xpath(selector: impl Into<String>) -> Self {
        Self {
            strategy: LocatorStrategy::XPath,
            selector: selector.into(),
        }
    }

    /// 统一转换为 XPath，浏览器端只需要一种查找方式
    pub fn to_xpath(&self) -> String {
        match self.strategy {
            LocatorStrategy::Id => format!("//*[@id={}]", xpath_literal(&self.selector)),
            LocatorStrategy::Name => format!("//*[@name={}]", xpath_literal(&self.selector)),
            LocatorStrategy::XPath => self.selector.clone(),
        }
    }
}

impl Display for LocatorStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.strategy.name(), self.selector)
    }
}

/// 把任意字符串写成 XPath 字符串字面量
///
/// XPath 1.0 没有转义，同时含有单双引号时只能用 `concat()` 拼接。
pub fn xpath_literal(value: &str) -> String {
    if !value.contains('\'') {
        return format!("'{}'", value);
    }
    if !value.contains('"') {
        return format!("\"{}\"", value);
    }
    let parts: Vec<String> = value
        .split('\'')
        .map(|part| format!("'{}'", part))
        .collect();
    format!("concat({})", parts.join(", \"'\", "))
}

/// 一个逻辑字段的定位配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementLocator {
    field: String,
    steps: Vec<LocatorStep>,
    diagnostic_tags: Vec<String>,
}

impl ElementLocator {
    /// 策略列表不能为空
    ///
    /// `diagnostic_tags` 是定位失败时需要快照的标签（如 `select`、`input`）。
    pub fn new(
        field: impl Into<String>,
        steps: Vec<LocatorStep>,
        diagnostic_tags: Vec<String>,
    ) -> Result<Self, ConfigError> {
        let field = field.into();
        if steps.is_empty() {
            return Err(ConfigError::EmptyLocator { field });
        }
        Ok(Self {
            field,
            steps,
            diagnostic_tags,
        })
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn steps(&self) -> &[LocatorStep] {
        &self.steps
    }

    pub fn diagnostic_tags(&self) -> &[String] {
        &self.diagnostic_tags
    }
}

/// 配置文件中的定位覆盖项
///
/// ```toml
/// [locators.filing_year_input]
/// steps = [{ strategy = "id", selector = "year" }]
/// diagnostic_tags = ["input"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocatorSpec {
    pub steps: Vec<LocatorStep>,
    #[serde(default)]
    pub diagnostic_tags: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_xpath_per_strategy() {
        assert_eq!(LocatorStep::id("case_type").to_xpath(), "//*[@id='case_type']");
        assert_eq!(LocatorStep::name("submit").to_xpath(), "//*[@name='submit']");
        assert_eq!(
            LocatorStep::xpath("//input[@type='submit']").to_xpath(),
            "//input[@type='submit']"
        );
    }

    #[test]
    fn test_xpath_literal_quoting() {
        assert_eq!(xpath_literal("abc"), "'abc'");
        assert_eq!(xpath_literal("it's"), "\"it's\"");
        assert_eq!(
            xpath_literal(r#"a'b"c"#),
            r#"concat('a', "'", 'b"c')"#
        );
    }

    #[test]
    fn test_empty_locator_rejected() {
        let err = ElementLocator::new("x", Vec::new(), Vec::new()).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyLocator { field } if field == "x"));
    }

    #[test]
    fn test_locator_spec_from_toml() {
        let spec: LocatorSpec = toml::from_str(
            r#"steps = [{ strategy = "name", selector = "year" }, { strategy = "xpath", selector = "//input" }]"#,
        )
        .unwrap();
        assert_eq!(
            spec.steps,
            vec![LocatorStep::name("year"), LocatorStep::xpath("//input")]
        );
        assert!(spec.diagnostic_tags.is_empty());
    }
}
