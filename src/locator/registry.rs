use std::collections::HashMap;

use crate::error::ConfigError;
use crate::locator::{ElementLocator, LocatorSpec, LocatorStep};

/// 逻辑字段名
pub mod fields {
    pub const CASE_TYPE: &str = "case_type_select";
    pub const CASE_NUMBER: &str = "case_number_input";
    pub const FILING_YEAR: &str = "filing_year_input";
    pub const SUBMIT: &str = "submit_button";
    /// 最后兜底：页面上任意 submit 类型控件
    pub const SUBMIT_ANY: &str = "submit_any";
    pub const CHALLENGE_INPUT: &str = "challenge_input";
    pub const CHALLENGE_TEXT: &str = "challenge_text";
    pub const CHALLENGE_AUDIO_BUTTON: &str = "challenge_audio_button";
    pub const CHALLENGE_AUDIO: &str = "challenge_audio";
    pub const CHALLENGE_IMAGE: &str = "challenge_image";
}

/// 字段名 → 定位配置
///
/// 静态配置，构建后只读。
#[derive(Debug, Clone)]
pub struct LocatorRegistry {
    locators: HashMap<String, ElementLocator>,
}

impl LocatorRegistry {
    pub fn empty() -> Self {
        Self {
            locators: HashMap::new(),
        }
    }

    /// 覆盖或新增一个字段的定位配置
    pub fn insert(&mut self, locator: ElementLocator) {
        self.locators.insert(locator.field().to_string(), locator);
    }

    pub fn get(&self, field: &str) -> Option<&ElementLocator> {
        self.locators.get(field)
    }

    pub fn len(&self) -> usize {
        self.locators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locators.is_empty()
    }

    /// 在默认配置上应用配置文件里的覆盖项
    pub fn with_overrides(
        mut self,
        overrides: &HashMap<String, LocatorSpec>,
    ) -> Result<Self, ConfigError> {
        for (field, spec) in overrides {
            self.insert(ElementLocator::new(
                field.clone(),
                spec.steps.clone(),
                spec.diagnostic_tags.clone(),
            )?);
        }
        Ok(self)
    }
}

fn builtin(field: &str, steps: Vec<LocatorStep>, tags: &[&str]) -> ElementLocator {
    ElementLocator {
        field: field.to_string(),
        steps,
        diagnostic_tags: tags.iter().map(|t| t.to_string()).collect(),
    }
}

impl Default for LocatorRegistry {
    /// 查询页面的默认定位表，从最具体到最宽泛
    fn default() -> Self {
        let mut registry = Self::empty();

        registry.insert(builtin(
            fields::CASE_TYPE,
            vec![
                LocatorStep::id("case_type"),
                LocatorStep::name("case_type"),
                LocatorStep::xpath(
                    "//select[contains(@name, 'case_type') or contains(@id, 'case_type')]",
                ),
            ],
            &["select"],
        ));
        registry.insert(builtin(
            fields::CASE_NUMBER,
            vec![
                LocatorStep::id("case_number"),
                LocatorStep::name("case_number"),
                LocatorStep::xpath(
                    "//input[contains(@name, 'case_number') or contains(@id, 'case_number')]",
                ),
            ],
            &["input"],
        ));
        registry.insert(builtin(
            fields::FILING_YEAR,
            vec![
                LocatorStep::id("filing_year"),
                LocatorStep::name("filing_year"),
                LocatorStep::id("year"),
                LocatorStep::name("year"),
                LocatorStep::xpath("//input[contains(@name, 'year') or contains(@id, 'year')]"),
            ],
            &["input", "select"],
        ));
        registry.insert(builtin(
            fields::SUBMIT,
            vec![
                LocatorStep::id("submit_button"),
                LocatorStep::name("submit"),
                LocatorStep::xpath("//input[@type='submit']"),
                LocatorStep::xpath("//button[@type='submit']"),
            ],
            &["button", "input"],
        ));
        registry.insert(builtin(
            fields::SUBMIT_ANY,
            vec![LocatorStep::xpath(
                "//input[@type='submit'] | //button[@type='submit']",
            )],
            &["button", "input"],
        ));
        registry.insert(builtin(
            fields::CHALLENGE_INPUT,
            vec![LocatorStep::xpath(
                "//input[contains(@name, 'captcha') or contains(@id, 'captcha')]",
            )],
            &["input"],
        ));
        registry.insert(builtin(
            fields::CHALLENGE_TEXT,
            vec![LocatorStep::id("captcha-code")],
            &["span"],
        ));
        registry.insert(builtin(
            fields::CHALLENGE_AUDIO_BUTTON,
            vec![LocatorStep::xpath(
                "//button[contains(@title, 'audio') or contains(@aria-label, 'audio')]",
            )],
            &["button"],
        ));
        registry.insert(builtin(
            fields::CHALLENGE_AUDIO,
            vec![LocatorStep::xpath("//audio")],
            &["audio"],
        ));
        registry.insert(builtin(
            fields::CHALLENGE_IMAGE,
            vec![LocatorStep::xpath(
                "//img[contains(@src, 'captcha') or contains(@alt, 'captcha')]",
            )],
            &["img"],
        ));

        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_covers_all_fields() {
        let registry = LocatorRegistry::default();
        for field in [
            fields::CASE_TYPE,
            fields::CASE_NUMBER,
            fields::FILING_YEAR,
            fields::SUBMIT,
            fields::SUBMIT_ANY,
            fields::CHALLENGE_INPUT,
            fields::CHALLENGE_TEXT,
            fields::CHALLENGE_AUDIO_BUTTON,
            fields::CHALLENGE_AUDIO,
            fields::CHALLENGE_IMAGE,
        ] {
            let locator = registry.get(field).unwrap();
            assert!(!locator.steps().is_empty(), "{} 没有策略", field);
        }
    }

    #[test]
    fn test_default_order_is_most_specific_first() {
        let registry = LocatorRegistry::default();
        let steps = registry.get(fields::FILING_YEAR).unwrap().steps();
        assert_eq!(steps[0], LocatorStep::id("filing_year"));
        assert_eq!(steps[4].strategy, crate::locator::LocatorStrategy::XPath);
    }

    #[test]
    fn test_overrides_replace_single_field() {
        let mut overrides = HashMap::new();
        overrides.insert(
            fields::FILING_YEAR.to_string(),
            LocatorSpec {
                steps: vec![LocatorStep::id("yr")],
                diagnostic_tags: vec!["input".to_string()],
            },
        );
        let registry = LocatorRegistry::default().with_overrides(&overrides).unwrap();
        assert_eq!(
            registry.get(fields::FILING_YEAR).unwrap().steps(),
            &[LocatorStep::id("yr")]
        );
        assert_eq!(registry.get(fields::CASE_TYPE).unwrap().steps().len(), 3);
    }

    #[test]
    fn test_empty_override_rejected() {
        let mut overrides = HashMap::new();
        overrides.insert(
            fields::SUBMIT.to_string(),
            LocatorSpec {
                steps: Vec::new(),
                diagnostic_tags: Vec::new(),
            },
        );
        assert!(LocatorRegistry::default().with_overrides(&overrides).is_err());
    }
}
