use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::locator::{LocatorRegistry, LocatorSpec};
use crate::models::{CaseTypeCatalog, DEFAULT_CASE_TYPES};

/// 验证码人工兜底模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManualChallengeMode {
    /// 非交互部署：人工策略不适用
    #[default]
    Disabled,
    /// 在终端提示操作员，在浏览器窗口里完成
    Console,
}

impl FromStr for ManualChallengeMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "disabled" | "off" | "false" => Ok(ManualChallengeMode::Disabled),
            "console" | "on" | "true" => Ok(ManualChallengeMode::Console),
            _ => Err(()),
        }
    }
}

/// 程序配置
///
/// 取值顺序：内置默认值 → `COURT_CONFIG_FILE` 指向的 TOML 文件 → `COURT_*` 环境变量。
/// 构建后只读，通过 `Arc` 共享。
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 案件查询页面
    pub target_url: String,
    /// 设置后连接到已运行浏览器的调试端口，否则启动新的浏览器
    pub browser_debug_port: Option<u16>,
    /// 启动新浏览器时是否无头
    pub headless: bool,
    /// 浏览器可执行文件，不设置时由 chromiumoxide 自动查找
    pub browser_executable: Option<PathBuf>,

    // --- 时间设置 ---
    pub page_load_delay_ms: u64,
    pub settle_delay_ms: u64,
    pub results_poll_interval_ms: u64,
    pub results_deadline_secs: u64,
    pub submit_scroll_delay_ms: u64,
    pub audio_activation_delay_ms: u64,
    /// 单个请求的总时限
    pub run_timeout_secs: u64,

    // --- 验证码 ---
    /// 页面上出现这些文本即视为有验证码
    pub challenge_markers: Vec<String>,
    pub manual_challenge: ManualChallengeMode,
    pub manual_timeout_secs: u64,
    pub transcription_base_url: String,
    /// 未设置时音频策略不适用
    pub transcription_api_key: Option<String>,
    pub transcription_model: String,
    pub media_timeout_secs: u64,
    pub tesseract_path: PathBuf,

    // --- 输出 ---
    pub downloads_dir: PathBuf,
    pub database_path: PathBuf,
    pub debug_dir: PathBuf,

    /// 批量查询时同时打开的会话数
    pub max_concurrent_requests: usize,
    /// 是否显示详细日志
    pub verbose_logging: bool,

    /// 案件类型目录（有序）
    pub case_types: Vec<String>,
    /// 按字段名覆盖默认定位表
    pub locators: HashMap<String, LocatorSpec>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target_url: "https://delhihighcourt.nic.in/app/case-number".to_string(),
            browser_debug_port: None,
            headless: true,
            browser_executable: None,
            page_load_delay_ms: 3000,
            settle_delay_ms: 2000,
            results_poll_interval_ms: 500,
            results_deadline_secs: 20,
            submit_scroll_delay_ms: 1000,
            audio_activation_delay_ms: 2000,
            run_timeout_secs: 180,
            challenge_markers: vec!["Captcha".to_string(), "CAPTCHA".to_string()],
            manual_challenge: ManualChallengeMode::Disabled,
            manual_timeout_secs: 300,
            transcription_base_url: "https://api.openai.com/v1".to_string(),
            transcription_api_key: None,
            transcription_model: "whisper-1".to_string(),
            media_timeout_secs: 15,
            tesseract_path: PathBuf::from("tesseract"),
            downloads_dir: PathBuf::from("downloads"),
            database_path: PathBuf::from("court_scraper.db"),
            debug_dir: PathBuf::from("debug"),
            max_concurrent_requests: 4,
            verbose_logging: false,
            case_types: DEFAULT_CASE_TYPES.iter().map(|s| s.to_string()).collect(),
            locators: HashMap::new(),
        }
    }
}

/// 读取并解析一个环境变量，未设置时返回 `None`
fn env_parse<T: FromStr>(var_name: &str, expected_type: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(var_name) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::EnvVarParseFailed {
                var_name: var_name.to_string(),
                value,
                expected_type: expected_type.to_string(),
            }),
        Err(_) => Ok(None),
    }
}

fn env_string(var_name: &str) -> Option<String> {
    std::env::var(var_name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// 默认值 + 环境变量
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().apply_env()
    }

    /// 默认值 + 可选的 TOML 文件 + 环境变量
    pub fn load() -> Result<Self, ConfigError> {
        let base = match env_string("COURT_CONFIG_FILE") {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        base.apply_env()
    }

    /// 从 TOML 文件读取，未出现的键取默认值
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileReadFailed {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content, &path.display().to_string())
    }

    pub fn from_toml_str(content: &str, origin: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::TomlParseFailed {
            path: origin.to_string(),
            source,
        })
    }

    fn apply_env(mut self) -> Result<Self, ConfigError> {
        if let Some(v) = env_string("COURT_TARGET_URL") {
            self.target_url = v;
        }
        if let Some(v) = env_parse("COURT_BROWSER_DEBUG_PORT", "u16")? {
            self.browser_debug_port = Some(v);
        }
        if let Some(v) = env_parse("COURT_HEADLESS", "bool")? {
            self.headless = v;
        }
        if let Some(v) = env_string("COURT_BROWSER_EXECUTABLE") {
            self.browser_executable = Some(PathBuf::from(v));
        }
        if let Some(v) = env_parse("COURT_PAGE_LOAD_DELAY_MS", "u64")? {
            self.page_load_delay_ms = v;
        }
        if let Some(v) = env_parse("COURT_SETTLE_DELAY_MS", "u64")? {
            self.settle_delay_ms = v;
        }
        if let Some(v) = env_parse("COURT_RESULTS_POLL_INTERVAL_MS", "u64")? {
            self.results_poll_interval_ms = v;
        }
        if let Some(v) = env_parse("COURT_RESULTS_DEADLINE_SECS", "u64")? {
            self.results_deadline_secs = v;
        }
        if let Some(v) = env_parse("COURT_RUN_TIMEOUT_SECS", "u64")? {
            self.run_timeout_secs = v;
        }
        if let Some(v) = env_string("COURT_MANUAL_CHALLENGE") {
            self.manual_challenge =
                v.parse()
                    .map_err(|_| ConfigError::EnvVarParseFailed {
                        var_name: "COURT_MANUAL_CHALLENGE".to_string(),
                        value: v.clone(),
                        expected_type: "disabled|console".to_string(),
                    })?;
        }
        if let Some(v) = env_parse("COURT_MANUAL_TIMEOUT_SECS", "u64")? {
            self.manual_timeout_secs = v;
        }
        if let Some(v) = env_string("COURT_TRANSCRIPTION_BASE_URL") {
            self.transcription_base_url = v;
        }
        if let Some(v) = env_string("COURT_TRANSCRIPTION_API_KEY") {
            self.transcription_api_key = Some(v);
        }
        if let Some(v) = env_string("COURT_TRANSCRIPTION_MODEL") {
            self.transcription_model = v;
        }
        if let Some(v) = env_string("COURT_TESSERACT_PATH") {
            self.tesseract_path = PathBuf::from(v);
        }
        if let Some(v) = env_string("COURT_DOWNLOADS_DIR") {
            self.downloads_dir = PathBuf::from(v);
        }
        if let Some(v) = env_string("COURT_DATABASE_PATH") {
            self.database_path = PathBuf::from(v);
        }
        if let Some(v) = env_string("COURT_DEBUG_DIR") {
            self.debug_dir = PathBuf::from(v);
        }
        if let Some(v) = env_parse("COURT_MAX_CONCURRENT_REQUESTS", "usize")? {
            self.max_concurrent_requests = v;
        }
        if let Some(v) = env_parse("COURT_VERBOSE_LOGGING", "bool")? {
            self.verbose_logging = v;
        }
        Ok(self)
    }

    pub fn page_load_delay(&self) -> Duration {
        Duration::from_millis(self.page_load_delay_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn results_poll_interval(&self) -> Duration {
        Duration::from_millis(self.results_poll_interval_ms)
    }

    pub fn results_deadline(&self) -> Duration {
        Duration::from_secs(self.results_deadline_secs)
    }

    pub fn submit_scroll_delay(&self) -> Duration {
        Duration::from_millis(self.submit_scroll_delay_ms)
    }

    pub fn audio_activation_delay(&self) -> Duration {
        Duration::from_millis(self.audio_activation_delay_ms)
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }

    pub fn manual_timeout(&self) -> Duration {
        Duration::from_secs(self.manual_timeout_secs)
    }

    pub fn media_timeout(&self) -> Duration {
        Duration::from_secs(self.media_timeout_secs)
    }

    pub fn catalog(&self) -> Result<CaseTypeCatalog, ConfigError> {
        CaseTypeCatalog::new(self.case_types.iter().cloned())
    }

    pub fn locator_registry(&self) -> Result<LocatorRegistry, ConfigError> {
        LocatorRegistry::default().with_overrides(&self.locators)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::fields;

    #[test]
    fn test_default_catalog_and_locators() {
        let config = Config::default();
        let catalog = config.catalog().unwrap();
        assert!(catalog.contains("W.P.(C)"));
        let registry = config.locator_registry().unwrap();
        assert!(registry.get(fields::SUBMIT).is_some());
    }

    #[test]
    fn test_toml_overlay() {
        let toml = r#"
            target_url = "http://localhost:8080/case"
            manual_challenge = "console"
            case_types = ["W.P.(C)", "CRL.A."]

            [locators.filing_year_input]
            steps = [{ strategy = "name", selector = "yr" }]
            diagnostic_tags = ["input"]
        "#;
        let config = Config::from_toml_str(toml, "inline").unwrap();
        assert_eq!(config.target_url, "http://localhost:8080/case");
        assert_eq!(config.manual_challenge, ManualChallengeMode::Console);
        // 未出现的键保持默认值
        assert_eq!(config.settle_delay_ms, 2000);
        assert_eq!(config.catalog().unwrap().len(), 2);

        let registry = config.locator_registry().unwrap();
        let year = registry.get(fields::FILING_YEAR).unwrap();
        assert_eq!(year.steps().len(), 1);
        assert_eq!(year.steps()[0].to_string(), "name=yr");
    }

    #[test]
    fn test_empty_locator_override_rejected() {
        let toml = r#"
            [locators.submit_button]
            steps = []
        "#;
        let config = Config::from_toml_str(toml, "inline").unwrap();
        assert!(matches!(
            config.locator_registry(),
            Err(ConfigError::EmptyLocator { .. })
        ));
    }

    #[test]
    fn test_bad_toml() {
        assert!(matches!(
            Config::from_toml_str("target_url = [", "inline"),
            Err(ConfigError::TomlParseFailed { .. })
        ));
    }

    #[test]
    fn test_manual_mode_parse() {
        assert_eq!("Console".parse(), Ok(ManualChallengeMode::Console));
        assert_eq!("off".parse(), Ok(ManualChallengeMode::Disabled));
        assert!("maybe".parse::<ManualChallengeMode>().is_err());
    }
}
