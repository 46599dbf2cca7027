//! 测试共用的假页面、假会话和假策略
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use court_fetch::browser::{BrowserSession, SessionFactory};
use court_fetch::challenge::{
    ChallengeError, ChallengePipeline, ChallengeStrategy, HumanSolver, MediaFetcher, OcrEngine,
    SolveSource, SolvedChallenge, SpeechToText,
};
use court_fetch::infrastructure::ControlSnapshot;
use court_fetch::locator::{fields, LocatorRegistry, LocatorStep};
use court_fetch::models::CaseTypeCatalog;
use court_fetch::workflow::{CaseFlow, FlowSettings};
use court_fetch::PageDriver;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};

pub const RESULTS_URL: &str = "https://delhihighcourt.nic.in/app/case-number";

/// 默认定位表里某个字段的第 `index` 个策略
pub fn step_of(field: &str, index: usize) -> LocatorStep {
    LocatorRegistry::default()
        .get(field)
        .unwrap()
        .steps()[index]
        .clone()
}

/// 内存中的页面
///
/// 控件按 [`LocatorStep`] 登记；所有调用都记入 `calls`。
#[derive(Default)]
pub struct FakePage {
    present: HashSet<LocatorStep>,
    probe_errors: HashSet<LocatorStep>,
    texts: HashMap<LocatorStep, String>,
    attributes: HashMap<(LocatorStep, String), String>,
    controls: HashMap<String, Vec<ControlSnapshot>>,
    failing_scripted: HashSet<LocatorStep>,
    failing_native: HashSet<LocatorStep>,
    challenge_marker: bool,
    navigation_error: Option<String>,
    /// 提交成功后才出现的表格
    table_after_submit: Option<String>,
    submitted: Mutex<bool>,
    filled: Mutex<HashMap<LocatorStep, String>>,
    calls: Mutex<Vec<String>>,
}

impl FakePage {
    pub fn new() -> Self {
        Self::default()
    }

    /// 查询页面的四个表单控件都通过 id 命中
    pub fn with_standard_form() -> Self {
        Self::new()
            .with_control(LocatorStep::id("case_type"))
            .with_control(LocatorStep::id("case_number"))
            .with_control(LocatorStep::id("filing_year"))
            .with_control(LocatorStep::id("submit_button"))
    }

    pub fn with_control(mut self, step: LocatorStep) -> Self {
        self.present.insert(step);
        self
    }

    pub fn without_control(mut self, step: &LocatorStep) -> Self {
        self.present.remove(step);
        self
    }

    pub fn with_probe_error(mut self, step: LocatorStep) -> Self {
        self.probe_errors.insert(step);
        self
    }

    pub fn with_text(mut self, step: LocatorStep, text: &str) -> Self {
        self.present.insert(step.clone());
        self.texts.insert(step, text.to_string());
        self
    }

    pub fn with_attribute(mut self, step: LocatorStep, name: &str, value: &str) -> Self {
        self.present.insert(step.clone());
        self.attributes
            .insert((step, name.to_string()), value.to_string());
        self
    }

    pub fn with_snapshot(mut self, tag: &str, id: &str, name: &str) -> Self {
        self.controls
            .entry(tag.to_string())
            .or_default()
            .push(ControlSnapshot {
                tag: tag.to_string(),
                id: id.to_string(),
                name: name.to_string(),
                ..Default::default()
            });
        self
    }

    pub fn with_failing_scripted_click(mut self, step: LocatorStep) -> Self {
        self.failing_scripted.insert(step);
        self
    }

    pub fn with_failing_native_click(mut self, step: LocatorStep) -> Self {
        self.failing_native.insert(step);
        self
    }

    pub fn with_challenge_marker(mut self) -> Self {
        self.challenge_marker = true;
        self
    }

    pub fn with_failing_navigation(mut self, cause: &str) -> Self {
        self.navigation_error = Some(cause.to_string());
        self
    }

    pub fn with_results_table(mut self, html: &str) -> Self {
        self.table_after_submit = Some(html.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_starting_with(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }

    pub fn filled_value(&self, step: &LocatorStep) -> Option<String> {
        self.filled.lock().unwrap().get(step).cloned()
    }

    pub fn was_submitted(&self) -> bool {
        *self.submitted.lock().unwrap()
    }

    fn log(&self, entry: String) {
        self.calls.lock().unwrap().push(entry);
    }

    fn require(&self, step: &LocatorStep) -> Result<()> {
        if self.present.contains(step) {
            Ok(())
        } else {
            bail!("no such element: {}", step)
        }
    }

    fn is_submit(step: &LocatorStep) -> bool {
        step.selector.contains("submit")
    }
}

#[async_trait]
impl PageDriver for FakePage {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.log(format!("navigate:{}", url));
        if let Some(cause) = &self.navigation_error {
            bail!("{}", cause);
        }
        Ok(())
    }

    async fn probe(&self, step: &LocatorStep) -> Result<bool> {
        self.log(format!("probe:{}", step));
        if self.probe_errors.contains(step) {
            bail!("invalid selector: {}", step);
        }
        Ok(self.present.contains(step))
    }

    async fn describe_controls(&self, tag: &str) -> Result<Vec<ControlSnapshot>> {
        self.log(format!("describe:{}", tag));
        Ok(self.controls.get(tag).cloned().unwrap_or_default())
    }

    async fn select_by_text(&self, step: &LocatorStep, text: &str) -> Result<()> {
        self.log(format!("select:{}={}", step, text));
        self.require(step)?;
        self.filled
            .lock()
            .unwrap()
            .insert(step.clone(), text.to_string());
        Ok(())
    }

    async fn fill(&self, step: &LocatorStep, text: &str, clear_first: bool) -> Result<()> {
        self.log(format!("fill:{}:clear={}", step, clear_first));
        self.require(step)?;
        let mut filled = self.filled.lock().unwrap();
        let value = filled.entry(step.clone()).or_default();
        if clear_first {
            value.clear();
        }
        value.push_str(text);
        Ok(())
    }

    async fn read_text(&self, step: &LocatorStep) -> Result<Option<String>> {
        self.log(format!("read_text:{}", step));
        Ok(self.texts.get(step).cloned())
    }

    async fn read_attribute(&self, step: &LocatorStep, attribute: &str) -> Result<Option<String>> {
        self.log(format!("read_attribute:{}:{}", step, attribute));
        Ok(self
            .attributes
            .get(&(step.clone(), attribute.to_string()))
            .cloned())
    }

    async fn scroll_into_view(&self, step: &LocatorStep) -> Result<()> {
        self.log(format!("scroll:{}", step));
        self.require(step)
    }

    async fn click_scripted(&self, step: &LocatorStep) -> Result<()> {
        self.log(format!("click_scripted:{}", step));
        self.require(step)?;
        if self.failing_scripted.contains(step) {
            bail!("element not interactable");
        }
        if Self::is_submit(step) {
            *self.submitted.lock().unwrap() = true;
        }
        Ok(())
    }

    async fn click_native(&self, step: &LocatorStep) -> Result<()> {
        self.log(format!("click_native:{}", step));
        self.require(step)?;
        if self.failing_native.contains(step) {
            bail!("element click intercepted");
        }
        if Self::is_submit(step) {
            *self.submitted.lock().unwrap() = true;
        }
        Ok(())
    }

    async fn contains_any_text(&self, markers: &[String]) -> Result<bool> {
        self.log(format!("markers:{}", markers.join("|")));
        Ok(self.challenge_marker)
    }

    async fn first_table_html(&self) -> Result<Option<String>> {
        self.log("first_table".to_string());
        if self.was_submitted() {
            Ok(self.table_after_submit.clone())
        } else {
            Ok(None)
        }
    }

    async fn current_url(&self) -> Result<Option<String>> {
        Ok(Some(RESULTS_URL.to_string()))
    }

    async fn page_source(&self) -> Result<String> {
        Ok("<html><body>fake</body></html>".to_string())
    }
}

/// 共享同一个假页面的会话工厂，统计打开和关闭次数
pub struct FakeSessionFactory {
    page: Arc<FakePage>,
    pub opened: Arc<AtomicUsize>,
    pub closed: Arc<AtomicUsize>,
}

impl FakeSessionFactory {
    pub fn new(page: Arc<FakePage>) -> Self {
        Self {
            page,
            opened: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

struct FakeSession {
    page: Arc<FakePage>,
    closed: Arc<AtomicUsize>,
}

#[async_trait]
impl BrowserSession for FakeSession {
    fn page(&self) -> &dyn PageDriver {
        self.page.as_ref()
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl SessionFactory for FakeSessionFactory {
    async fn open(&self) -> Result<Box<dyn BrowserSession>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            page: self.page.clone(),
            closed: self.closed.clone(),
        }))
    }
}

/// 永远打不开会话的工厂
pub struct FailingSessionFactory(pub &'static str);

#[async_trait]
impl SessionFactory for FailingSessionFactory {
    async fn open(&self) -> Result<Box<dyn BrowserSession>> {
        bail!("{}", self.0)
    }
}

/// 预设结果的策略，统计被调用次数
pub struct ScriptedStrategy {
    source: SolveSource,
    result: fn() -> Result<Option<SolvedChallenge>, ChallengeError>,
    pub calls: Arc<AtomicUsize>,
}

impl ScriptedStrategy {
    pub fn new(
        source: SolveSource,
        result: fn() -> Result<Option<SolvedChallenge>, ChallengeError>,
    ) -> Self {
        Self {
            source,
            result,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl ChallengeStrategy for ScriptedStrategy {
    fn source(&self) -> SolveSource {
        self.source
    }

    async fn attempt(
        &self,
        _page: &dyn PageDriver,
        _locators: &LocatorRegistry,
    ) -> Result<Option<SolvedChallenge>, ChallengeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.result)()
    }
}

/// 不等待的流程参数
pub fn fast_settings() -> FlowSettings {
    FlowSettings {
        target_url: RESULTS_URL.to_string(),
        page_load_delay: Duration::ZERO,
        settle_delay: Duration::ZERO,
        poll_interval: Duration::from_millis(5),
        results_deadline: Duration::from_millis(30),
        submit_scroll_delay: Duration::ZERO,
        challenge_markers: vec!["Captcha".to_string(), "CAPTCHA".to_string()],
    }
}

pub fn flow_with(pipeline: ChallengePipeline) -> CaseFlow {
    CaseFlow::new(
        fast_settings(),
        CaseTypeCatalog::default(),
        LocatorRegistry::default(),
        pipeline,
    )
}

/// 表头 + 若干 5 列数据行
pub fn results_table(rows: &[[&str; 5]]) -> String {
    let mut html = String::from(
        "<table><tr><th>S.No.</th><th>Case No.</th><th>Date</th><th>Party</th><th>Corrigendum</th></tr>",
    );
    for row in rows {
        html.push_str("<tr>");
        for cell in row {
            html.push_str(&format!("<td>{}</td>", cell));
        }
        html.push_str("</tr>");
    }
    html.push_str("</table>");
    html
}

pub fn challenge_text_step() -> LocatorStep {
    step_of(fields::CHALLENGE_TEXT, 0)
}

/// 不应被调用的网络下载器（测试里的媒体都是 data URL）
pub struct OfflineFetcher {
    pub calls: AtomicUsize,
}

impl OfflineFetcher {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl MediaFetcher for OfflineFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        bail!("network disabled: {}", url)
    }
}

pub struct FailingTranscriber;

#[async_trait]
impl SpeechToText for FailingTranscriber {
    async fn transcribe(&self, _audio_path: &Path) -> Result<String> {
        bail!("transcription service returned 503")
    }
}

pub struct FixedTranscriber(pub &'static str);

#[async_trait]
impl SpeechToText for FixedTranscriber {
    async fn transcribe(&self, _audio_path: &Path) -> Result<String> {
        Ok(self.0.to_string())
    }
}

pub struct FixedOcr(pub &'static str);

#[async_trait]
impl OcrEngine for FixedOcr {
    async fn recognize(&self, _image: &DynamicImage) -> Result<String> {
        Ok(self.0.to_string())
    }
}

/// 确认前先等待 `delay`
pub struct ScriptedHuman {
    pub confirm: bool,
    pub delay: Duration,
}

#[async_trait]
impl HumanSolver for ScriptedHuman {
    async fn await_confirmation(&self, _prompt: &str) -> Result<bool> {
        tokio::time::sleep(self.delay).await;
        Ok(self.confirm)
    }
}

pub fn png_data_url() -> String {
    let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_pixel(16, 6, Rgb([240, 240, 240]));
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut out, ImageFormat::Png)
        .unwrap();
    format!("data:image/png;base64,{}", STANDARD.encode(out.into_inner()))
}

pub fn audio_data_url() -> String {
    format!("data:audio/mp3;base64,{}", STANDARD.encode(b"ID3fake-mp3"))
}

/// 标准四级管线，媒体只走 data URL
pub fn standard_pipeline(
    transcriber: Option<Arc<dyn SpeechToText>>,
    ocr: Arc<dyn OcrEngine>,
    human: Option<Arc<dyn HumanSolver>>,
    manual_timeout: Duration,
) -> ChallengePipeline {
    ChallengePipeline::standard(
        Arc::new(OfflineFetcher::new()),
        transcriber,
        ocr,
        human,
        Duration::ZERO,
        manual_timeout,
    )
}

/// 带验证码标记的页面：直接读取为空、音频和图片都是内联数据
pub fn page_with_unsolvable_challenge() -> FakePage {
    FakePage::with_standard_form()
        .with_challenge_marker()
        .with_control(step_of(fields::CHALLENGE_INPUT, 0))
        .with_text(challenge_text_step(), "   ")
        .with_control(step_of(fields::CHALLENGE_AUDIO_BUTTON, 0))
        .with_attribute(step_of(fields::CHALLENGE_AUDIO, 0), "src", &audio_data_url())
        .with_attribute(step_of(fields::CHALLENGE_IMAGE, 0), "src", &png_data_url())
}
