//! 案件查询器 - 编排层
//!
//! ## 职责
//!
//! 1. **组装**：根据配置构建定位表、验证码管线、流程和各协作者
//! 2. **会话管理**：每次查询独占一个浏览器会话，无论成败都会关闭
//! 3. **记录**：查询开始前登记，结束时更新状态并保存主记录
//! 4. **兜底**：所有失败都收敛为 `WorkflowOutcome::Failure`，诊断信息只写调试文件
//! 5. **并发**：批量查询时用 Semaphore 限制同时打开的会话数

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::{watch, Semaphore};
use tracing::{error, info, warn};

use crate::browser::{ChromeSessionFactory, SessionFactory};
use crate::challenge::{
    ChallengePipeline, ConsoleHumanSolver, HttpMediaFetcher, HumanSolver, SpeechToText,
    TesseractOcr, WhisperTranscriber,
};
use crate::config::{Config, ManualChallengeMode};
use crate::error::{WorkflowError, WorkflowResult};
use crate::models::{CaseRecord, SearchRequest, WorkflowOutcome};
use crate::services::{
    ArtifactRenderer, DebugArtifactWriter, PdfArtifactWriter, QueryLedger, QueryStatus,
    SqliteLedger,
};
use crate::utils::logging;
use crate::workflow::{CaseFlow, FlowSettings, SearchCtx};

/// 失败后抓取页面源码的时限，页面可能已经卡死
const SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(5);

/// 案件查询器
///
/// 所有成员都是 `Arc`，克隆后可以放进并发任务。
#[derive(Clone)]
pub struct CaseFetcher {
    flow: Arc<CaseFlow>,
    sessions: Arc<dyn SessionFactory>,
    ledger: Option<Arc<dyn QueryLedger>>,
    artifacts: Option<Arc<dyn ArtifactRenderer>>,
    debug_writer: Option<Arc<DebugArtifactWriter>>,
    run_timeout: Duration,
    max_concurrent: usize,
}

impl CaseFetcher {
    pub fn new(flow: CaseFlow, sessions: Arc<dyn SessionFactory>) -> Self {
        Self {
            flow: Arc::new(flow),
            sessions,
            ledger: None,
            artifacts: None,
            debug_writer: None,
            run_timeout: Duration::from_secs(180),
            max_concurrent: 1,
        }
    }

    /// 按配置组装完整的查询器（Chrome 会话、SQLite 记录、PDF 输出）
    pub fn initialize(config: &Config) -> Result<Self> {
        let flow = build_flow(config)?;
        let ledger = SqliteLedger::open(&config.database_path)?;

        Ok(Self::new(flow, Arc::new(ChromeSessionFactory::new(config)))
            .with_ledger(Arc::new(ledger))
            .with_artifacts(Arc::new(PdfArtifactWriter::new(&config.downloads_dir)))
            .with_debug_writer(DebugArtifactWriter::new(&config.debug_dir))
            .with_run_timeout(config.run_timeout())
            .with_max_concurrent(config.max_concurrent_requests))
    }

    pub fn with_ledger(mut self, ledger: Arc<dyn QueryLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn with_artifacts(mut self, artifacts: Arc<dyn ArtifactRenderer>) -> Self {
        self.artifacts = Some(artifacts);
        self
    }

    pub fn with_debug_writer(mut self, writer: DebugArtifactWriter) -> Self {
        self.debug_writer = Some(Arc::new(writer));
        self
    }

    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = timeout;
        self
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    pub fn flow(&self) -> &CaseFlow {
        &self.flow
    }

    /// 查询一个案件
    pub async fn fetch(&self, request: &SearchRequest) -> WorkflowOutcome {
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        self.fetch_with_cancel(request, 1, &cancel_rx).await
    }

    /// 查询一个案件；`cancel` 置为 `true` 后在下一个状态转换处中止
    pub async fn fetch_with_cancel(
        &self,
        request: &SearchRequest,
        request_index: usize,
        cancel: &watch::Receiver<bool>,
    ) -> WorkflowOutcome {
        let query_id = self.begin(request).await;
        let ctx = SearchCtx::new(query_id, request_index, request.to_string());
        info!("{} 🔍 开始查询", ctx);

        let (result, snapshot) = self.execute(request, &ctx, cancel).await;

        match result {
            Ok(records) => self.finish_success(request, &ctx, records, snapshot).await,
            Err(e) => self.finish_failure(&ctx, e, snapshot).await,
        }
    }

    /// 批量查询，每个请求独立会话，结果顺序与输入一致
    pub async fn fetch_batch(
        &self,
        requests: Vec<SearchRequest>,
    ) -> Vec<(SearchRequest, WorkflowOutcome)> {
        let total = requests.len();
        logging::log_requests_loaded(total, self.max_concurrent);

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut handles = Vec::with_capacity(total);

        for (idx, request) in requests.into_iter().enumerate() {
            let request_index = idx + 1;
            let semaphore = semaphore.clone();
            let fetcher = self.clone();
            let task_request = request.clone();

            let handle = tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let (_cancel_tx, cancel_rx) = watch::channel(false);
                fetcher
                    .fetch_with_cancel(&task_request, request_index, &cancel_rx)
                    .await
            });
            handles.push((request, handle));
        }

        let mut results = Vec::with_capacity(total);
        let mut success = 0;
        for (request, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("[查询 {}] 任务执行失败: {}", request, e);
                    WorkflowOutcome::failure(&WorkflowError::browser(e))
                }
            };
            if outcome.is_success() {
                success += 1;
            }
            results.push((request, outcome));
        }

        logging::print_final_stats(success, total - success, total);
        results
    }

    /// 记录失败不影响查询本身
    async fn begin(&self, request: &SearchRequest) -> Option<i64> {
        let ledger = self.ledger.as_ref()?;
        match ledger.begin(request).await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!("⚠️ 登记查询失败: {}", e);
                None
            }
        }
    }

    /// 校验 → 打开会话 → 运行流程 → 抓取页面 → 关闭会话
    async fn execute(
        &self,
        request: &SearchRequest,
        ctx: &SearchCtx,
        cancel: &watch::Receiver<bool>,
    ) -> (WorkflowResult<Vec<CaseRecord>>, Option<String>) {
        // 在打开浏览器之前拒绝未知的案件类型
        if let Err(e) = self.flow.validate(request) {
            return (Err(e), None);
        }

        let session = match self.sessions.open().await {
            Ok(session) => session,
            Err(e) => return (Err(WorkflowError::browser(e)), None),
        };

        let result = tokio::time::timeout(
            self.run_timeout,
            self.flow.run(session.page(), request, ctx, cancel),
        )
        .await
        .unwrap_or_else(|_| Err(WorkflowError::Timeout(self.run_timeout)));

        let snapshot = match tokio::time::timeout(SNAPSHOT_TIMEOUT, session.page().page_source())
            .await
        {
            Ok(Ok(source)) => Some(source),
            _ => None,
        };

        if let Err(e) = session.close().await {
            warn!("{} ⚠️ 关闭浏览器会话失败: {}", ctx, e);
        }

        (result, snapshot)
    }

    async fn finish_success(
        &self,
        request: &SearchRequest,
        ctx: &SearchCtx,
        mut records: Vec<CaseRecord>,
        snapshot: Option<String>,
    ) -> WorkflowOutcome {
        // 只为主记录生成 PDF
        if let (Some(renderer), Some(primary)) = (&self.artifacts, records.first_mut()) {
            match renderer.render(primary, request).await {
                Ok(name) => primary.pdf_artifact_name = Some(name),
                Err(e) => warn!("{} ⚠️ 生成 PDF 失败: {}", ctx, e),
            }
        }

        let Some(outcome) = WorkflowOutcome::success(records) else {
            return self
                .finish_failure(ctx, WorkflowError::NoResultsParsed, snapshot)
                .await;
        };

        if let (Some(ledger), Some(query_id), Some(primary)) =
            (&self.ledger, ctx.query_id, outcome.primary())
        {
            if let Err(e) = ledger.complete(query_id, QueryStatus::Success, None).await {
                warn!("{} ⚠️ 更新查询状态失败: {}", ctx, e);
            }
            if let Err(e) = ledger.record(query_id, primary, snapshot.as_deref()).await {
                warn!("{} ⚠️ 保存查询结果失败: {}", ctx, e);
            }
        }

        info!("{} ✅ 查询成功，共 {} 条记录", ctx, outcome.total_count());
        outcome
    }

    async fn finish_failure(
        &self,
        ctx: &SearchCtx,
        error: WorkflowError,
        snapshot: Option<String>,
    ) -> WorkflowOutcome {
        let stage = error.stage();
        error!("{} ❌ 查询失败 [{}]: {}", ctx, stage, error);

        if let Some(writer) = &self.debug_writer {
            if let Err(e) = writer
                .write(
                    &ctx.artifact_key(),
                    &ctx.label,
                    stage.as_str(),
                    &error.diagnostics(),
                    snapshot.as_deref(),
                )
                .await
            {
                warn!("{} ⚠️ 写入调试文件失败: {}", ctx, e);
            }
        }

        if let (Some(ledger), Some(query_id)) = (&self.ledger, ctx.query_id) {
            let message = error.to_string();
            if let Err(e) = ledger
                .complete(query_id, QueryStatus::Failed, Some(&message))
                .await
            {
                warn!("{} ⚠️ 更新查询状态失败: {}", ctx, e);
            }
        }

        WorkflowOutcome::failure(&error)
    }
}

/// 按配置构建流程（目录、定位表、四级验证码管线）
pub fn build_flow(config: &Config) -> Result<CaseFlow> {
    let catalog = config.catalog()?;
    let locators = config.locator_registry()?;

    let fetcher = Arc::new(HttpMediaFetcher::new(config.media_timeout())?);
    let transcriber = WhisperTranscriber::from_config(config)?
        .map(|t| Arc::new(t) as Arc<dyn SpeechToText>);
    let ocr = Arc::new(TesseractOcr::new(&config.tesseract_path));
    let human: Option<Arc<dyn HumanSolver>> = match config.manual_challenge {
        ManualChallengeMode::Disabled => None,
        ManualChallengeMode::Console => {
            if config.headless && config.browser_debug_port.is_none() {
                warn!("⚠️ 人工验证码模式下浏览器为无头模式，操作员将看不到页面");
            }
            Some(Arc::new(ConsoleHumanSolver))
        }
    };

    if transcriber.is_none() {
        info!("未配置语音转写服务，音频验证码策略将被跳过");
    }

    let pipeline = ChallengePipeline::standard(
        fetcher,
        transcriber,
        ocr,
        human,
        config.audio_activation_delay(),
        config.manual_timeout(),
    );

    Ok(CaseFlow::new(
        FlowSettings::from_config(config),
        catalog,
        locators,
        pipeline,
    ))
}
