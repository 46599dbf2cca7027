//! 案件查询流程 - 流程层
//!
//! 核心职责：定义"一次查询"的完整处理流程
//!
//! 流程顺序：
//! 1. 打开查询页 → 定位四个表单控件
//! 2. 填写案件类型 / 案号 / 年份
//! 3. 检测验证码 → 求解 → 填写应答
//! 4. 提交（脚本点击 → 原生点击 → 任意提交按钮）
//! 5. 等待结果表格 → 解析
//!
//! 不持有页面，不关心会话的打开和关闭；这些由编排层负责。

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::challenge::{ChallengeAnswer, ChallengePipeline};
use crate::config::Config;
use crate::error::{WorkflowError, WorkflowResult};
use crate::infrastructure::PageDriver;
use crate::locator::{fields, resolve_field, LocatorRegistry, ResolvedControl};
use crate::models::{CaseRecord, CaseTypeCatalog, SearchRequest};
use crate::services::ResultExtractor;
use crate::workflow::search_ctx::SearchCtx;
use crate::workflow::state::{checkpoint, SessionState};

/// 流程的时间与页面参数
#[derive(Debug, Clone)]
pub struct FlowSettings {
    pub target_url: String,
    /// 导航后等待页面加载
    pub page_load_delay: Duration,
    /// 提交后固定等待，然后开始轮询结果表格
    pub settle_delay: Duration,
    pub poll_interval: Duration,
    /// 轮询结果表格的期限（从提交完成算起）
    pub results_deadline: Duration,
    /// 滚动到提交按钮后的停顿
    pub submit_scroll_delay: Duration,
    /// 页面出现任一文本即视为有验证码
    pub challenge_markers: Vec<String>,
}

impl FlowSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            target_url: config.target_url.clone(),
            page_load_delay: config.page_load_delay(),
            settle_delay: config.settle_delay(),
            poll_interval: config.results_poll_interval(),
            results_deadline: config.results_deadline(),
            submit_scroll_delay: config.submit_scroll_delay(),
            challenge_markers: config.challenge_markers.clone(),
        }
    }
}

/// 查询表单上定位到的四个控件
struct FormControls {
    case_type: ResolvedControl,
    case_number: ResolvedControl,
    filing_year: ResolvedControl,
    submit: ResolvedControl,
}

/// 案件查询流程
///
/// - 编排完整的查询状态机
/// - 不持有任何资源（page）
/// - 只依赖页面能力（PageDriver）和注入的只读配置
pub struct CaseFlow {
    settings: FlowSettings,
    catalog: CaseTypeCatalog,
    locators: LocatorRegistry,
    pipeline: ChallengePipeline,
    extractor: ResultExtractor,
}

impl CaseFlow {
    pub fn new(
        settings: FlowSettings,
        catalog: CaseTypeCatalog,
        locators: LocatorRegistry,
        pipeline: ChallengePipeline,
    ) -> Self {
        Self {
            settings,
            catalog,
            locators,
            pipeline,
            extractor: ResultExtractor::new(),
        }
    }

    pub fn catalog(&self) -> &CaseTypeCatalog {
        &self.catalog
    }

    /// 案件类型必须与目录中某一项完全一致
    pub fn validate(&self, request: &SearchRequest) -> WorkflowResult<()> {
        if self.catalog.contains(request.case_type()) {
            Ok(())
        } else {
            Err(WorkflowError::UnknownCaseType {
                case_type: request.case_type().to_string(),
            })
        }
    }

    /// 在给定页面上跑完整个状态机，返回解析出的全部记录（至少一条）
    pub async fn run(
        &self,
        page: &dyn PageDriver,
        request: &SearchRequest,
        ctx: &SearchCtx,
        cancel: &watch::Receiver<bool>,
    ) -> WorkflowResult<Vec<CaseRecord>> {
        self.validate(request)?;

        let mut state = SessionState::Start;
        checkpoint(cancel, state)?;

        // ========== START → FORM_LOCATED ==========
        self.open(page, ctx).await?;
        let controls = self.locate_form(page, ctx).await?;
        advance(ctx, &mut state, SessionState::FormLocated, cancel)?;

        // ========== FORM_LOCATED → FORM_FILLED ==========
        self.fill_form(page, &controls, request, ctx).await?;
        advance(ctx, &mut state, SessionState::FormFilled, cancel)?;

        // ========== FORM_FILLED → CHALLENGE_CHECKED → CHALLENGE_SOLVED ==========
        let has_challenge = page
            .contains_any_text(&self.settings.challenge_markers)
            .await
            .map_err(WorkflowError::browser)?;
        if has_challenge {
            advance(ctx, &mut state, SessionState::ChallengeChecked, cancel)?;
            info!("{} 🔐 检测到验证码", ctx);
            self.solve_challenge(page, ctx).await?;
            advance(ctx, &mut state, SessionState::ChallengeSolved, cancel)?;
        } else {
            debug!("{} 页面没有验证码", ctx);
        }

        // ========== → SUBMITTED ==========
        self.submit(page, &controls.submit, ctx).await?;
        advance(ctx, &mut state, SessionState::Submitted, cancel)?;

        // ========== → RESULTS_AWAITED ==========
        let table_html = self.await_results_table(page, ctx, cancel).await?;
        advance(ctx, &mut state, SessionState::ResultsAwaited, cancel)?;

        // ========== → RESULTS_PARSED ==========
        let base_url = page.current_url().await.ok().flatten();
        let records = self.extractor.parse(&table_html, base_url.as_deref());
        if records.is_empty() {
            warn!("{} ⚠️ 结果表格中没有有效行", ctx);
            return Err(WorkflowError::NoResultsParsed);
        }
        advance(ctx, &mut state, SessionState::ResultsParsed, cancel)?;

        info!("{} ✓ 解析到 {} 条记录", ctx, records.len());
        Ok(records)
    }

    async fn open(&self, page: &dyn PageDriver, ctx: &SearchCtx) -> WorkflowResult<()> {
        info!("{} 🌐 打开查询页: {}", ctx, self.settings.target_url);
        page.navigate(&self.settings.target_url)
            .await
            .map_err(|e| WorkflowError::TransientNetworkFailure {
                url: self.settings.target_url.clone(),
                cause: e.to_string(),
            })?;
        tokio::time::sleep(self.settings.page_load_delay).await;
        Ok(())
    }

    async fn locate_form(
        &self,
        page: &dyn PageDriver,
        ctx: &SearchCtx,
    ) -> WorkflowResult<FormControls> {
        debug!("{} 定位表单控件", ctx);
        Ok(FormControls {
            case_type: resolve_field(page, &self.locators, fields::CASE_TYPE).await?,
            case_number: resolve_field(page, &self.locators, fields::CASE_NUMBER).await?,
            filing_year: resolve_field(page, &self.locators, fields::FILING_YEAR).await?,
            submit: resolve_field(page, &self.locators, fields::SUBMIT).await?,
        })
    }

    /// 原样填写，不做格式归一化
    async fn fill_form(
        &self,
        page: &dyn PageDriver,
        controls: &FormControls,
        request: &SearchRequest,
        ctx: &SearchCtx,
    ) -> WorkflowResult<()> {
        page.select_by_text(&controls.case_type.step, request.case_type())
            .await
            .map_err(|e| fill_error(fields::CASE_TYPE, e))?;
        debug!("{} 已选择案件类型: {}", ctx, request.case_type());

        page.fill(&controls.case_number.step, request.case_number(), false)
            .await
            .map_err(|e| fill_error(fields::CASE_NUMBER, e))?;
        debug!("{} 已填写案号: {}", ctx, request.case_number());

        page.fill(&controls.filing_year.step, request.filing_year(), false)
            .await
            .map_err(|e| fill_error(fields::FILING_YEAR, e))?;
        debug!("{} 已填写年份: {}", ctx, request.filing_year());

        Ok(())
    }

    async fn solve_challenge(&self, page: &dyn PageDriver, ctx: &SearchCtx) -> WorkflowResult<()> {
        let solved = self.pipeline.solve(page, &self.locators).await?;

        match &solved.answer {
            ChallengeAnswer::Text(text) => {
                let input = resolve_field(page, &self.locators, fields::CHALLENGE_INPUT).await?;
                page.fill(&input.step, text, true)
                    .await
                    .map_err(|e| fill_error(fields::CHALLENGE_INPUT, e))?;
                info!(
                    "{} ✓ 已填写验证码（来源: {}，{} 个字符）",
                    ctx,
                    solved.source,
                    text.chars().count()
                );
            }
            ChallengeAnswer::HumanAttested => {
                info!("{} ✓ 验证码已由人工完成", ctx);
            }
        }
        Ok(())
    }

    /// 脚本点击 → 原生点击 → 页面上任意提交按钮
    async fn submit(
        &self,
        page: &dyn PageDriver,
        submit: &ResolvedControl,
        ctx: &SearchCtx,
    ) -> WorkflowResult<()> {
        let mut attempts = Vec::new();

        let scripted = async {
            page.scroll_into_view(&submit.step).await?;
            tokio::time::sleep(self.settings.submit_scroll_delay).await;
            page.click_scripted(&submit.step).await
        };
        match scripted.await {
            Ok(()) => {
                info!("{} 📤 已提交（脚本点击 {}）", ctx, submit.step);
                return Ok(());
            }
            Err(e) => attempts.push(format!("脚本点击 {}: {}", submit.step, e)),
        }

        match page.click_native(&submit.step).await {
            Ok(()) => {
                info!("{} 📤 已提交（原生点击 {}）", ctx, submit.step);
                return Ok(());
            }
            Err(e) => attempts.push(format!("原生点击 {}: {}", submit.step, e)),
        }

        match resolve_field(page, &self.locators, fields::SUBMIT_ANY).await {
            Ok(any) => match page.click_scripted(&any.step).await {
                Ok(()) => {
                    info!("{} 📤 已提交（任意提交按钮 {}）", ctx, any.step);
                    return Ok(());
                }
                Err(e) => attempts.push(format!("任意提交按钮 {}: {}", any.step, e)),
            },
            Err(e) => attempts.push(format!("任意提交按钮: {}", e)),
        }

        warn!("{} ❌ 所有提交方式均失败", ctx);
        Err(WorkflowError::SubmissionFailed { attempts })
    }

    /// 固定等待后轮询结果表格，期限内没有出现即 `NoResultsTable`
    async fn await_results_table(
        &self,
        page: &dyn PageDriver,
        ctx: &SearchCtx,
        cancel: &watch::Receiver<bool>,
    ) -> WorkflowResult<String> {
        tokio::time::sleep(self.settings.settle_delay).await;
        let deadline = Instant::now() + self.settings.results_deadline;

        loop {
            checkpoint(cancel, SessionState::Submitted)?;

            match page.first_table_html().await {
                Ok(Some(html)) => {
                    debug!("{} 结果表格已出现 ({} 字节)", ctx, html.len());
                    return Ok(html);
                }
                Ok(None) => {}
                Err(e) => debug!("{} 查询结果表格出错: {}", ctx, e),
            }

            if Instant::now() >= deadline {
                warn!("{} ⚠️ 提交后没有出现结果表格", ctx);
                return Err(WorkflowError::NoResultsTable);
            }
            tokio::time::sleep(self.settings.poll_interval).await;
        }
    }
}

fn fill_error(field: &str, err: anyhow::Error) -> WorkflowError {
    WorkflowError::FormFill {
        field: field.to_string(),
        cause: err.to_string(),
    }
}

/// 取消检查后进入下一状态
fn advance(
    ctx: &SearchCtx,
    state: &mut SessionState,
    next: SessionState,
    cancel: &watch::Receiver<bool>,
) -> WorkflowResult<()> {
    checkpoint(cancel, *state)?;
    debug!("{} {} → {}", ctx, state, next);
    *state = next;
    Ok(())
}
