//! # Court Fetch
//!
//! 德里高等法院案件状态查询：自动填写查询表单、处理验证码、解析结果表格
//!
//! ## 架构设计
//!
//! 本系统沿用四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（Page），只暴露能力
//! - `JsExecutor` - 唯一的 page owner，提供 eval() 能力
//! - `PageDriver` - 页面能力接口，`ChromePage` 是它的浏览器实现
//! - `browser/` - 启动或连接浏览器，一次查询一个会话
//!
//! ### ② 业务能力层（Services）
//! - `locator/` - 按有序策略列表定位控件
//! - `challenge/` - 四级验证码管线（直接读取 → 音频 → OCR → 人工）
//! - `services/` - 表格解析、PDF 输出、SQLite 记录、调试文件
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一次查询"的状态机
//! - `SearchCtx` - 上下文封装（query_id + 请求摘要）
//! - `CaseFlow` - 流程编排（定位 → 填写 → 验证码 → 提交 → 解析）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/case_fetcher` - 会话生命周期、记录、调试文件、批量并发
//!
//! ## 模块结构

pub mod browser;
pub mod challenge;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod locator;
pub mod logger;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::{Config, ManualChallengeMode};
pub use error::{ConfigError, WorkflowError, WorkflowResult};
pub use infrastructure::{JsExecutor, PageDriver};
pub use models::{CaseRecord, CaseTypeCatalog, FailureStage, SearchRequest, WorkflowOutcome};
pub use orchestrator::CaseFetcher;
pub use workflow::{CaseFlow, FlowSettings, SearchCtx, SessionState};
