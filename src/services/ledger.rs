//! 查询记录 - 业务能力层
//!
//! 每次查询开始前写一行 `queries`，结束时更新状态；成功时在 `responses` 里保存主记录。
//! 这是并发请求之间唯一共享的状态，所有写入经同一把锁串行化。

use std::fmt::Display;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tracing::debug;

use crate::models::{CaseRecord, SearchRequest};

/// 查询状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryStatus {
    Pending,
    Success,
    Failed,
}

impl QueryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            QueryStatus::Pending => "pending",
            QueryStatus::Success => "success",
            QueryStatus::Failed => "failed",
        }
    }
}

impl Display for QueryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 持久化协作者
#[async_trait]
pub trait QueryLedger: Send + Sync {
    /// 自动化开始前调用一次，返回查询 ID
    async fn begin(&self, request: &SearchRequest) -> Result<i64>;

    /// 更新最终状态
    async fn complete(
        &self,
        query_id: i64,
        status: QueryStatus,
        error_message: Option<&str>,
    ) -> Result<()>;

    /// 保存主记录和页面快照
    async fn record(
        &self,
        query_id: i64,
        primary: &CaseRecord,
        raw_page_snapshot: Option<&str>,
    ) -> Result<()>;
}

/// 历史记录中的一行
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub case_type: String,
    pub case_number: String,
    pub filing_year: String,
    pub status: String,
    pub queried_at: String,
    pub case_number_display: Option<String>,
    pub parties: Option<String>,
}

/// 查询统计
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerStats {
    pub total_queries: i64,
    pub successful_queries: i64,
    pub failed_queries: i64,
    /// 百分比
    pub success_rate: f64,
    /// 最常查询的五种案件类型
    pub top_case_types: Vec<(String, i64)>,
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS queries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    case_type TEXT NOT NULL,
    case_number TEXT NOT NULL,
    filing_year TEXT NOT NULL,
    query_timestamp DATETIME DEFAULT CURRENT_TIMESTAMP,
    status TEXT DEFAULT 'pending',
    error_message TEXT
);
CREATE TABLE IF NOT EXISTS responses (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    query_id INTEGER,
    sno TEXT,
    case_no TEXT,
    case_no_link TEXT,
    date TEXT,
    date_link TEXT,
    party TEXT,
    corrigendum TEXT,
    pdf_filename TEXT,
    raw_response TEXT,
    response_timestamp DATETIME DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY (query_id) REFERENCES queries (id)
);
";

/// SQLite 实现
#[derive(Clone)]
pub struct SqliteLedger {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteLedger {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("打开数据库失败: {}", path.display()))?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA).context("初始化数据库表失败")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 在阻塞线程上持锁执行
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| anyhow::anyhow!("数据库连接锁已中毒"))?;
            f(&guard)
        })
        .await
        .context("数据库任务被中断")?
    }

    /// 最近的查询，连同主记录
    pub async fn history(&self, limit: usize) -> Result<Vec<HistoryEntry>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT q.case_type, q.case_number, q.filing_year, q.status,
                        q.query_timestamp, r.case_no, r.party
                 FROM queries q
                 LEFT JOIN responses r ON q.id = r.query_id
                 ORDER BY q.query_timestamp DESC, q.id DESC
                 LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit], |row| {
                Ok(HistoryEntry {
                    case_type: row.get(0)?,
                    case_number: row.get(1)?,
                    filing_year: row.get(2)?,
                    status: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                    queried_at: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                    case_number_display: row.get(5)?,
                    parties: row.get(6)?,
                })
            })?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
    }

    pub async fn stats(&self) -> Result<LedgerStats> {
        self.with_conn(|conn| {
            let count = |sql: &str| -> rusqlite::Result<i64> { conn.query_row(sql, [], |r| r.get(0)) };
            let total_queries = count("SELECT COUNT(*) FROM queries")?;
            let successful_queries = count("SELECT COUNT(*) FROM queries WHERE status = 'success'")?;
            let failed_queries = count("SELECT COUNT(*) FROM queries WHERE status = 'failed'")?;

            let mut stmt = conn.prepare(
                "SELECT case_type, COUNT(*) AS count
                 FROM queries
                 GROUP BY case_type
                 ORDER BY count DESC, case_type ASC
                 LIMIT 5",
            )?;
            let top_case_types = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let success_rate = if total_queries > 0 {
                successful_queries as f64 / total_queries as f64 * 100.0
            } else {
                0.0
            };

            Ok(LedgerStats {
                total_queries,
                successful_queries,
                failed_queries,
                success_rate,
                top_case_types,
            })
        })
        .await
    }

    /// 查询当前状态和错误信息
    pub async fn status_of(&self, query_id: i64) -> Result<Option<(String, Option<String>)>> {
        self.with_conn(move |conn| {
            Ok(conn
                .query_row(
                    "SELECT status, error_message FROM queries WHERE id = ?1",
                    params![query_id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?)
        })
        .await
    }
}

#[async_trait]
impl QueryLedger for SqliteLedger {
    async fn begin(&self, request: &SearchRequest) -> Result<i64> {
        let request = request.clone();
        let id = self
            .with_conn(move |conn| {
                conn.execute(
                    "INSERT INTO queries (case_type, case_number, filing_year) VALUES (?1, ?2, ?3)",
                    params![request.case_type(), request.case_number(), request.filing_year()],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;
        debug!("查询已登记: #{}", id);
        Ok(id)
    }

    async fn complete(
        &self,
        query_id: i64,
        status: QueryStatus,
        error_message: Option<&str>,
    ) -> Result<()> {
        let error_message = error_message.map(str::to_string);
        self.with_conn(move |conn| {
            match error_message {
                Some(message) => conn.execute(
                    "UPDATE queries SET status = ?1, error_message = ?2 WHERE id = ?3",
                    params![status.as_str(), message, query_id],
                )?,
                None => conn.execute(
                    "UPDATE queries SET status = ?1 WHERE id = ?2",
                    params![status.as_str(), query_id],
                )?,
            };
            Ok(())
        })
        .await
    }

    async fn record(
        &self,
        query_id: i64,
        primary: &CaseRecord,
        raw_page_snapshot: Option<&str>,
    ) -> Result<()> {
        let primary = primary.clone();
        let raw = raw_page_snapshot.map(str::to_string);
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO responses (
                    query_id, sno, case_no, case_no_link, date, date_link,
                    party, corrigendum, pdf_filename, raw_response
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    query_id,
                    primary.sequence_no,
                    primary.case_number_display,
                    primary.case_number_link,
                    primary.order_date_display,
                    primary.order_date_link,
                    primary.parties,
                    primary.corrigendum_note,
                    primary.pdf_artifact_name,
                    raw,
                ],
            )?;
            Ok(())
        })
        .await
    }
}
