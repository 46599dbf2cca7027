//! 查询上下文
//!
//! 封装"我正在处理哪一次查询"这一信息，只用于日志和调试文件

use std::fmt::Display;

/// 查询上下文
#[derive(Debug, Clone)]
pub struct SearchCtx {
    /// 记录表中的查询 ID（记录失败时为 `None`）
    pub query_id: Option<i64>,

    /// 批量查询中的序号（从 1 开始，仅用于日志显示）
    pub request_index: usize,

    /// 请求摘要，如 `W.P.(C) 101/2020`
    pub label: String,
}

impl SearchCtx {
    pub fn new(query_id: Option<i64>, request_index: usize, label: impl Into<String>) -> Self {
        Self {
            query_id,
            request_index,
            label: label.into(),
        }
    }

    /// 调试文件名后缀
    pub fn artifact_key(&self) -> String {
        match self.query_id {
            Some(id) => id.to_string(),
            None => format!("req{}", self.request_index),
        }
    }
}

impl Display for SearchCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.query_id {
            Some(id) => write!(f, "[查询 #{} {}]", id, self.label),
            None => write!(f, "[查询 {} {}]", self.request_index, self.label),
        }
    }
}
