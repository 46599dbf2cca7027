//! 结果表格解析
//!
//! 跳过第一行（表头），之后每一行至少要有 5 个单元格：
//! 序号、案号（可带链接）、裁判日期（可带链接）、当事人、更正说明。
//! 单元格不足的行直接跳过，不算错误。
//!
//! 只取最外层表格自己的行，以及每行直接的 `td` 子元素。单元格里嵌套的表格
//! 算作该单元格的内容，不会产生额外的行，也不会把后面的列挤偏。

use scraper::{ElementRef, Html, Node};
use tracing::debug;

use crate::models::CaseRecord;

const MIN_CELLS: usize = 5;

#[derive(Debug, Clone, Copy, Default)]
pub struct ResultExtractor;

impl ResultExtractor {
    pub fn new() -> Self {
        Self
    }

    /// 解析表格 HTML，`base_url` 用于把单元格中的相对链接转为绝对地址
    ///
    /// 本身不会失败；空结果由调用方决定如何处理。
    pub fn parse(&self, table_html: &str, base_url: Option<&str>) -> Vec<CaseRecord> {
        let fragment = Html::parse_fragment(table_html);
        let rows = own_rows(fragment.root_element());

        let mut records = Vec::new();
        for (index, row) in rows.iter().enumerate().skip(1) {
            let cells: Vec<ElementRef> = row
                .children()
                .filter_map(ElementRef::wrap)
                .filter(|e| e.value().name() == "td")
                .collect();

            if cells.len() < MIN_CELLS {
                debug!("跳过第 {} 行: 只有 {} 个单元格", index, cells.len());
                continue;
            }

            records.push(CaseRecord {
                sequence_no: cell_text(cells[0]),
                case_number_display: cell_text(cells[1]),
                case_number_link: cell_link(cells[1], base_url),
                order_date_display: cell_text(cells[2]),
                order_date_link: cell_link(cells[2], base_url),
                parties: cell_text(cells[3]),
                corrigendum_note: cell_text(cells[4]),
                pdf_artifact_name: None,
            });
        }

        debug!("表格共 {} 行，解析出 {} 条记录", rows.len(), records.len());
        records
    }
}

/// 最外层表格的行；没有 `table` 元素时取全部行
fn own_rows(root: ElementRef) -> Vec<ElementRef> {
    let all_rows = root
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|e| e.value().name() == "tr");

    let Some(table) = root
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|e| e.value().name() == "table")
    else {
        return all_rows.collect();
    };

    all_rows
        .filter(|row| {
            row.ancestors()
                .find(|n| n.value().as_element().is_some_and(|e| e.name() == "table"))
                .map(|n| n.id())
                == Some(table.id())
        })
        .collect()
}

/// 可见文本：`<br>` 和块级元素换行，行内空白折叠，去掉空行
fn cell_text(cell: ElementRef) -> String {
    let mut raw = String::new();
    for node in cell.descendants() {
        match node.value() {
            Node::Text(text) => raw.push_str(text),
            Node::Element(e) if matches!(e.name(), "br" | "p" | "div" | "li" | "tr" | "td") => {
                raw.push('\n')
            }
            _ => {}
        }
    }

    raw.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// 单元格中第一个链接
fn cell_link(cell: ElementRef, base_url: Option<&str>) -> Option<String> {
    let href = cell
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|e| e.value().name() == "a")
        .and_then(|a| a.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty())?;

    let resolved = base_url
        .and_then(|base| reqwest::Url::parse(base).ok())
        .and_then(|base| base.join(href).ok())
        .map(|url| url.to_string());
    Some(resolved.unwrap_or_else(|| href.to_string()))
}
