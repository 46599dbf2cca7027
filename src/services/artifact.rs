//! PDF 结果文件 - 业务能力层
//!
//! 只负责"把一条记录写成 PDF"以及把它读回来，不关心流程

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream, StringFormat};
use tracing::{debug, info};

use crate::models::{CaseRecord, SearchRequest};

const TITLE: &str = "Delhi High Court Case Result";

// A4，单位 pt
const PAGE_WIDTH: i64 = 595;
const PAGE_HEIGHT: i64 = 842;
const MARGIN: i64 = 56;
const LINE_HEIGHT: i64 = 16;
/// Helvetica 10pt 下一行大约能放下的字符数
const WRAP_COLUMNS: usize = 90;

// 文档信息字典中记录字段的键
const KEY_SEQUENCE_NO: &[u8] = b"CaseSequenceNo";
const KEY_CASE_NUMBER: &[u8] = b"CaseNumber";
const KEY_CASE_NUMBER_LINK: &[u8] = b"CaseNumberLink";
const KEY_ORDER_DATE: &[u8] = b"OrderDate";
const KEY_ORDER_DATE_LINK: &[u8] = b"OrderDateLink";
const KEY_PARTIES: &[u8] = b"Parties";
const KEY_CORRIGENDUM: &[u8] = b"Corrigendum";

/// 结果文件渲染
#[async_trait]
pub trait ArtifactRenderer: Send + Sync {
    /// 渲染一条记录，返回文件名（相对于输出目录）
    async fn render(&self, record: &CaseRecord, request: &SearchRequest) -> Result<String>;
}

/// 写入 `downloads_dir/{案件类型}_{案号}_{年份}.pdf`
pub struct PdfArtifactWriter {
    downloads_dir: PathBuf,
}

impl PdfArtifactWriter {
    pub fn new(downloads_dir: impl Into<PathBuf>) -> Self {
        Self {
            downloads_dir: downloads_dir.into(),
        }
    }

    pub fn downloads_dir(&self) -> &Path {
        &self.downloads_dir
    }

    /// 文件名中只保留字母数字和 `.`、`-`、`_`
    pub fn file_name(request: &SearchRequest) -> String {
        let raw = format!(
            "{}_{}_{}",
            request.case_type(),
            request.case_number(),
            request.filing_year()
        );
        let sanitized: String = raw
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        format!("{}.pdf", sanitized)
    }
}

#[async_trait]
impl ArtifactRenderer for PdfArtifactWriter {
    async fn render(&self, record: &CaseRecord, request: &SearchRequest) -> Result<String> {
        let file_name = Self::file_name(request);
        let path = self.downloads_dir.join(&file_name);
        let downloads_dir = self.downloads_dir.clone();
        let record = record.clone();

        // 建目录和写文件都是阻塞 IO
        let path = tokio::task::spawn_blocking(move || -> Result<PathBuf> {
            std::fs::create_dir_all(&downloads_dir)
                .with_context(|| format!("创建输出目录失败: {}", downloads_dir.display()))?;
            let mut doc = build_document(&record)?;
            doc.save(&path)
                .with_context(|| format!("保存 PDF 失败: {}", path.display()))?;
            Ok(path)
        })
        .await
        .context("PDF 写入任务被中断")??;

        info!("📄 已生成 PDF: {}", path.display());
        Ok(file_name)
    }
}

/// 页面上的文本行，与记录字段一一对应
fn layout_lines(record: &CaseRecord) -> Vec<String> {
    let mut lines = vec![
        format!("S.No.: {}", record.sequence_no),
        format!("Case No.: {}", record.case_number_display),
    ];
    if let Some(link) = &record.case_number_link {
        lines.push(format!("Case Link: {}", link));
    }
    lines.push(format!("Date of Judgment/Order: {}", record.order_date_display));
    if let Some(link) = &record.order_date_link {
        lines.push(format!("Date Link: {}", link));
    }

    let party = format!("Party: {}", record.parties.replace('\n', " "));
    lines.extend(wrap(&party, WRAP_COLUMNS));

    lines.push(format!("Corrigendum: {}", record.corrigendum_note));
    lines
}

fn wrap(text: &str, columns: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > columns {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// 标准字体只覆盖 Latin-1，其余字符用 `?` 代替（原文保存在文档信息字典里）
fn latin1(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| if (c as u32) < 256 { c as u8 } else { b'?' })
        .collect()
}

fn text_at(font_size: i64, x: i64, y: i64, text: &str) -> Vec<Operation> {
    vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), font_size.into()]),
        Operation::new("Td", vec![x.into(), y.into()]),
        Operation::new("Tj", vec![Object::String(latin1(text), StringFormat::Literal)]),
        Operation::new("ET", vec![]),
    ]
}

fn hex_string(value: &str) -> Object {
    Object::String(value.as_bytes().to_vec(), StringFormat::Hexadecimal)
}

/// 一行文字及其纵坐标
type PlacedLine = (i64, String);

/// 按页切分，每行都不低于下边距
fn paginate(lines: Vec<String>) -> Vec<Vec<PlacedLine>> {
    let top = PAGE_HEIGHT - MARGIN;
    let mut pages = Vec::new();
    let mut current = Vec::new();
    // 第一页留出标题的位置
    let mut y = top - LINE_HEIGHT * 2;

    for line in lines {
        if y < MARGIN {
            pages.push(std::mem::take(&mut current));
            y = top;
        }
        current.push((y, line));
        y -= LINE_HEIGHT;
    }
    pages.push(current);
    pages
}

fn build_document(record: &CaseRecord) -> Result<Document> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for (index, placed) in paginate(layout_lines(record)).into_iter().enumerate() {
        let mut operations = Vec::new();
        if index == 0 {
            // 标题粗略居中
            let title_x = (PAGE_WIDTH - (TITLE.len() as i64) * 7) / 2;
            operations.extend(text_at(14, title_x, PAGE_HEIGHT - MARGIN, TITLE));
        }
        for (y, line) in placed {
            operations.extend(text_at(10, MARGIN, y, &line));
        }

        let content = Content { operations };
        let encoded = content.encode().context("编码 PDF 内容失败")?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let pages = dictionary! {
        "Type" => "Pages",
        "Count" => kids.len() as i64,
        "Kids" => kids,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut info = Dictionary::new();
    info.set("Title", Object::string_literal(TITLE));
    info.set(KEY_SEQUENCE_NO, hex_string(&record.sequence_no));
    info.set(KEY_CASE_NUMBER, hex_string(&record.case_number_display));
    info.set(KEY_ORDER_DATE, hex_string(&record.order_date_display));
    info.set(KEY_PARTIES, hex_string(&record.parties));
    info.set(KEY_CORRIGENDUM, hex_string(&record.corrigendum_note));
    if let Some(link) = &record.case_number_link {
        info.set(KEY_CASE_NUMBER_LINK, hex_string(link));
    }
    if let Some(link) = &record.order_date_link {
        info.set(KEY_ORDER_DATE_LINK, hex_string(link));
    }
    let info_id = doc.add_object(info);
    doc.trailer.set("Info", info_id);

    Ok(doc)
}

/// 读回 [`PdfArtifactWriter`] 写入的记录
pub fn read_artifact(path: &Path) -> Result<CaseRecord> {
    debug!("读取 PDF: {}", path.display());
    let doc = Document::load(path).with_context(|| format!("打开 PDF 失败: {}", path.display()))?;

    let info_id = doc
        .trailer
        .get(b"Info")
        .and_then(Object::as_reference)
        .context("PDF 缺少文档信息字典")?;
    let info = doc
        .get_object(info_id)
        .and_then(Object::as_dict)
        .context("文档信息字典格式错误")?;

    let required = |key: &[u8]| -> Result<String> {
        optional(info, key)?.with_context(|| {
            format!("文档信息字典缺少 {}", String::from_utf8_lossy(key))
        })
    };

    Ok(CaseRecord {
        sequence_no: required(KEY_SEQUENCE_NO)?,
        case_number_display: required(KEY_CASE_NUMBER)?,
        case_number_link: optional(info, KEY_CASE_NUMBER_LINK)?,
        order_date_display: required(KEY_ORDER_DATE)?,
        order_date_link: optional(info, KEY_ORDER_DATE_LINK)?,
        parties: required(KEY_PARTIES)?,
        corrigendum_note: required(KEY_CORRIGENDUM)?,
        pdf_artifact_name: path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned()),
    })
}

fn optional(info: &Dictionary, key: &[u8]) -> Result<Option<String>> {
    let Ok(value) = info.get(key) else {
        return Ok(None);
    };
    let bytes = value
        .as_str()
        .with_context(|| format!("{} 不是字符串", String::from_utf8_lossy(key)))?;
    Ok(Some(String::from_utf8(bytes.to_vec())?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_sanitized() {
        let request = SearchRequest::new("W.P.(C)", "101", "2020");
        assert_eq!(PdfArtifactWriter::file_name(&request), "W.P._C__101_2020.pdf");
    }

    #[test]
    fn test_layout_optional_links() {
        let record = CaseRecord {
            sequence_no: "1".into(),
            case_number_display: "W.P.(C) 101/2020".into(),
            order_date_display: "12/03/2021".into(),
            order_date_link: Some("https://example.org/o.pdf".into()),
            parties: "A\nVS.\nB".into(),
            ..Default::default()
        };
        let lines = layout_lines(&record);
        assert!(lines.iter().all(|l| !l.starts_with("Case Link:")));
        assert!(lines.contains(&"Date Link: https://example.org/o.pdf".to_string()));
        assert!(lines.contains(&"Party: A VS. B".to_string()));
        assert_eq!(lines.last().map(String::as_str), Some("Corrigendum: "));
    }

    #[test]
    fn test_long_parties_spill_onto_more_pages() {
        let record = CaseRecord {
            sequence_no: "1".into(),
            case_number_display: "W.P.(C) 101/2020".into(),
            order_date_display: "12/03/2021".into(),
            parties: "PETITIONER ".repeat(2000),
            ..Default::default()
        };

        let pages = paginate(layout_lines(&record));
        assert!(pages.len() > 1);
        assert!(pages.iter().flatten().all(|(y, _)| *y >= MARGIN));
        let placed: usize = pages.iter().map(Vec::len).sum();
        assert_eq!(placed, layout_lines(&record).len());

        let doc = build_document(&record).unwrap();
        assert_eq!(doc.get_pages().len(), pages.len());
    }

    #[test]
    fn test_short_record_fits_one_page() {
        let lines = vec!["S.No.: 1".to_string(), "Corrigendum: ".to_string()];
        let pages = paginate(lines);
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0][0].0, PAGE_HEIGHT - MARGIN - LINE_HEIGHT * 2);
    }

    #[tokio::test]
    async fn test_render_long_record_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let writer = PdfArtifactWriter::new(dir.path().join("downloads"));
        let record = CaseRecord {
            sequence_no: "1".into(),
            case_number_display: "W.P.(C) 101/2020".into(),
            order_date_display: "12/03/2021".into(),
            parties: "ACME LTD. VS. UNION OF INDIA ".repeat(300),
            ..Default::default()
        };
        let request = SearchRequest::new("W.P.(C)", "101", "2020");

        let name = writer.render(&record, &request).await.unwrap();
        let path = writer.downloads_dir().join(&name);
        let doc = Document::load(&path).unwrap();
        assert!(doc.get_pages().len() > 1);

        let back = read_artifact(&path).unwrap();
        assert_eq!(back.parties, record.parties);
    }

    #[test]
    fn test_wrap_long_party_line() {
        let long = "word ".repeat(50);
        let lines = wrap(&long, 20);
        assert!(lines.len() > 1);
        assert!(lines.iter().all(|l| l.chars().count() <= 20));
    }
}
