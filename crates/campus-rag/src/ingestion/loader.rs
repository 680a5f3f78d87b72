//! Multi-format document loader
//!
//! Dispatch is purely by extension through [`FileType`]. Each format maps to one
//! extractor in [`extractor_for`]; anything unrecognized goes to the generic
//! text extractor.

use calamine::Reader;
use std::path::Path;

use crate::error::{Error, Result};
use crate::types::document::{Document, FileType, SOURCE_PATH_KEY};

/// Signature shared by every extractor
pub type Extractor = fn(&Path, &[u8]) -> Result<Vec<Document>>;

/// Bytes inspected when deciding whether an unknown file is text
const BINARY_SNIFF_LEN: usize = 8192;

/// Local file header of a ZIP archive, the container of OOXML documents
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// Seconds allowed for pdf-extract before switching to the lopdf fallback
const PDF_EXTRACT_TIMEOUT_SECS: u64 = 60;

/// Static format table
pub fn extractor_for(file_type: FileType) -> Extractor {
    match file_type {
        FileType::Pdf => extract_pdf,
        FileType::Docx => extract_docx,
        FileType::Doc => extract_doc,
        FileType::Xlsx => extract_workbook,
        FileType::Html => extract_html,
        FileType::Other => extract_text,
    }
}

/// Loads files into [`Document`]s
pub struct DocumentLoader;

impl DocumentLoader {
    /// Read and extract a file; errors carry the path
    pub fn load(path: &Path) -> Result<Vec<Document>> {
        let data = std::fs::read(path).map_err(|e| Error::file_parse(path, e.to_string()))?;
        Self::load_bytes(path, &data)
    }

    /// Extract already-read bytes, dispatching on the extension of `path`
    pub fn load_bytes(path: &Path, data: &[u8]) -> Result<Vec<Document>> {
        let file_type = FileType::from_path(path);
        let extract = extractor_for(file_type);

        let docs = extract(path, data).map_err(|e| match e {
            Error::FileParse { .. } => e,
            other => Error::file_parse(path, other.to_string()),
        })?;

        let source = path.display().to_string();
        Ok(docs
            .into_iter()
            .map(|doc| {
                doc.with_metadata(SOURCE_PATH_KEY, source.clone())
                    .with_metadata("file_type", file_type.as_str())
            })
            .collect())
    }
}

/// PDF: pdf-extract in a worker thread, lopdf page-by-page on failure or timeout
fn extract_pdf(path: &Path, data: &[u8]) -> Result<Vec<Document>> {
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    let owned = data.to_vec();
    let (tx, rx) = mpsc::channel();

    // pdf-extract can panic or spin on unusual fonts; a panic drops the sender
    thread::spawn(move || {
        let _ = tx.send(pdf_extract::extract_text_from_mem(&owned));
    });

    match rx.recv_timeout(Duration::from_secs(PDF_EXTRACT_TIMEOUT_SECS)) {
        Ok(Ok(text)) if !text.trim().is_empty() => Ok(vec![Document::new(text)]),
        Ok(Ok(_)) => {
            tracing::debug!("pdf-extract returned no text for {}, trying lopdf", path.display());
            extract_pdf_pages(path, data)
        }
        Ok(Err(e)) => {
            tracing::warn!("pdf-extract failed on {}: {}, trying lopdf", path.display(), e);
            extract_pdf_pages(path, data)
        }
        Err(mpsc::RecvTimeoutError::Timeout) => {
            tracing::error!(
                "pdf-extract timed out after {}s on {}, trying lopdf",
                PDF_EXTRACT_TIMEOUT_SECS,
                path.display()
            );
            extract_pdf_pages(path, data)
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            tracing::error!("pdf-extract crashed on {}, trying lopdf", path.display());
            extract_pdf_pages(path, data)
        }
    }
}

/// One document per page with a `page` field
fn extract_pdf_pages(path: &Path, data: &[u8]) -> Result<Vec<Document>> {
    let doc = lopdf::Document::load_mem(data)
        .map_err(|e| Error::file_parse(path, format!("invalid PDF: {}", e)))?;

    let mut docs = Vec::new();
    for page_number in doc.get_pages().into_keys() {
        match doc.extract_text(&[page_number]) {
            Ok(text) if !text.trim().is_empty() => {
                docs.push(Document::new(text).with_metadata("page", page_number));
            }
            Ok(_) => {}
            Err(e) => tracing::debug!("no text on page {} of {}: {}", page_number, path.display(), e),
        }
    }

    if docs.is_empty() {
        return Err(Error::file_parse(
            path,
            "PDF has no extractable text (image-only or encrypted)",
        ));
    }
    Ok(docs)
}

/// Word documents: paragraph text and table cells, in document order
fn extract_docx(path: &Path, data: &[u8]) -> Result<Vec<Document>> {
    use docx_rs::{DocumentChild, TableChild};

    let docx = docx_rs::read_docx(data).map_err(|e| Error::file_parse(path, e.to_string()))?;

    let mut content = String::new();
    for child in &docx.document.children {
        match child {
            DocumentChild::Paragraph(p) => {
                content.push_str(&paragraph_text(p));
                content.push('\n');
            }
            DocumentChild::Table(table) => {
                for row in &table.rows {
                    #[allow(irrefutable_let_patterns)]
                    let TableChild::TableRow(row) = row else {
                        continue;
                    };
                    let cells: Vec<String> = row.cells.iter().map(table_cell_text).collect();
                    content.push_str(&cells.join(" | "));
                    content.push('\n');
                }
            }
            _ => {}
        }
    }

    Ok(vec![Document::new(content)])
}

/// Word 97-2003 from the OLE container; OOXML saved under a `.doc` name goes to docx-rs
fn extract_doc(path: &Path, data: &[u8]) -> Result<Vec<Document>> {
    if data.starts_with(ZIP_MAGIC) {
        return extract_docx(path, data);
    }
    let text = super::word97::extract_text(data)
        .map_err(|e| Error::file_parse(path, format!("not a readable Word 97 document: {}", e)))?;
    Ok(vec![Document::new(text)])
}

#[allow(irrefutable_let_patterns)]
fn table_cell_text(cell: &docx_rs::TableRowChild) -> String {
    let docx_rs::TableRowChild::TableCell(cell) = cell else {
        return String::new();
    };
    cell.children
        .iter()
        .filter_map(|c| match c {
            docx_rs::TableCellContent::Paragraph(p) => Some(paragraph_text(p)),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn paragraph_text(p: &docx_rs::Paragraph) -> String {
    let mut text = String::new();
    for child in &p.children {
        if let docx_rs::ParagraphChild::Run(run) = child {
            for run_child in &run.children {
                if let docx_rs::RunChild::Text(t) = run_child {
                    text.push_str(&t.text);
                }
            }
        }
    }
    text
}

/// Spreadsheets: one document per non-empty sheet
fn extract_workbook(path: &Path, data: &[u8]) -> Result<Vec<Document>> {
    let cursor = std::io::Cursor::new(data);
    let mut workbook = calamine::open_workbook_auto_from_rs(cursor)
        .map_err(|e| Error::file_parse(path, e.to_string()))?;

    let mut docs = Vec::new();
    for sheet_name in workbook.sheet_names().to_vec() {
        let range = match workbook.worksheet_range(&sheet_name) {
            Ok(range) => range,
            Err(e) => {
                tracing::debug!("skipping sheet {} of {}: {}", sheet_name, path.display(), e);
                continue;
            }
        };

        let mut sheet_text = String::new();
        for row in range.rows() {
            let cells: Vec<String> = row
                .iter()
                .map(|cell| match cell {
                    calamine::Data::Empty => String::new(),
                    calamine::Data::String(s) => s.clone(),
                    calamine::Data::Float(f) => f.to_string(),
                    calamine::Data::Int(i) => i.to_string(),
                    calamine::Data::Bool(b) => b.to_string(),
                    calamine::Data::DateTime(dt) => dt.to_string(),
                    _ => String::new(),
                })
                .collect();

            if cells.iter().any(|c| !c.is_empty()) {
                sheet_text.push_str(&cells.join(" | "));
                sheet_text.push('\n');
            }
        }

        if !sheet_text.is_empty() {
            docs.push(Document::new(sheet_text).with_metadata("sheet", sheet_name));
        }
    }

    Ok(docs)
}

/// HTML: visible body text
fn extract_html(path: &Path, data: &[u8]) -> Result<Vec<Document>> {
    let html = String::from_utf8_lossy(data);
    let document = scraper::Html::parse_document(&html);
    let body = scraper::Selector::parse("body")
        .map_err(|e| Error::file_parse(path, format!("selector: {:?}", e)))?;

    let mut content = String::new();
    for element in document.select(&body) {
        for text in element.text() {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                content.push_str(trimmed);
                content.push('\n');
            }
        }
    }

    Ok(vec![Document::new(content)])
}

/// Fallback for unrecognized extensions: lossy UTF-8, binary data rejected
fn extract_text(path: &Path, data: &[u8]) -> Result<Vec<Document>> {
    let head = &data[..data.len().min(BINARY_SNIFF_LEN)];
    if head.contains(&0) {
        let ext = path.extension().map(|e| e.to_string_lossy().into_owned()).unwrap_or_default();
        return Err(Error::UnsupportedFileType(format!("{} (binary content)", ext)));
    }
    Ok(vec![Document::new(String::from_utf8_lossy(data).into_owned())])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_table() {
        let cases: [(&str, Extractor); 11] = [
            ("a.pdf", extract_pdf),
            ("a.PDF", extract_pdf),
            ("a.docx", extract_docx),
            ("a.doc", extract_doc),
            ("a.xlsx", extract_workbook),
            ("a.xls", extract_workbook),
            ("a.html", extract_html),
            ("a.htm", extract_html),
            ("a.txt", extract_text),
            ("a.md", extract_text),
            ("noext", extract_text),
        ];
        for (name, expected) in cases {
            let actual = extractor_for(FileType::from_path(Path::new(name)));
            assert_eq!(actual as usize, expected as usize, "wrong extractor for {}", name);
        }
    }

    #[test]
    fn test_unknown_extension_reads_text() {
        let docs = DocumentLoader::load_bytes(Path::new("notes.md"), "# 校园卡\n补办流程".as_bytes())
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert!(docs[0].content.contains("补办流程"));
        assert_eq!(docs[0].source_path(), Some("notes.md"));
        assert_eq!(docs[0].metadata["file_type"], "other");
    }

    #[test]
    fn test_binary_rejected() {
        let err = DocumentLoader::load_bytes(Path::new("blob.bin"), &[0x7f, 0x45, 0x00, 0x01])
            .unwrap_err();
        assert!(matches!(err, Error::FileParse { .. }));
        assert!(err.to_string().contains("Unsupported file type: bin"));
    }

    #[test]
    fn test_html_body_text() {
        let html = b"<html><head><title>t</title></head><body><h1>\xe5\x9b\xbe\xe4\xb9\xa6\xe9\xa6\x86</h1><p>8:00</p></body></html>";
        let docs = DocumentLoader::load_bytes(Path::new("page.html"), html).unwrap();
        assert_eq!(docs[0].content, "图书馆\n8:00\n");
    }

    #[test]
    fn test_corrupt_pdf_reports_path() {
        let err = DocumentLoader::load_bytes(Path::new("数据集/竞赛相关/坏.pdf"), b"not a pdf")
            .unwrap_err();
        assert!(err.to_string().contains("坏.pdf"));
    }

    #[test]
    fn test_corrupt_docx_reports_path() {
        let err = DocumentLoader::load_bytes(Path::new("x/坏.docx"), b"garbage").unwrap_err();
        match err {
            Error::FileParse { path, .. } => assert_eq!(path, Path::new("x/坏.docx")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_word97_doc() {
        let data = super::super::word97::fixture(&[("期末考试\r第十六周周三\r", false)]);
        let docs = DocumentLoader::load_bytes(Path::new("课程/期末.doc"), &data).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].content, "期末考试\n第十六周周三\n");
        assert_eq!(docs[0].metadata["file_type"], "doc");
    }

    #[test]
    fn test_doc_with_zip_bytes_uses_docx_reader() {
        let err = DocumentLoader::load_bytes(Path::new("课程/期末.doc"), b"PK\x03\x04broken").unwrap_err();
        assert!(!err.to_string().contains("Word 97"));

        let err = DocumentLoader::load_bytes(Path::new("课程/期末.doc"), b"garbage").unwrap_err();
        assert!(err.to_string().contains("Word 97"));
    }

    #[test]
    fn test_missing_file() {
        let err = DocumentLoader::load(Path::new("/definitely/not/here.pdf")).unwrap_err();
        assert!(matches!(err, Error::FileParse { .. }));
    }
}
