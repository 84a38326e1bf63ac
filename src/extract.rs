//! Text extraction from uploaded document bytes.
//!
//! Converts plain text, Markdown, PDF, and Word uploads into text for the
//! document workflow. Formats are selected by the declared MIME type or the
//! file extension — never by sniffing — and each format family is one method
//! on the injectable [`TextExtractor`] capability.

use crate::error::WorkflowError;

/// Maximum extracted text length (100KB). Analysis prompts stay manageable;
/// anything longer is cut at a UTF-8 boundary.
const MAX_EXTRACT_BYTES: usize = 100_000;

/// Supported upload formats, detected from declared MIME type / extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// .txt, .md — read as UTF-8
    PlainText,
    /// .pdf
    Pdf,
    /// .doc, .docx
    Word,
    /// Everything else (images, spreadsheets, archives, ...)
    Unsupported,
}

/// Detect the document format from the declared MIME type, falling back to
/// the file extension.
pub fn detect_format(filename: &str, mime: &str) -> DocumentFormat {
    match mime {
        "text/plain" | "text/markdown" => return DocumentFormat::PlainText,
        "application/pdf" => return DocumentFormat::Pdf,
        "application/msword"
        | "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
            return DocumentFormat::Word
        }
        _ => {}
    }

    let ext = std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    match ext.as_str() {
        "txt" | "md" | "markdown" => DocumentFormat::PlainText,
        "pdf" => DocumentFormat::Pdf,
        "doc" | "docx" => DocumentFormat::Word,
        _ => DocumentFormat::Unsupported,
    }
}

/// One method per supported format family. The orchestrator never touches a
/// concrete parsing library directly.
pub trait TextExtractor: Send + Sync {
    fn plain_text(&self, data: &[u8]) -> Result<String, String>;
    fn pdf(&self, data: &[u8]) -> Result<String, String>;
    fn word(&self, data: &[u8]) -> Result<String, String>;
}

/// Extract text from an upload, dispatching on the declared format.
///
/// Failures surface as [`WorkflowError::Extraction`] naming the offending
/// file.
pub fn extract_text(
    extractor: &dyn TextExtractor,
    filename: &str,
    mime: &str,
    data: &[u8],
) -> Result<String, WorkflowError> {
    let result = match detect_format(filename, mime) {
        DocumentFormat::PlainText => extractor.plain_text(data),
        DocumentFormat::Pdf => extractor.pdf(data),
        DocumentFormat::Word => extractor.word(data),
        DocumentFormat::Unsupported => Err(format!(
            "unsupported file type '{}'. Please upload a .txt, .md, .doc, .docx, or .pdf file",
            if mime.is_empty() { "unknown" } else { mime }
        )),
    };

    result
        .map(|text| truncate_text(&text, MAX_EXTRACT_BYTES))
        .map_err(|detail| WorkflowError::Extraction {
            filename: filename.to_string(),
            detail,
        })
}

/// Built-in extractor: UTF-8 for plain text, `pdf-extract` for PDF, and a
/// `<w:t>` walk of `word/document.xml` for DOCX.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeExtractor;

impl TextExtractor for NativeExtractor {
    fn plain_text(&self, data: &[u8]) -> Result<String, String> {
        // Tolerate non-UTF-8 bytes rather than failing the whole workflow.
        Ok(String::from_utf8_lossy(data).into_owned())
    }

    fn pdf(&self, data: &[u8]) -> Result<String, String> {
        // pdf-extract can panic on malformed PDFs — wrap in catch_unwind
        let owned = data.to_vec();
        let result = std::panic::catch_unwind(move || pdf_extract::extract_text_from_mem(&owned));

        match result {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => Err(format!("PDF: {}", e)),
            Err(_) => Err("PDF extraction panicked (malformed file)".to_string()),
        }
    }

    fn word(&self, data: &[u8]) -> Result<String, String> {
        // DOCX = ZIP archive containing word/document.xml
        // Walk <w:t> tags to extract text runs. Legacy binary .doc files are
        // not ZIP archives and fail here with the corrupt-file message.
        let cursor = std::io::Cursor::new(data);
        let mut archive = zip::ZipArchive::new(cursor).map_err(|_| {
            "not a Word archive. The file might be corrupt, password-protected, or a legacy .doc"
                .to_string()
        })?;

        let doc = archive
            .by_name("word/document.xml")
            .map_err(|e| format!("Word archive missing document.xml: {}", e))?;

        let mut reader = quick_xml::Reader::from_reader(std::io::BufReader::new(doc));
        let mut buf = Vec::new();
        let mut text = String::new();
        let mut in_text_tag = false;
        let mut in_paragraph = false;

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(quick_xml::events::Event::Start(ref e))
                | Ok(quick_xml::events::Event::Empty(ref e)) => {
                    let local = e.local_name();
                    if local.as_ref() == b"t" {
                        in_text_tag = true;
                    } else if local.as_ref() == b"p" {
                        if in_paragraph && !text.ends_with('\n') {
                            text.push('\n');
                        }
                        in_paragraph = true;
                    }
                }
                Ok(quick_xml::events::Event::End(ref e)) => {
                    if e.local_name().as_ref() == b"t" {
                        in_text_tag = false;
                    } else if e.local_name().as_ref() == b"p" {
                        in_paragraph = false;
                    }
                }
                Ok(quick_xml::events::Event::Text(ref e)) => {
                    if in_text_tag {
                        if let Ok(s) = e.unescape() {
                            text.push_str(&s);
                        }
                    }
                }
                Ok(quick_xml::events::Event::Eof) => break,
                Err(e) => return Err(format!("Word document XML: {}", e)),
                _ => {}
            }
            buf.clear();
        }

        Ok(text)
    }
}

/// Truncate text at a safe UTF-8 boundary.
fn truncate_text(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }

    let mut end = max_bytes;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    let mut result = text[..end].to_string();
    result.push_str("\n\n[... content truncated at 100KB ...]");
    result
}
