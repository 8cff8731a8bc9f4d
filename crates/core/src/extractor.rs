use crate::error::IngestError;
use crate::models::Document;
use base64::{engine::general_purpose::STANDARD, Engine};
use lopdf::Document as PdfDocument;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::runtime::{Handle, RuntimeFlavor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Pdf,
    PlainText,
}

impl SourceFormat {
    pub fn from_name(name: &str) -> Option<Self> {
        let extension = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "pdf" => Some(Self::Pdf),
            "txt" | "md" => Some(Self::PlainText),
            _ => None,
        }
    }

    /// Format from the name, falling back to the `%PDF` magic for extensionless names.
    pub fn detect(name: &str, bytes: &[u8]) -> Result<Self, IngestError> {
        if let Some(format) = Self::from_name(name) {
            return Ok(format);
        }
        if Path::new(name).extension().is_none() {
            if bytes.starts_with(b"%PDF") {
                return Ok(Self::Pdf);
            }
            if std::str::from_utf8(bytes).is_ok() {
                return Ok(Self::PlainText);
            }
        }
        Err(IngestError::UnsupportedFormat(name.to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
struct LlmOcrRequest {
    pdf_base64: String,
    source_name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct LlmOcrResponse {
    pages: Option<Vec<LlmOcrPage>>,
    text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct LlmOcrPage {
    #[serde(default)]
    page: Option<u32>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OcrEndpointConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
}

pub trait PdfExtractor {
    fn extract_pages(&self, bytes: &[u8], source_name: &str) -> Result<Vec<PageText>, IngestError>;
}

#[derive(Default)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(&self, bytes: &[u8], source_name: &str) -> Result<Vec<PageText>, IngestError> {
        let document =
            PdfDocument::load_mem(bytes).map_err(|error| IngestError::PdfParse(error.to_string()))?;

        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            // A single unreadable page should not sink the whole file.
            let text = document.extract_text(&[page_no]).unwrap_or_default();

            if !text.trim().is_empty() {
                pages.push(PageText {
                    number: page_no,
                    text: text.trim().to_string(),
                });
            }
        }

        if pages.is_empty() {
            return Err(IngestError::PdfParse(format!(
                "pdf had no readable page text: {source_name}"
            )));
        }

        Ok(pages)
    }
}

/// Page texts for a PDF, using the remote OCR endpoint when local parsing yields nothing.
pub fn extract_pdf_pages(bytes: &[u8], source_name: &str) -> Result<Vec<PageText>, IngestError> {
    match LopdfExtractor.extract_pages(bytes, source_name) {
        Ok(pages) => Ok(pages),
        Err(IngestError::PdfParse(parse_error)) => match extract_with_llm_ocr(bytes, source_name) {
            Ok(Some(pages)) => Ok(pages),
            Ok(None) => Err(IngestError::PdfParse(parse_error)),
            Err(ocr_error) => Err(IngestError::PdfParse(format!(
                "{parse_error}; multimodal OCR fallback failed: {ocr_error}"
            ))),
        },
        Err(error) => Err(error),
    }
}

pub fn join_pages(pages: &[PageText]) -> String {
    pages
        .iter()
        .map(|page| format!("[Page {}]: {}\n", page.number, page.text))
        .collect()
}

/// Extracts a [`Document`] from raw bytes; `name` decides the format.
pub fn extract_bytes(name: &str, source: &str, bytes: &[u8]) -> Result<Document, IngestError> {
    let text = match SourceFormat::detect(name, bytes)? {
        SourceFormat::Pdf => join_pages(&extract_pdf_pages(bytes, name)?),
        SourceFormat::PlainText => String::from_utf8_lossy(bytes).into_owned(),
    };

    if text.trim().is_empty() {
        return Err(IngestError::EmptyDocument(name.to_string()));
    }

    Ok(Document::new(name, source, text))
}

pub fn extract_document(path: &Path) -> Result<Document, IngestError> {
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| IngestError::MissingFileName(path.display().to_string()))?;

    if SourceFormat::from_name(name).is_none() {
        return Err(IngestError::UnsupportedFormat(name.to_string()));
    }

    let bytes = std::fs::read(path)?;
    extract_bytes(name, &path.to_string_lossy(), &bytes)
}

fn parse_llm_ocr_config() -> Option<OcrEndpointConfig> {
    let endpoint = std::env::var("DOCQA_OCR_ENDPOINT").ok()?;
    let endpoint = endpoint.trim().to_string();
    if endpoint.is_empty() {
        return None;
    }

    let api_key = std::env::var("DOCQA_OCR_API_KEY").ok().and_then(|value| {
        let key = value.trim().to_string();
        if key.is_empty() {
            None
        } else {
            Some(key)
        }
    });

    Some(OcrEndpointConfig { endpoint, api_key })
}

fn extract_with_llm_ocr(bytes: &[u8], source_name: &str) -> Result<Option<Vec<PageText>>, IngestError> {
    let cfg = match parse_llm_ocr_config() {
        Some(cfg) => cfg,
        None => return Ok(None),
    };

    run_blocking(|| request_llm_ocr(&cfg, bytes, source_name))
}

/// Runs blocking `work` from any calling context. A multi-thread runtime
/// worker uses `block_in_place`; a current-thread runtime cannot, so the work
/// moves to a scoped OS thread.
fn run_blocking<T, F>(work: F) -> Result<T, IngestError>
where
    F: FnOnce() -> Result<T, IngestError> + Send,
    T: Send,
{
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(work)
        }
        Ok(_) => std::thread::scope(|scope| {
            scope.spawn(work).join().unwrap_or_else(|_| {
                Err(IngestError::OcrFailed("OCR worker thread panicked".to_string()))
            })
        }),
        Err(_) => work(),
    }
}

fn request_llm_ocr(
    cfg: &OcrEndpointConfig,
    bytes: &[u8],
    source_name: &str,
) -> Result<Option<Vec<PageText>>, IngestError> {
    let payload = LlmOcrRequest {
        pdf_base64: STANDARD.encode(bytes),
        source_name: source_name.to_string(),
    };

    let mut request = Client::new()
        .post(&cfg.endpoint)
        .header("content-type", "application/json")
        .json(&payload);

    if let Some(api_key) = &cfg.api_key {
        request = request.bearer_auth(api_key);
    }

    let response = request.send()?;

    if !response.status().is_success() {
        return Err(IngestError::OcrFailed(format!(
            "multimodal OCR request to {} returned {}",
            cfg.endpoint,
            response.status()
        )));
    }

    let payload: LlmOcrResponse = response.json()?;
    payload_to_pages(&payload, source_name).map(Some)
}

fn payload_to_pages(payload: &LlmOcrResponse, source_name: &str) -> Result<Vec<PageText>, IngestError> {
    if let Some(listed) = &payload.pages {
        let listed = listed
            .iter()
            .filter_map(|page| {
                let text = page.text.as_deref().map(str::trim).unwrap_or_default();
                if text.is_empty() {
                    None
                } else {
                    Some(PageText {
                        number: page.page.unwrap_or(1),
                        text: text.to_string(),
                    })
                }
            })
            .collect::<Vec<_>>();

        if !listed.is_empty() {
            return Ok(listed);
        }
    }

    if let Some(raw_text) = &payload.text {
        let pages = raw_text
            .split('\u{000c}')
            .enumerate()
            .filter_map(|(index, chunk)| {
                let normalized = chunk.trim();
                if normalized.is_empty() {
                    None
                } else {
                    Some(PageText {
                        number: (index + 1) as u32,
                        text: normalized.to_string(),
                    })
                }
            })
            .collect::<Vec<_>>();

        if !pages.is_empty() {
            return Ok(pages);
        }
    }

    Err(IngestError::OcrFailed(format!(
        "multimodal OCR response was empty for {source_name}"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn format_is_chosen_by_extension() {
        assert_eq!(SourceFormat::from_name("a.PDF"), Some(SourceFormat::Pdf));
        assert_eq!(SourceFormat::from_name("notes.md"), Some(SourceFormat::PlainText));
        assert_eq!(SourceFormat::from_name("notes.txt"), Some(SourceFormat::PlainText));
        assert_eq!(SourceFormat::from_name("sheet.xlsx"), None);
    }

    #[test]
    fn extensionless_names_are_sniffed() {
        assert_eq!(
            SourceFormat::detect("download", b"%PDF-1.4 ...").ok(),
            Some(SourceFormat::Pdf)
        );
        assert_eq!(
            SourceFormat::detect("download", b"plain words").ok(),
            Some(SourceFormat::PlainText)
        );
        assert!(SourceFormat::detect("image.png", b"\x89PNG").is_err());
    }

    #[test]
    fn text_files_are_read_verbatim() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("minutes.txt");
        fs::write(&path, "The committee met on Monday.\nBudget approved.")?;

        let document = extract_document(&path)?;
        assert_eq!(document.name, "minutes.txt");
        assert_eq!(document.text, "The committee met on Monday.\nBudget approved.");
        assert_eq!(document.checksum.len(), 64);
        Ok(())
    }

    #[test]
    fn whitespace_only_text_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("blank.md");
        fs::write(&path, "  \n\t ")?;

        let result = extract_document(&path);
        assert!(matches!(result, Err(IngestError::EmptyDocument(_))));
        Ok(())
    }

    #[test]
    fn unsupported_extension_is_rejected_before_reading() {
        let result = extract_document(Path::new("/nonexistent/report.docx"));
        assert!(matches!(result, Err(IngestError::UnsupportedFormat(_))));
    }

    #[test]
    fn broken_pdf_without_ocr_endpoint_is_a_parse_error() {
        let result = extract_bytes("broken.pdf", "broken.pdf", b"%PDF-1.4\n%broken");
        assert!(matches!(result, Err(IngestError::PdfParse(_))));
    }

    #[test]
    fn pages_are_joined_with_markers() {
        let pages = vec![
            PageText {
                number: 1,
                text: "Intro".to_string(),
            },
            PageText {
                number: 3,
                text: "Details".to_string(),
            },
        ];
        assert_eq!(join_pages(&pages), "[Page 1]: Intro\n[Page 3]: Details\n");
    }

    #[test]
    fn ocr_payload_with_pages_converts_only_nonempty_text() {
        let response = LlmOcrResponse {
            pages: Some(vec![
                LlmOcrPage {
                    page: Some(2),
                    text: Some("  ".to_string()),
                },
                LlmOcrPage {
                    page: Some(3),
                    text: Some("Page 3".to_string()),
                },
            ]),
            text: None,
        };

        let pages = payload_to_pages(&response, "x.pdf").expect("pages should be parsed");

        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].number, 3);
        assert_eq!(pages[0].text, "Page 3");
    }

    #[test]
    fn ocr_payload_fallback_text_split_by_form_feed() {
        let response = LlmOcrResponse {
            pages: None,
            text: Some("First\u{000C}Second\n".to_string()),
        };

        let pages = payload_to_pages(&response, "x.pdf").expect("text should be parsed");

        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1].number, 2);
        assert_eq!(pages[1].text, "Second");
    }

    #[test]
    fn empty_ocr_payload_is_an_error() {
        let response = LlmOcrResponse {
            pages: Some(Vec::new()),
            text: Some(" \u{000C} ".to_string()),
        };
        assert!(matches!(
            payload_to_pages(&response, "x.pdf"),
            Err(IngestError::OcrFailed(_))
        ));
    }

    #[test]
    fn blocking_work_runs_without_a_runtime() {
        let result = run_blocking(|| Ok::<_, IngestError>(7));
        assert_eq!(result.expect("work"), 7);
    }

    #[tokio::test]
    async fn blocking_work_runs_on_a_current_thread_runtime() {
        let result = run_blocking(|| Ok::<_, IngestError>("pages".to_string()));
        assert_eq!(result.expect("work"), "pages");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn blocking_work_runs_on_a_multi_thread_runtime() {
        let result = run_blocking(|| Ok::<_, IngestError>(vec![1, 2]));
        assert_eq!(result.expect("work"), vec![1, 2]);
    }

    #[tokio::test]
    async fn blocking_work_errors_are_returned() {
        let result: Result<(), IngestError> =
            run_blocking(|| Err(IngestError::OcrFailed("endpoint down".to_string())));
        assert!(matches!(result, Err(IngestError::OcrFailed(details)) if details == "endpoint down"));
    }
}
