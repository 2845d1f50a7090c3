//! Document loading for the supported file types (pdf, txt, md, docx).
//!
//! Plain-text formats are read directly; PDF goes through `pdf-extract`;
//! DOCX is unzipped and the `<w:t>` runs of `word/document.xml` are
//! concatenated. A file that fails to load is reported on stderr and
//! skipped; one bad file never aborts the batch.

use std::io::Read;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::hash_store;

/// Maximum decompressed bytes read from a single ZIP entry (zip-bomb guard).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// A loaded source document before chunking.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub path: PathBuf,
    pub text: String,
}

/// Extraction error. No panic: the loader returns the error and the caller
/// skips the file.
#[derive(Debug)]
pub enum LoadError {
    Io(std::io::Error),
    Pdf(String),
    Docx(String),
    Unsupported(String),
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::Io(e) => write!(f, "I/O error: {}", e),
            LoadError::Pdf(e) => write!(f, "PDF extraction failed: {}", e),
            LoadError::Docx(e) => write!(f, "DOCX extraction failed: {}", e),
            LoadError::Unsupported(ext) => write!(f, "unsupported file type: {}", ext),
        }
    }
}

impl std::error::Error for LoadError {}

impl From<std::io::Error> for LoadError {
    fn from(e: std::io::Error) -> Self {
        LoadError::Io(e)
    }
}

/// Walk `docs_dir` and load every supported file into a [`RawDocument`].
///
/// Load failures are printed as warnings and the file is skipped.
pub fn load_documents(docs_dir: &Path) -> Vec<RawDocument> {
    let mut docs = Vec::new();

    for entry in WalkDir::new(docs_dir).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if !hash_store::is_supported(path) {
            continue;
        }

        match load_file(path) {
            Ok(text) => docs.push(RawDocument {
                path: path.to_path_buf(),
                text,
            }),
            Err(e) => {
                eprintln!("Warning: skipping {}: {}", path.display(), e);
            }
        }
    }

    docs
}

/// Extract the text of a single file based on its extension.
pub fn load_file(path: &Path) -> Result<String, LoadError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "txt" | "md" => {
            let bytes = std::fs::read(path)?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }
        "pdf" => {
            let bytes = std::fs::read(path)?;
            extract_pdf(&bytes)
        }
        "docx" => {
            let bytes = std::fs::read(path)?;
            extract_docx(&bytes)
        }
        other => Err(LoadError::Unsupported(other.to_string())),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, LoadError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| LoadError::Pdf(e.to_string()))
}

fn extract_docx(bytes: &[u8]) -> Result<String, LoadError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| LoadError::Docx(e.to_string()))?;

    let mut doc_xml = Vec::new();
    let mut found = false;
    for i in 0..archive.len() {
        let entry = archive
            .by_index(i)
            .map_err(|e| LoadError::Docx(e.to_string()))?;
        if entry.name() == "word/document.xml" {
            entry
                .take(MAX_XML_ENTRY_BYTES)
                .read_to_end(&mut doc_xml)
                .map_err(|e| LoadError::Docx(e.to_string()))?;
            if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
                return Err(LoadError::Docx(
                    "word/document.xml exceeds size limit".to_string(),
                ));
            }
            found = true;
            break;
        }
    }
    if !found {
        return Err(LoadError::Docx("word/document.xml not found".to_string()));
    }

    extract_w_t_elements(&doc_xml)
}

fn extract_w_t_elements(xml: &[u8]) -> Result<String, LoadError> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    if let Ok(quick_xml::events::Event::Text(te)) = reader.read_event_into(&mut buf)
                    {
                        if !out.is_empty() {
                            out.push(' ');
                        }
                        out.push_str(te.unescape().unwrap_or_default().as_ref());
                    }
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(LoadError::Docx(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}
