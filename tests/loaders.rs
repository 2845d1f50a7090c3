//! Loader tests over real on-disk fixtures: plain text, Markdown, a
//! hand-built DOCX archive, and a minimal hand-built PDF.

use std::io::Write;
use tempfile::TempDir;

use docqa::loader;

/// Minimal DOCX (ZIP) containing `word/document.xml` with the given text.
fn minimal_docx_with_text(phrase: &str) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        zip.start_file(
            "word/document.xml",
            zip::write::SimpleFileOptions::default(),
        )
        .unwrap();
        let xml = format!(
            "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body><w:p><w:r><w:t>{}</w:t></w:r></w:p></w:body></w:document>",
            phrase
        );
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap();
    }
    buf
}

/// Minimal valid PDF containing the text "pdf fixture phrase".
/// Builds the body then an xref with correct byte offsets so pdf-extract
/// can parse it.
fn minimal_pdf_with_phrase() -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let o1 = out.len();
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    let o2 = out.len();
    out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
    let o3 = out.len();
    out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
    let o4 = out.len();
    out.extend_from_slice(b"4 0 obj << /Length 46 >> stream\nBT /F1 12 Tf 100 700 Td (pdf fixture phrase) Tj ET\nendstream endobj\n");
    let o5 = out.len();
    out.extend_from_slice(
        b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
    );
    let xref_start = out.len();
    out.extend_from_slice(b"xref\n0 6\n");
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    out.extend_from_slice(format!("{:010} 00000 n \n", o1).as_bytes());
    out.extend_from_slice(format!("{:010} 00000 n \n", o2).as_bytes());
    out.extend_from_slice(format!("{:010} 00000 n \n", o3).as_bytes());
    out.extend_from_slice(format!("{:010} 00000 n \n", o4).as_bytes());
    out.extend_from_slice(format!("{:010} 00000 n \n", o5).as_bytes());
    out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
    out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}

#[test]
fn loads_plain_text_and_markdown() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("notes.txt"), "plain text notes").unwrap();
    std::fs::write(tmp.path().join("guide.md"), "# Guide\n\nmarkdown body").unwrap();

    let docs = loader::load_documents(tmp.path());
    assert_eq!(docs.len(), 2);

    let txt = docs
        .iter()
        .find(|d| d.path.ends_with("notes.txt"))
        .unwrap();
    assert_eq!(txt.text, "plain text notes");

    let md = docs.iter().find(|d| d.path.ends_with("guide.md")).unwrap();
    assert!(md.text.contains("markdown body"));
}

#[test]
fn loads_docx_text_runs() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("memo.docx");
    std::fs::write(&path, minimal_docx_with_text("docx fixture phrase")).unwrap();

    let text = loader::load_file(&path).unwrap();
    assert_eq!(text, "docx fixture phrase");
}

#[test]
fn loads_minimal_pdf() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("report.pdf");
    std::fs::write(&path, minimal_pdf_with_phrase()).unwrap();

    let text = loader::load_file(&path).unwrap();
    assert!(
        text.contains("pdf fixture phrase"),
        "extracted text was: {:?}",
        text
    );
}

#[test]
fn corrupt_file_is_skipped_without_failing_the_batch() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("good.txt"), "still loads").unwrap();
    std::fs::write(tmp.path().join("bad.docx"), b"this is not a zip archive").unwrap();

    let docs = loader::load_documents(tmp.path());
    assert_eq!(docs.len(), 1);
    assert!(docs[0].path.ends_with("good.txt"));
}

#[test]
fn unsupported_files_are_not_loaded() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("data.csv"), "a,b,c").unwrap();
    std::fs::write(tmp.path().join("image.png"), [0x89, 0x50, 0x4e, 0x47]).unwrap();

    let docs = loader::load_documents(tmp.path());
    assert!(docs.is_empty());
}
