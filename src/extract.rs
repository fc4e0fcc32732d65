//! Text extraction from files on disk, chosen by extension.
//!
//! | Kind | Extensions | How |
//! |------|------------|-----|
//! | plain | txt, md, csv, json, html, … | UTF-8 (lossy) |
//! | PDF | pdf | `pdf-extract` |
//! | OOXML | docx, pptx | `zip` + `quick-xml`, text runs only |
//! | none | anything else (images, …) | [`ExtractError::Unsupported`] |

use quick_xml::events::Event;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

/// Upper bound on a decompressed XML part (zip-bomb guard).
const MAX_XML_PART_BYTES: u64 = 50 * 1024 * 1024;

const PLAIN_TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "markdown", "rst", "csv", "tsv", "json", "xml", "html", "htm", "log", "yaml",
    "yml", "toml",
];

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("no text extractor for .{0} files")]
    Unsupported(String),
    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("OOXML extraction failed: {0}")]
    Ooxml(String),
}

/// Read `path` and return its plain text.
pub fn extract_file(path: &Path) -> Result<String, ExtractError> {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    if PLAIN_TEXT_EXTENSIONS.contains(&ext.as_str()) {
        let bytes = std::fs::read(path)?;
        return Ok(String::from_utf8_lossy(&bytes).into_owned());
    }

    match ext.as_str() {
        "pdf" => {
            let bytes = std::fs::read(path)?;
            pdf_extract::extract_text_from_mem(&bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
        }
        "docx" => {
            let bytes = std::fs::read(path)?;
            let mut archive = open_zip(&bytes)?;
            let xml = read_part(&mut archive, "word/document.xml")?;
            collect_text_runs(&xml, " ")
        }
        "pptx" => {
            let bytes = std::fs::read(path)?;
            extract_pptx(&bytes)
        }
        other => Err(ExtractError::Unsupported(other.to_string())),
    }
}

type Zip<'a> = zip::ZipArchive<std::io::Cursor<&'a [u8]>>;

fn open_zip(bytes: &[u8]) -> Result<Zip<'_>, ExtractError> {
    zip::ZipArchive::new(std::io::Cursor::new(bytes)).map_err(|e| ExtractError::Ooxml(e.to_string()))
}

fn read_part(archive: &mut Zip<'_>, name: &str) -> Result<Vec<u8>, ExtractError> {
    let part = archive
        .by_name(name)
        .map_err(|e| ExtractError::Ooxml(format!("{}: {}", name, e)))?;
    let mut out = Vec::new();
    part.take(MAX_XML_PART_BYTES).read_to_end(&mut out)?;
    if out.len() as u64 >= MAX_XML_PART_BYTES {
        return Err(ExtractError::Ooxml(format!("{} exceeds size limit", name)));
    }
    Ok(out)
}

fn extract_pptx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = open_zip(bytes)?;
    let mut slides: Vec<(u32, String)> = archive
        .file_names()
        .filter_map(|n| {
            let num = n
                .strip_prefix("ppt/slides/slide")?
                .strip_suffix(".xml")?
                .parse::<u32>()
                .ok()?;
            Some((num, n.to_string()))
        })
        .collect();
    slides.sort();

    let mut texts = Vec::with_capacity(slides.len());
    for (_, name) in slides {
        let xml = read_part(&mut archive, &name)?;
        let text = collect_text_runs(&xml, " ")?;
        if !text.is_empty() {
            texts.push(text);
        }
    }
    Ok(texts.join("\n\n"))
}

/// Concatenate the contents of every `<*:t>` element (Word `w:t`,
/// DrawingML `a:t`).
fn collect_text_runs(xml: &[u8], sep: &str) -> Result<String, ExtractError> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut runs: Vec<String> = Vec::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::End(e)) if e.local_name().as_ref() == b"t" => in_text = false,
            Ok(Event::Text(t)) if in_text => {
                let text = t
                    .unescape()
                    .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
                runs.push(text.into_owned());
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(runs.join(sep))
}
