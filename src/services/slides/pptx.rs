use std::collections::HashMap;
use std::io::{Cursor, Read, Seek};

use once_cell::sync::Lazy;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::Regex;
use tracing::debug;

use super::SlideSource;
use crate::core::future::BoxFuture;
use crate::services::errors::ExtractionError;

const PRESENTATION_PART: &str = "ppt/presentation.xml";
const PRESENTATION_RELS_PART: &str = "ppt/_rels/presentation.xml.rels";
/// Soft line break (`a:br`) inside a paragraph.
const LINE_BREAK: char = '\u{b}';

static SLIDE_PART_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^ppt/slides/slide(\d+)\.xml$").expect("valid slide part regex"));

/// Reads `.pptx` documents from the local file system.
#[derive(Debug, Clone, Default)]
pub struct PptxSlideSource;

impl SlideSource for PptxSlideSource {
    fn extract<'a>(
        &'a self,
        document_ref: &'a str,
    ) -> BoxFuture<'a, Result<Vec<String>, ExtractionError>> {
        Box::pin(async move {
            let data = tokio::fs::read(document_ref).await.map_err(|err| {
                if err.kind() == std::io::ErrorKind::NotFound {
                    ExtractionError::NotFound(document_ref.to_string())
                } else {
                    ExtractionError::Unreadable(format!("{document_ref}: {err}"))
                }
            })?;

            tokio::task::spawn_blocking(move || extract_slide_texts(&data))
                .await
                .map_err(|err| ExtractionError::Unreadable(format!("parser task failed: {err}")))?
        })
    }
}

/// Text of every slide, in presentation order. Each slide's text is the
/// concatenation of its text runs in document order, with `a:br` kept as a
/// vertical tab.
pub fn extract_slide_texts(data: &[u8]) -> Result<Vec<String>, ExtractionError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(data))
        .map_err(|err| ExtractionError::Malformed(format!("not a zip package: {err}")))?;

    let presentation = read_part(&mut archive, PRESENTATION_PART)?.ok_or_else(|| {
        ExtractionError::Malformed(format!("missing {PRESENTATION_PART}"))
    })?;

    let parts = match ordered_slide_parts(&mut archive, &presentation)? {
        Some(parts) => parts,
        None => {
            debug!("[PPTX] slide relationships unresolved, falling back to part numbering");
            numbered_slide_parts(&archive)
        }
    };

    let mut slides = Vec::with_capacity(parts.len());
    for part in parts {
        let xml = read_part(&mut archive, &part)?
            .ok_or_else(|| ExtractionError::Malformed(format!("missing slide part {part}")))?;
        slides.push(slide_text(&xml)?);
    }
    Ok(slides)
}

fn read_part<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
    name: &str,
) -> Result<Option<String>, ExtractionError> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(err) => return Err(ExtractionError::Malformed(format!("{name}: {err}"))),
    };
    let mut xml = String::new();
    file.read_to_string(&mut xml)
        .map_err(|err| ExtractionError::Malformed(format!("{name}: {err}")))?;
    Ok(Some(xml))
}

fn attribute(e: &BytesStart<'_>, key: &str) -> Option<String> {
    e.try_get_attribute(key)
        .ok()
        .flatten()
        .and_then(|attr| attr.unescape_value().ok().map(|v| v.into_owned()))
}

/// Slide parts as listed by `p:sldIdLst`. `None` when the list cannot be
/// resolved through the presentation relationships.
fn ordered_slide_parts<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
    presentation_xml: &str,
) -> Result<Option<Vec<String>>, ExtractionError> {
    let mut rel_ids = Vec::new();
    let mut reader = Reader::from_str(presentation_xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.local_name().as_ref() == b"sldId" => {
                match attribute(&e, "r:id") {
                    Some(id) => rel_ids.push(id),
                    None => return Ok(None),
                }
            }
            Ok(Event::Eof) => break,
            Err(err) => {
                return Err(ExtractionError::Malformed(format!(
                    "{PRESENTATION_PART}: {err}"
                )))
            }
            _ => {}
        }
        buf.clear();
    }
    if rel_ids.is_empty() {
        return Ok(Some(Vec::new()));
    }

    let Some(rels_xml) = read_part(archive, PRESENTATION_RELS_PART)? else {
        return Ok(None);
    };
    let mut targets = HashMap::new();
    let mut reader = Reader::from_str(&rels_xml);
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e))
                if e.local_name().as_ref() == b"Relationship" =>
            {
                if let (Some(id), Some(target)) = (attribute(&e, "Id"), attribute(&e, "Target")) {
                    targets.insert(id, target);
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => return Ok(None),
            _ => {}
        }
        buf.clear();
    }

    let mut parts = Vec::with_capacity(rel_ids.len());
    for id in rel_ids {
        let Some(target) = targets.get(&id) else {
            return Ok(None);
        };
        parts.push(match target.strip_prefix('/') {
            Some(absolute) => absolute.to_string(),
            None => format!("ppt/{target}"),
        });
    }
    Ok(Some(parts))
}

fn numbered_slide_parts<R: Read + Seek>(archive: &zip::ZipArchive<R>) -> Vec<String> {
    let mut numbered: Vec<(u32, String)> = archive
        .file_names()
        .filter_map(|name| {
            let number = SLIDE_PART_RE.captures(name)?.get(1)?.as_str().parse().ok()?;
            Some((number, name.to_string()))
        })
        .collect();
    numbered.sort_by_key(|(number, _)| *number);
    numbered.into_iter().map(|(_, name)| name).collect()
}

fn slide_text(xml: &str) -> Result<String, ExtractionError> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut depth_in_run = 0usize;
    let mut out = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.name().as_ref() == b"a:t" => depth_in_run += 1,
            Ok(Event::End(e)) if e.name().as_ref() == b"a:t" => {
                depth_in_run = depth_in_run.saturating_sub(1)
            }
            Ok(Event::Empty(e)) | Ok(Event::Start(e)) if e.name().as_ref() == b"a:br" => {
                out.push(LINE_BREAK)
            }
            Ok(Event::Text(e)) if depth_in_run > 0 => {
                let text = e
                    .unescape()
                    .map_err(|err| ExtractionError::Malformed(format!("slide text: {err}")))?;
                out.push_str(&text);
            }
            Ok(Event::CData(e)) if depth_in_run > 0 => {
                out.push_str(&String::from_utf8_lossy(&e.into_inner()));
            }
            Ok(Event::Eof) => break,
            Err(err) => return Err(ExtractionError::Malformed(format!("slide xml: {err}"))),
            _ => {}
        }
        buf.clear();
    }

    Ok(out)
}
