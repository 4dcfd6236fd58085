//! Attachment extraction from arbitrary backend payload shapes.
//!
//! The backend attaches files to messages, join responses, and bare file
//! events under different keys depending on version: a singular `file`, a
//! plural `files`, either of those inside a `data`/`payload` wrapper, or the
//! payload itself being the file record. All shapes funnel through
//! [`normalize`] into canonical [`Attachment`] values.

use serde_json::Value;

use crate::models::{Attachment, AttachmentContent};

const SINGULAR_KEYS: &[&str] = &["file", "archivo", "adjunto"];
const PLURAL_KEYS: &[&str] = &["files", "archivos", "adjuntos"];
const WRAPPER_KEYS: &[&str] = &["data", "payload", "mensaje", "message"];

const NAME_KEYS: &[&str] = &["name", "filename", "file_name", "nombre", "originalName"];
const MIME_KEYS: &[&str] = &["mimeType", "mime_type", "mime", "contentType", "content_type", "tipo"];
const SIZE_KEYS: &[&str] = &["size", "sizeBytes", "size_bytes", "tamano", "length"];
const BASE64_KEYS: &[&str] = &["base64", "contenido", "content", "data"];
const URL_KEYS: &[&str] = &["url", "ruta", "href", "downloadUrl"];
const ID_KEYS: &[&str] = &["id", "id_archivo", "fileId", "attachmentId"];
const DATE_KEYS: &[&str] = &["createdAt", "created_at", "fecha"];

/// Extract attachment records from `payload`.
///
/// Returns `None` (not an empty vec) when nothing file-like is found, so
/// callers can distinguish "no attachment" from "attachment with zero
/// entries". Duplicate ids within one call are collapsed.
pub fn normalize(payload: &Value) -> Option<Vec<Attachment>> {
    let mut found: Vec<Attachment> = Vec::new();
    let mut any_file_field = false;

    collect_from(payload, &mut found, &mut any_file_field);

    // One level of nesting: some backends wrap the interesting part.
    if let Value::Object(map) = payload {
        for key in WRAPPER_KEYS {
            if let Some(inner) = map.get(*key) {
                collect_from(inner, &mut found, &mut any_file_field);
            }
        }
    }

    // The payload itself may be a bare file record (bare file events).
    if !any_file_field {
        if let Some(att) = parse_record(payload) {
            found.push(att);
            any_file_field = true;
        }
    }

    if !any_file_field {
        return None;
    }

    // Dedupe by id, keeping first occurrence.
    let mut seen = std::collections::HashSet::new();
    found.retain(|a| seen.insert(a.id.clone()));
    Some(found)
}

fn collect_from(value: &Value, out: &mut Vec<Attachment>, any: &mut bool) {
    let Value::Object(map) = value else { return };

    for key in SINGULAR_KEYS {
        if let Some(v) = map.get(*key) {
            *any = true;
            if let Some(att) = parse_record(v) {
                out.push(att);
            }
        }
    }
    for key in PLURAL_KEYS {
        if let Some(Value::Array(items)) = map.get(*key) {
            *any = true;
            out.extend(items.iter().filter_map(parse_record));
        }
    }
}

/// Whether a value structurally resembles a file record: it has a
/// file-name-like, mime-like, or content-like field.
fn looks_like_file(map: &serde_json::Map<String, Value>) -> bool {
    NAME_KEYS.iter().any(|k| map.contains_key(*k))
        || MIME_KEYS.iter().any(|k| map.contains_key(*k))
        || URL_KEYS.iter().any(|k| map.contains_key(*k))
        || map.keys().any(|k| k == "base64" || k == "contenido")
}

fn parse_record(value: &Value) -> Option<Attachment> {
    let Value::Object(map) = value else {
        return None;
    };
    if !looks_like_file(map) {
        return None;
    }

    let name = first_string(map, NAME_KEYS).unwrap_or_else(|| "file".to_string());
    let mime_type =
        first_string(map, MIME_KEYS).unwrap_or_else(|| "application/octet-stream".to_string());
    let size_bytes = first_u64(map, SIZE_KEYS).unwrap_or(0);
    let created_at = first_string(map, DATE_KEYS);

    let content = if let Some(url) = first_string(map, URL_KEYS) {
        AttachmentContent::Url(url)
    } else if let Some(b64) = BASE64_KEYS
        .iter()
        .find_map(|k| map.get(*k).and_then(Value::as_str))
        .filter(|s| !s.is_empty())
    {
        AttachmentContent::Inline(b64.to_string())
    } else {
        return None;
    };

    let id = first_string(map, ID_KEYS)
        .unwrap_or_else(|| format!("{}:{}", name, size_bytes));

    Some(Attachment {
        id,
        name,
        mime_type,
        size_bytes,
        created_at,
        content,
    })
}

fn first_string(map: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| map.get(*k).and_then(Value::as_str))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn first_u64(map: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<u64> {
    keys.iter().find_map(|k| {
        let v = map.get(*k)?;
        v.as_u64()
            .or_else(|| v.as_str().and_then(|s| s.parse().ok()))
    })
}
