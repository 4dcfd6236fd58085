use serde_json::json;

use aula_client::models::AttachmentContent;
use aula_client::ws::normalize::normalize;

#[test]
fn singular_file_field() {
    let payload = json!({
        "file": {
            "id": "f1",
            "filename": "notas.pdf",
            "mimeType": "application/pdf",
            "size": 1234,
            "url": "https://files.test/notas.pdf"
        }
    });
    let atts = normalize(&payload).unwrap();
    assert_eq!(atts.len(), 1);
    assert_eq!(atts[0].name, "notas.pdf");
    assert_eq!(atts[0].size_bytes, 1234);
    assert_eq!(
        atts[0].content,
        AttachmentContent::Url("https://files.test/notas.pdf".into())
    );
}

#[test]
fn plural_files_field() {
    let payload = json!({
        "files": [
            {"id": "f1", "nombre": "a.png", "tipo": "image/png", "tamano": 10, "url": "u1"},
            {"id": "f2", "nombre": "b.png", "tipo": "image/png", "tamano": 20, "url": "u2"}
        ]
    });
    let atts = normalize(&payload).unwrap();
    assert_eq!(atts.len(), 2);
    assert_eq!(atts[1].mime_type, "image/png");
}

#[test]
fn nested_under_wrapper() {
    let payload = json!({
        "data": {
            "file": {"id": "f1", "filename": "x.ogg", "mime": "audio/ogg", "size": 99, "url": "u"}
        }
    });
    let atts = normalize(&payload).unwrap();
    assert_eq!(atts.len(), 1);
    assert_eq!(atts[0].mime_type, "audio/ogg");
}

#[test]
fn payload_itself_as_file_record() {
    let payload = json!({
        "filename": "voz.mp3",
        "contentType": "audio/mpeg",
        "size": "2048",
        "base64": "QUJD"
    });
    let atts = normalize(&payload).unwrap();
    assert_eq!(atts.len(), 1);
    assert_eq!(atts[0].size_bytes, 2048);
    assert_eq!(atts[0].content, AttachmentContent::Inline("QUJD".into()));
}

#[test]
fn dedupes_by_id_within_one_call() {
    let payload = json!({
        "file": {"id": "f1", "filename": "a.png", "mimeType": "image/png", "size": 10, "url": "u"},
        "files": [
            {"id": "f1", "filename": "a.png", "mimeType": "image/png", "size": 10, "url": "u"}
        ]
    });
    let atts = normalize(&payload).unwrap();
    assert_eq!(atts.len(), 1);
}

#[test]
fn none_when_nothing_file_like() {
    assert!(normalize(&json!({"content": "hola", "id_mensaje": "1"})).is_none());
    assert!(normalize(&json!("just a string")).is_none());
    assert!(normalize(&json!({})).is_none());
}

#[test]
fn file_field_with_unusable_record_is_some_empty() {
    // The file key exists, so this counts as "attachment present", but the
    // record has no content; callers see an empty list, not None.
    let payload = json!({"file": {"filename": "x", "mimeType": "text/plain"}});
    let atts = normalize(&payload);
    assert_eq!(atts, Some(vec![]));
}

#[test]
fn record_without_id_gets_stable_fallback() {
    let payload = json!({
        "file": {"filename": "a.png", "mimeType": "image/png", "size": 10, "url": "u"}
    });
    let atts = normalize(&payload).unwrap();
    assert_eq!(atts[0].id, "a.png:10");
}
