use crate::constants::*;

pub fn validate_message_content(content: &str) -> Result<(), String> {
    if content.trim().is_empty() {
        return Err("Message content is required".into());
    }
    if content.len() > MAX_MESSAGE_LENGTH {
        return Err(format!(
            "Message must be at most {} characters",
            MAX_MESSAGE_LENGTH
        ));
    }
    Ok(())
}

pub fn validate_room_code(code: &str) -> Result<(), String> {
    let trimmed = code.trim();
    if trimmed.is_empty() {
        return Err("Room code is required".into());
    }
    if trimmed.len() > MAX_ROOM_CODE_LENGTH {
        return Err(format!(
            "Room code must be at most {} characters",
            MAX_ROOM_CODE_LENGTH
        ));
    }
    // Room codes are lowercased student codes
    if !trimmed
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
    {
        return Err("Room code can only contain lowercase letters, numbers, hyphens, and underscores".into());
    }
    Ok(())
}

/// User-facing message for files rejected before upload. The name list is
/// truncated past `MAX_OVERSIZE_NAMES_SHOWN`.
pub fn oversize_message(names: &[String]) -> String {
    let limit_mb = MAX_UPLOAD_BYTES / 1_048_576;
    let shown: Vec<&str> = names
        .iter()
        .take(MAX_OVERSIZE_NAMES_SHOWN)
        .map(|s| s.as_str())
        .collect();
    let mut listed = shown.join(", ");
    if names.len() > MAX_OVERSIZE_NAMES_SHOWN {
        listed.push_str(&format!(" and {} more", names.len() - MAX_OVERSIZE_NAMES_SHOWN));
    }
    format!("File too large (max {} MB): {}", limit_mb, listed)
}
