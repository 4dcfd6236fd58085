use aula_shared::constants::{RECENT_UPLOAD_WINDOW_SECS, UPLOAD_SIZE_TOLERANCE_BYTES};
use chrono::{DateTime, Duration, Utc};

use crate::models::{Attachment, MimeCategory};

/// Shape of one uploaded batch: count, total size, and mime category.
/// Filenames are deliberately absent: servers rename uploads, so a name
/// comparison would break attribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadShape {
    pub count: usize,
    pub total_bytes: u64,
    pub category: MimeCategory,
}

impl UploadShape {
    pub fn of_attachments(attachments: &[Attachment]) -> Option<UploadShape> {
        if attachments.is_empty() {
            return None;
        }
        Some(UploadShape {
            count: attachments.len(),
            total_bytes: attachments.iter().map(|a| a.size_bytes).sum(),
            category: MimeCategory::of(&attachments[0].mime_type),
        })
    }

    /// Same count and category, sizes within tolerance of each other
    /// (the backend may re-encode, shifting the byte count slightly).
    pub fn matches(&self, other: &UploadShape) -> bool {
        if self.count != other.count || self.category != other.category {
            return false;
        }
        let delta = self.total_bytes.abs_diff(other.total_bytes);
        let allowed = (self.total_bytes / 50).max(UPLOAD_SIZE_TOLERANCE_BYTES);
        delta <= allowed
    }
}

/// Files the local side uploaded recently, kept inside a sliding window so an
/// incoming echo can be attributed back to its upload.
#[derive(Debug, Default)]
pub struct RecentUploads {
    entries: Vec<(UploadShape, DateTime<Utc>)>,
}

impl RecentUploads {
    pub fn new() -> RecentUploads {
        RecentUploads::default()
    }

    pub fn record(&mut self, shape: UploadShape, at: DateTime<Utc>) {
        self.entries.push((shape, at));
    }

    pub fn matches(&self, shape: &UploadShape, now: DateTime<Utc>) -> bool {
        let window = Duration::seconds(RECENT_UPLOAD_WINDOW_SECS);
        self.entries
            .iter()
            .any(|(s, at)| now.signed_duration_since(*at) <= window && s.matches(shape))
    }

    pub fn has_activity_within(&self, now: DateTime<Utc>) -> bool {
        let window = Duration::seconds(RECENT_UPLOAD_WINDOW_SECS);
        self.entries
            .iter()
            .any(|(_, at)| now.signed_duration_since(*at) <= window)
    }

    pub fn prune(&mut self, now: DateTime<Utc>) {
        let window = Duration::seconds(RECENT_UPLOAD_WINDOW_SECS);
        self.entries
            .retain(|(_, at)| now.signed_duration_since(*at) <= window);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
