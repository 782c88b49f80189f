use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::user::UserSummary;

/// Extensions rendered as video rather than image.
pub const VIDEO_EXTENSIONS: [&str; 3] = ["mp4", "webm", "mov"];
pub const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

pub const MAX_CAPTION_LEN: usize = 2200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Classifies an uploaded file or stored key by its extension.
    pub fn from_name(name: &str) -> Option<Self> {
        let ext = extension(name)?;
        if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::Video)
        } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::Image)
        } else {
            None
        }
    }
}

/// Lower-cased extension of a file name or object key.
pub fn extension(name: &str) -> Option<String> {
    let file_name = name.rsplit('/').next().unwrap_or(name);
    let (stem, ext) = file_name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

pub fn is_video_name(name: &str) -> bool {
    matches!(MediaKind::from_name(name), Some(MediaKind::Video))
}

#[derive(Debug, Clone)]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub caption: String,
    pub media_key: String,
    pub created_at: OffsetDateTime,
}

impl Post {
    pub fn is_video(&self) -> bool {
        is_video_name(&self.media_key)
    }
}

/// A post as rendered in grids (explore, reels, profile).
#[derive(Debug, Clone, Serialize)]
pub struct PostCard {
    pub id: Uuid,
    pub author: UserSummary,
    pub caption: String,
    pub media_url: String,
    pub is_video: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub like_count: i64,
    pub comment_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_detection_is_case_insensitive() {
        assert!(is_video_name("posts/abc/clip.MP4"));
        assert!(is_video_name("story.webm"));
        assert!(is_video_name("trip.Mov"));
        assert!(!is_video_name("test_image.jpg"));
        assert!(!is_video_name("mp4"));
        assert!(!is_video_name("archive.mp4.zip"));
    }

    #[test]
    fn classifies_known_image_types() {
        assert_eq!(MediaKind::from_name("a.jpeg"), Some(MediaKind::Image));
        assert_eq!(MediaKind::from_name("a.PNG"), Some(MediaKind::Image));
        assert_eq!(MediaKind::from_name("notes.txt"), None);
        assert_eq!(MediaKind::from_name(".png"), None);
    }

    #[test]
    fn post_reports_video_from_its_key() {
        let post = Post {
            id: Uuid::nil(),
            author_id: Uuid::nil(),
            caption: String::new(),
            media_key: "posts/u/1.mov".into(),
            created_at: OffsetDateTime::now_utc(),
        };
        assert!(post.is_video());
    }
}
