use std::path::{Path, PathBuf};

use anyhow::Result;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use uuid::Uuid;

/// 5 MB limit for avatar images
pub const MAX_AVATAR_BYTES: usize = 5 * 1024 * 1024;

/// URL prefix under which the media root is served.
pub const MEDIA_URL: &str = "/media";

/// Decoded, sniffed avatar ready to be written.
#[derive(Debug)]
pub struct AvatarUpload {
    pub bytes: Vec<u8>,
    pub extension: &'static str,
}

/// Identify an image by its magic bytes.
pub fn sniff_image(bytes: &[u8]) -> Option<&'static str> {
    match bytes {
        [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, ..] => Some("png"),
        [0xFF, 0xD8, 0xFF, ..] => Some("jpg"),
        [b'G', b'I', b'F', b'8', b'7' | b'9', b'a', ..] => Some("gif"),
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some("webp"),
        _ => None,
    }
}

/// Avatar files on local disk, below `{root}/avatars/`.
#[derive(Debug, Clone)]
pub struct AvatarStore {
    root: PathBuf,
}

impl AvatarStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Media root, served as-is under [`MEDIA_URL`].
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write the image and return its path relative to the media root.
    pub async fn save(&self, upload: &AvatarUpload) -> Result<String> {
        let dir = self.root.join("avatars");
        tokio::fs::create_dir_all(&dir).await?;

        let relative = format!("avatars/{}.{}", Uuid::new_v4(), upload.extension);
        let path = self.root.join(&relative);
        let mut file = tokio::fs::File::create(&path).await?;
        file.write_all(&upload.bytes).await?;
        file.flush().await?;

        info!("Stored avatar {} ({} bytes)", relative, upload.bytes.len());
        Ok(relative)
    }

    /// Best effort: a missing file is not an error.
    pub async fn remove(&self, relative: &str) {
        if !is_avatar_path(relative) {
            warn!("Refusing to remove suspicious avatar path '{}'", relative);
            return;
        }
        if let Err(e) = tokio::fs::remove_file(self.root.join(relative)).await {
            warn!("Failed to remove avatar {}: {}", relative, e);
        }
    }
}

pub fn avatar_url(relative: &str) -> String {
    format!("{MEDIA_URL}/{relative}")
}

/// Stored paths are always `avatars/<uuid>.<ext>`; anything else is not ours.
fn is_avatar_path(relative: &str) -> bool {
    relative
        .strip_prefix("avatars/")
        .and_then(|name| name.split_once('.'))
        .is_some_and(|(stem, ext)| {
            stem.parse::<Uuid>().is_ok() && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
}
