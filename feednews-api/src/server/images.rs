use std::{
    ffi::OsStr,
    io,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

/// Where the image directory is served.
pub const IMAGE_ROUTE: &str = "/images";

/// Prefix of every path handed out to clients, relative to the server root.
pub const IMAGE_PATH_PREFIX: &str = "images";

pub const ALLOWED_IMAGE_TYPES: [&str; 3] = ["image/png", "image/jpg", "image/jpeg"];

const FALLBACK_FILE_NAME: &str = "image";

/// Uploaded images on the local disk.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct ImageStore {
    root: PathBuf,
}

impl ImageStore {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn accepts(content_type: &str) -> bool {
        ALLOWED_IMAGE_TYPES
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(content_type))
    }

    /// Stores the image under a fresh unique name and returns its client-facing path,
    /// `images/<random hex>-<sanitized original name>`.
    pub async fn save(&self, original_name: Option<&str>, bytes: &[u8]) -> io::Result<String> {
        tokio::fs::create_dir_all(&self.root).await?;

        let file_name = format!(
            "{:016x}-{}",
            rand::random::<u64>(),
            sanitize_file_name(original_name)
        );
        tokio::fs::write(self.root.join(&file_name), bytes).await?;

        debug!(%file_name, size = bytes.len(), "Stored image");
        Ok(format!("{IMAGE_PATH_PREFIX}/{file_name}"))
    }

    /// Maps a client-facing image path to a file in the image directory.
    ///
    /// Only the last path component is used, so the result never leaves the directory.
    #[must_use]
    pub fn locate(&self, image_path: &str) -> Option<PathBuf> {
        let file_name = Path::new(image_path).file_name()?;

        Some(self.root.join(file_name))
    }

    /// Returns whether a file was actually removed.
    pub async fn remove(&self, image_path: &str) -> io::Result<bool> {
        let Some(path) = self.locate(image_path) else {
            return Ok(false);
        };

        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Like [`ImageStore::remove`], but failures are only logged.
    pub async fn discard(&self, image_path: &str) {
        match self.remove(image_path).await {
            Ok(true) => debug!(%image_path, "Removed image"),
            Ok(false) => debug!(%image_path, "Image to remove did not exist"),
            Err(err) => warn!(%image_path, error = %err, "Could not remove image"),
        }
    }
}

fn sanitize_file_name(original_name: Option<&str>) -> String {
    let name: String = original_name
        .map(Path::new)
        .and_then(Path::file_name)
        .and_then(OsStr::to_str)
        .unwrap_or_default()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if name.trim_matches('.').is_empty() {
        FALLBACK_FILE_NAME.to_owned()
    } else {
        name
    }
}
