use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};

use super::{is_absolute_url, ImageStore, ImageStoreError, ImageUpload, UPLOADS_ROUTE};

const MAX_EXTENSION_LEN: usize = 8;

/// Stores images on local disk as `<unix-millis><.ext>`, served back under
/// `/uploads`.
#[derive(Debug, Clone)]
pub struct LocalImageStore {
    dir: PathBuf,
}

impl LocalImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Opens a fresh file, adding a `-<n>` suffix when another upload
    /// landed on the same millisecond.
    async fn create_unique(&self, extension: &str) -> Result<(String, fs::File), ImageStoreError> {
        let stamp = Utc::now().timestamp_millis();
        let mut attempt = 0u32;
        loop {
            let file_name = if attempt == 0 {
                format!("{stamp}{extension}")
            } else {
                format!("{stamp}-{attempt}{extension}")
            };

            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(self.dir.join(&file_name))
                .await
            {
                Ok(file) => return Ok((file_name, file)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

#[async_trait]
impl ImageStore for LocalImageStore {
    #[instrument(skip(self, upload), fields(file_name = %upload.file_name, size = upload.bytes.len()))]
    async fn store(&self, upload: ImageUpload) -> Result<String, ImageStoreError> {
        fs::create_dir_all(&self.dir).await?;

        let extension = sanitized_extension(&upload.file_name)
            .map(|ext| format!(".{ext}"))
            .unwrap_or_default();
        let (file_name, mut file) = self.create_unique(&extension).await?;

        if let Err(e) = write_all(&mut file, &upload.bytes).await {
            let _ = fs::remove_file(self.dir.join(&file_name)).await;
            return Err(e.into());
        }

        debug!(%file_name, "Stored image on local disk");
        Ok(format!("{UPLOADS_ROUTE}/{file_name}"))
    }

    #[instrument(skip(self))]
    async fn delete(&self, reference: &str) -> Result<(), ImageStoreError> {
        let file_name = local_file_name(reference)
            .ok_or_else(|| ImageStoreError::InvalidReference(reference.to_string()))?;

        match fs::remove_file(self.dir.join(file_name)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(%reference, "Image already absent from local disk");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

async fn write_all(file: &mut fs::File, bytes: &[u8]) -> std::io::Result<()> {
    file.write_all(bytes).await?;
    file.flush().await
}

fn sanitized_extension(file_name: &str) -> Option<String> {
    let ext = Path::new(file_name)
        .extension()?
        .to_str()?
        .to_ascii_lowercase();

    if ext.is_empty()
        || ext.len() > MAX_EXTENSION_LEN
        || !ext.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return None;
    }
    Some(ext)
}

/// The bare file name behind a `/uploads/<file>` reference. Refuses
/// anything that could escape the upload directory.
fn local_file_name(reference: &str) -> Option<&str> {
    if is_absolute_url(reference) {
        return None;
    }
    let file_name = reference.rsplit('/').next()?;
    if file_name.is_empty() || file_name == "." || file_name == ".." || file_name.contains('\\') {
        return None;
    }
    Some(file_name)
}
