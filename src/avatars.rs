use anyhow::Context;
use bytes::Bytes;
use image::ImageFormat;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::forms::UploadedFile;
use crate::state::AppState;

const URL_TTL_SECS: u64 = 30 * 60;

/// An uploaded file that decoded as a supported image.
#[derive(Debug, Clone)]
pub struct AvatarImage {
    pub body: Bytes,
    pub format: ImageFormat,
}

impl AvatarImage {
    pub fn content_type(&self) -> &'static str {
        self.format.to_mime_type()
    }

    pub fn extension(&self) -> &'static str {
        self.format.extensions_str().first().copied().unwrap_or("bin")
    }
}

/// Checks that an upload is a real image, returning a user-facing message otherwise.
pub fn sniff(file: UploadedFile, max_bytes: usize) -> Result<AvatarImage, String> {
    if file.body.is_empty() {
        return Err("The submitted file is empty.".into());
    }
    if file.body.len() > max_bytes {
        return Err(format!(
            "Ensure this file is at most {max_bytes} bytes (it has {}).",
            file.body.len()
        ));
    }
    let format = match image::guess_format(&file.body) {
        Ok(f @ (ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::Gif | ImageFormat::WebP)) => f,
        _ => return Err(not_an_image()),
    };
    // Header sniffing alone accepts truncated or corrupt files.
    if let Err(e) = image::load_from_memory_with_format(&file.body, format) {
        debug!(
            error = %e,
            file_name = ?file.file_name,
            content_type = ?file.content_type,
            "avatar failed to decode"
        );
        return Err(not_an_image());
    }
    Ok(AvatarImage {
        body: file.body,
        format,
    })
}

fn not_an_image() -> String {
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image."
        .into()
}

pub fn avatar_key(user_id: Uuid, img: &AvatarImage) -> String {
    format!("avatars/{}/{}.{}", user_id, Uuid::new_v4(), img.extension())
}

/// Uploads the avatar and returns its storage key.
pub async fn store(st: &AppState, user_id: Uuid, img: AvatarImage) -> anyhow::Result<String> {
    let key = avatar_key(user_id, &img);
    let content_type = img.content_type();
    st.storage
        .put_object(&key, img.body, content_type)
        .await
        .with_context(|| format!("store avatar {key}"))?;
    debug!(%user_id, %key, "avatar stored");
    Ok(key)
}

/// Removes a stored avatar. Never touches the shared placeholder; failures are only logged.
pub async fn discard(st: &AppState, key: &str) {
    if key == st.config.default_avatar {
        return;
    }
    if let Err(e) = st.storage.delete_object(key).await {
        warn!(error = %e, %key, "failed to delete avatar object");
    }
}

pub async fn url_for(st: &AppState, key: &str) -> anyhow::Result<String> {
    st.storage
        .presign_get(key, URL_TTL_SECS)
        .await
        .with_context(|| format!("presign avatar {key}"))
}

#[cfg(test)]
pub(crate) fn png_bytes() -> Bytes {
    let mut out = std::io::Cursor::new(Vec::new());
    image::RgbImage::new(2, 2)
        .write_to(&mut out, ImageFormat::Png)
        .expect("encode png");
    Bytes::from(out.into_inner())
}
