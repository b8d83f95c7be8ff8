//! Object storage operations (avatar images).
//!
//! Avatars are uploaded under a user-scoped path in a public bucket; the
//! platform serves them from a stable public URL.

use chrono::Utc;

use super::{check, PlatformClient, PlatformError};

/// Bucket holding user avatar images.
pub const AVATAR_BUCKET: &str = "avatars";

/// Build the user-scoped object path for a fresh avatar upload, e.g.
/// `3fa85f64-.../1700000000000.png`. The timestamp keeps old objects from
/// being overwritten so cached URLs stay valid.
#[must_use]
pub fn avatar_object_path(user_id: &str, file_name: &str) -> String {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty())
        .unwrap_or("png");
    format!("{user_id}/{}.{ext}", Utc::now().timestamp_millis())
}

impl PlatformClient {
    /// Upload `bytes` into a public bucket and return the object's public URL.
    pub async fn upload_public_object(
        &self,
        access_token: &str,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, PlatformError> {
        let url = format!("{}/storage/v1/object/{bucket}/{path}", self.base_url);
        let response = self
            .as_user(access_token)
            .authed(
                self.http
                    .post(url)
                    .header("Content-Type", content_type)
                    .body(bytes),
            )
            .send()
            .await?;
        check(response).await?;
        Ok(self.public_object_url(bucket, path))
    }

    /// Public URL the platform serves the object from.
    #[must_use]
    pub fn public_object_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/storage/v1/object/public/{bucket}/{path}", self.base_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_avatar_object_path_keeps_extension() {
        let path = avatar_object_path("user-1", "photo.jpeg");
        assert!(path.starts_with("user-1/"));
        assert!(path.ends_with(".jpeg"));
    }

    #[test]
    fn test_avatar_object_path_defaults_extension() {
        let path = avatar_object_path("user-1", "noextension");
        assert!(path.ends_with(".png"));
    }

    #[test]
    fn test_public_object_url() {
        let client = PlatformClient::new("https://example.supabase.co", "key");
        assert_eq!(
            client.public_object_url(AVATAR_BUCKET, "u/1.png"),
            "https://example.supabase.co/storage/v1/object/public/avatars/u/1.png"
        );
    }
}
