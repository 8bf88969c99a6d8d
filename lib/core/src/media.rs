use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use validator::Validate;

use threadboard_auth::session::check_user;
use threadboard_auth::user::User;
use threadboard_utils::checks::check_media_content_type;
use threadboard_utils::constants::{MAX_CONTENT_TYPE_LENGTH, MAX_EXTERNAL_ID_LENGTH};
use threadboard_utils::errors::AppError;

/// Media attached to a post, stored in an external object storage under `external_id`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Validate, Serialize, Deserialize)]
pub struct Media {
    #[validate(length(min = 1, max = MAX_EXTERNAL_ID_LENGTH, message = "Invalid media id."))]
    pub external_id: String,
    #[validate(
        length(max = MAX_CONTENT_TYPE_LENGTH, message = "Invalid media type."),
        custom(function = "check_media_content_type")
    )]
    pub content_type: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresignedUpload {
    pub upload_url: String,
    pub external_id: String,
}

/// Object storage able to provide presigned upload urls.
#[async_trait]
pub trait MediaUploadProvider: Send + Sync {
    /// Returns an upload url for a file with the given base64 encoded md5 checksum, together with the id under
    /// which the file will be stored.
    async fn get_presigned_upload_url(&self, content_md5: &str) -> Result<PresignedUpload, AppError>;
}

pub async fn request_media_upload(
    content_md5: &str,
    user: Option<&User>,
    provider: &dyn MediaUploadProvider,
) -> Result<PresignedUpload, AppError> {
    let user = check_user(user)?;
    log::trace!("Request media upload for user {}", user.user_id);
    if content_md5.trim().is_empty() {
        return Err(AppError::validation("Missing media checksum."));
    }
    provider.get_presigned_upload_url(content_md5).await
}
