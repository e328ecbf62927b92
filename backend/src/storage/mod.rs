pub mod s3_service;

use uuid::Uuid;

use self::s3_service::StorageError;

/// Durable image blob storage. Returns a stable locator that ImageResult
/// rows carry and that can be dereferenced again later.
pub trait BlobStore: Send + Sync {
    async fn put_image(
        &self,
        user_id: Uuid,
        data: &[u8],
        mime_type: &str,
    ) -> Result<String, StorageError>;
}
