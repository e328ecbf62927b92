use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use hex;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::storage::BlobStore;

#[derive(Clone)]
pub struct S3Service {
    client: Client,
    bucket_name: String,
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("S3 error: {0}")]
    S3(String),
    #[error("Invalid file format")]
    InvalidFormat,
}

impl S3Service {
    pub fn new(client: Client, bucket_name: String) -> Self {
        Self {
            client,
            bucket_name,
        }
    }

    pub fn calculate_image_hash(image_data: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(image_data);
        hex::encode(hasher.finalize())
    }

    pub fn generate_key(user_id: Uuid, image_hash: &str, file_extension: &str) -> String {
        format!("analyses/{}/{}.{}", user_id, image_hash, file_extension)
    }

    pub fn extract_file_extension(mime_type: &str) -> Result<&str, StorageError> {
        match mime_type {
            "image/jpeg" => Ok("jpg"),
            "image/png" => Ok("png"),
            "image/webp" => Ok("webp"),
            "image/gif" => Ok("gif"),
            _ => Err(StorageError::InvalidFormat),
        }
    }
}

impl BlobStore for S3Service {
    async fn put_image(
        &self,
        user_id: Uuid,
        data: &[u8],
        mime_type: &str,
    ) -> Result<String, StorageError> {
        let image_hash = Self::calculate_image_hash(data);
        let file_extension = Self::extract_file_extension(mime_type).unwrap_or("jpg");
        let key = Self::generate_key(user_id, &image_hash, file_extension);

        self.client
            .put_object()
            .bucket(&self.bucket_name)
            .key(&key)
            .body(ByteStream::from(data.to_vec()))
            .content_type(mime_type)
            .send()
            .await
            .map_err(|e| StorageError::S3(e.to_string()))?;

        Ok(key)
    }
}
