//! S3-compatible object storage for archived plant photos.
//!
//! Supabase Storage, MinIO and AWS S3 all speak the S3 protocol; the bucket
//! must be publicly readable under [`S3Config::public_base_url`] for the
//! gallery to load photos.

use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use plantfolio_core::error::AppError;
use plantfolio_core::traits::PhotoStorage;
use tracing::debug;

/// Connection settings for the photo bucket.
#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint, e.g. `https://<project>.supabase.co/storage/v1/s3`.
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub force_path_style: bool,
    /// Prefix of public object URLs, e.g.
    /// `https://<project>.supabase.co/storage/v1/object/public/plant-photos`.
    pub public_base_url: String,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            bucket: "plant-photos".to_string(),
            region: "us-east-1".to_string(),
            endpoint: None,
            access_key_id: None,
            secret_access_key: None,
            force_path_style: false,
            public_base_url: String::new(),
        }
    }
}

/// Photo storage backed by an S3-compatible bucket.
#[derive(Clone)]
pub struct S3PhotoStorage {
    client: Client,
    bucket: String,
    public_base_url: String,
}

impl S3PhotoStorage {
    /// Builds the S3 client from `config`.
    ///
    /// Static credentials are used when both keys are set; otherwise the
    /// default AWS provider chain applies.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if the bucket or public base URL is
    /// empty.
    pub async fn new(config: S3Config) -> Result<Self, AppError> {
        if config.bucket.is_empty() {
            return Err(AppError::ConfigError(
                "bucket name cannot be empty".to_string(),
            ));
        }
        if config.public_base_url.is_empty() {
            return Err(AppError::ConfigError(
                "public base URL for photos cannot be empty".to_string(),
            ));
        }

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));

        if let (Some(access_key), Some(secret_key)) =
            (&config.access_key_id, &config.secret_access_key)
        {
            let credentials = Credentials::new(access_key, secret_key, None, None, "static");
            loader = loader.credentials_provider(SharedCredentialsProvider::new(credentials));
        }

        let shared_config = loader.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&shared_config);

        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        if config.force_path_style {
            builder = builder.force_path_style(true);
        }

        Ok(Self {
            client: Client::from_conf(builder.build()),
            bucket: config.bucket,
            public_base_url: config.public_base_url,
        })
    }
}

/// Joins the public base URL and an object key.
fn join_public_url(base: &str, key: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        key.trim_start_matches('/')
    )
}

impl PhotoStorage for S3PhotoStorage {
    async fn put_photo(&self, key: &str, bytes: Bytes, content_type: &str) -> Result<(), AppError> {
        let size = bytes.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| {
                AppError::StorageWriteError(format!(
                    "put {} into bucket {}: {}",
                    key,
                    self.bucket,
                    aws_sdk_s3::error::DisplayErrorContext(&e)
                ))
            })?;

        debug!(bucket = %self.bucket, %key, size, "Photo uploaded");
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        join_public_url(&self.public_base_url, key)
    }
}
