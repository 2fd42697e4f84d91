#[cfg(feature = "s3")]
mod inner {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use aws_sdk_s3::Client;
    use aws_sdk_s3::client::Waiters;
    use aws_sdk_s3::error::SdkError;
    use aws_sdk_s3::primitives::ByteStream;
    use aws_sdk_s3::types::{
        BucketCannedAcl, BucketLocationConstraint, CompletedMultipartUpload, CompletedPart,
        CreateBucketConfiguration, Delete, ObjectIdentifier, PublicAccessBlockConfiguration,
    };
    use bytes::Bytes;
    use stratus_core::error::{Result, StratusError};
    use stratus_core::types::{BlockRange, MIB, ProviderType, TransferProperties};
    use tracing::debug;

    use crate::provider::{ContainerApi, StagedBlock, TransferAdapter, UploadTicket};

    /// S3 rejects multipart parts smaller than this, except the last one.
    pub const S3_MIN_BLOCK_SIZE: u64 = 5 * MIB;

    /// Most parts one multipart upload may have.
    pub const S3_MAX_PARTS: usize = 10_000;

    const WAITER_MAX_WAIT: Duration = Duration::from_secs(60);
    const DEFAULT_REGION: &str = "us-east-1";

    fn status<E>(err: &SdkError<E>) -> Option<u16> {
        err.raw_response().map(|r| r.status().as_u16())
    }

    fn is_missing<E>(err: &SdkError<E>) -> bool {
        status(err) == Some(404)
    }

    /// AWS S3 and S3-compatible storage.
    ///
    /// Works with AWS S3, MinIO, RustFS, Garage, Ceph RGW, SeaweedFS,
    /// and any other service implementing the S3 API.
    pub struct S3Service {
        client: Client,
        region: String,
        provider_type: ProviderType,
    }

    /// Options for creating an S3 service.
    #[derive(Default)]
    pub struct S3Options<'a> {
        pub region: Option<&'a str>,
        /// Custom endpoint URL (e.g. `http://localhost:9000` for MinIO).
        pub endpoint_url: Option<&'a str>,
        /// Force path-style addressing (`http://host/bucket/key` instead of `http://bucket.host/key`).
        /// Most S3-compatible servers require this.
        pub path_style: bool,
        /// Explicit access key. If None, uses env/profile credentials.
        pub access_key: Option<&'a str>,
        /// Explicit secret key. If None, uses env/profile credentials.
        pub secret_key: Option<&'a str>,
    }

    impl S3Service {
        /// Create for standard AWS S3.
        pub async fn new(region: Option<&str>) -> Result<Self> {
            Self::with_options(S3Options {
                region,
                ..Default::default()
            })
            .await
        }

        /// Create for an S3-compatible service (MinIO, RustFS, Garage, etc.)
        pub async fn s3_compatible(
            endpoint_url: &str,
            region: Option<&str>,
            access_key: Option<&str>,
            secret_key: Option<&str>,
        ) -> Result<Self> {
            Self::with_options(S3Options {
                region: Some(region.unwrap_or(DEFAULT_REGION)),
                endpoint_url: Some(endpoint_url),
                path_style: true,
                access_key,
                secret_key,
            })
            .await
        }

        /// Create with full options.
        pub async fn with_options(opts: S3Options<'_>) -> Result<Self> {
            let mut config_loader = aws_config::from_env();

            if let Some(r) = opts.region {
                config_loader = config_loader.region(aws_config::Region::new(r.to_string()));
            }

            // If explicit credentials are provided, inject them
            if let (Some(ak), Some(sk)) = (opts.access_key, opts.secret_key) {
                let creds =
                    aws_sdk_s3::config::Credentials::new(ak, sk, None, None, "stratus-config");
                config_loader = config_loader.credentials_provider(creds);
            }

            let sdk_config = config_loader.load().await;
            let region = sdk_config
                .region()
                .map(|r| r.to_string())
                .unwrap_or_else(|| DEFAULT_REGION.to_string());

            let mut s3_config_builder = aws_sdk_s3::config::Builder::from(&sdk_config);

            if let Some(endpoint) = opts.endpoint_url {
                s3_config_builder = s3_config_builder.endpoint_url(endpoint);
            }

            if opts.path_style {
                s3_config_builder = s3_config_builder.force_path_style(true);
            }

            let provider_type = if opts.endpoint_url.is_some() {
                ProviderType::S3Compatible
            } else {
                ProviderType::S3
            };

            Ok(Self {
                client: Client::from_conf(s3_config_builder.build()),
                region,
                provider_type,
            })
        }

        fn err<E>(&self, op: &'static str, e: E) -> StratusError
        where
            E: Into<stratus_core::error::BoxError>,
        {
            StratusError::provider(self.provider_type, op, e)
        }

        async fn block_public_access(&self, name: &str) -> Result<()> {
            let config = PublicAccessBlockConfiguration::builder()
                .block_public_acls(true)
                .ignore_public_acls(true)
                .block_public_policy(true)
                .restrict_public_buckets(true)
                .build();
            self.client
                .put_public_access_block()
                .bucket(name)
                .public_access_block_configuration(config)
                .send()
                .await
                .map_err(|e| self.err("put_public_access_block", e))?;
            Ok(())
        }
    }

    #[async_trait]
    impl ContainerApi for S3Service {
        fn provider_type(&self) -> ProviderType {
            self.provider_type
        }

        fn default_properties(&self) -> TransferProperties {
            TransferProperties::new(8 * MIB, 5)
        }

        fn min_block_size(&self) -> u64 {
            S3_MIN_BLOCK_SIZE
        }

        async fn container_exists(&self, name: &str) -> Result<bool> {
            match self.client.head_bucket().bucket(name).send().await {
                Ok(_) => Ok(true),
                Err(e)
                    if e.as_service_error().is_some_and(|se| se.is_not_found())
                        || is_missing(&e) =>
                {
                    Ok(false)
                }
                Err(e) => Err(self.err("head_bucket", e)),
            }
        }

        async fn create_container(&self, name: &str) -> Result<()> {
            let mut request = self
                .client
                .create_bucket()
                .bucket(name)
                .acl(BucketCannedAcl::Private);

            if self.provider_type == ProviderType::S3 && self.region != DEFAULT_REGION {
                let location = CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build();
                request = request.create_bucket_configuration(location);
            }

            request
                .send()
                .await
                .map_err(|e| self.err("create_bucket", e))?;

            self.client
                .wait_until_bucket_exists()
                .bucket(name)
                .wait(WAITER_MAX_WAIT)
                .await
                .map_err(|e| self.err("wait_until_bucket_exists", e))?;

            if self.provider_type == ProviderType::S3 {
                self.block_public_access(name).await?;
            }
            debug!("Created S3 bucket '{name}' in {}", self.region);
            Ok(())
        }

        async fn delete_container(&self, name: &str) -> Result<()> {
            match self.client.delete_bucket().bucket(name).send().await {
                Ok(_) => Ok(()),
                Err(e) if is_missing(&e) => Err(StratusError::ContainerNotFound(name.to_string())),
                Err(e) => Err(self.err("delete_bucket", e)),
            }
        }

        async fn list_containers(&self) -> Result<Vec<String>> {
            let mut names = Vec::new();
            let mut token: Option<String> = None;
            loop {
                let resp = self
                    .client
                    .list_buckets()
                    .set_continuation_token(token.take())
                    .send()
                    .await
                    .map_err(|e| self.err("list_buckets", e))?;

                names.extend(
                    resp.buckets()
                        .iter()
                        .filter_map(|b| b.name().map(str::to_string)),
                );

                match resp.continuation_token() {
                    Some(next) if !next.is_empty() => token = Some(next.to_string()),
                    _ => break,
                }
            }
            Ok(names)
        }

        fn adapter(&self, container: &str) -> Arc<dyn TransferAdapter> {
            Arc::new(S3Bucket {
                client: self.client.clone(),
                bucket: container.to_string(),
                provider_type: self.provider_type,
            })
        }
    }

    /// Object operations on one S3 bucket.
    pub struct S3Bucket {
        client: Client,
        bucket: String,
        provider_type: ProviderType,
    }

    impl S3Bucket {
        fn err<E>(&self, op: &'static str, e: E) -> StratusError
        where
            E: Into<stratus_core::error::BoxError>,
        {
            StratusError::provider(self.provider_type, op, e)
        }

        fn not_found(&self, object: &str) -> StratusError {
            StratusError::ObjectNotFound {
                container: self.bucket.clone(),
                object: object.to_string(),
            }
        }

        /// Identifiers of every version and delete marker stored under `key`.
        async fn object_versions(&self, key: &str) -> Result<Vec<ObjectIdentifier>> {
            let resp = self
                .client
                .list_object_versions()
                .bucket(&self.bucket)
                .prefix(key)
                .send()
                .await
                .map_err(|e| self.err("list_object_versions", e))?;

            let versions = resp
                .versions()
                .iter()
                .filter(|v| v.key() == Some(key))
                .map(|v| v.version_id());
            let markers = resp
                .delete_markers()
                .iter()
                .filter(|m| m.key() == Some(key))
                .map(|m| m.version_id());

            versions
                .chain(markers)
                .map(|version| {
                    ObjectIdentifier::builder()
                        .key(key)
                        .set_version_id(version.map(str::to_string))
                        .build()
                        .map_err(|e| self.err("list_object_versions", e))
                })
                .collect()
        }
    }

    #[async_trait]
    impl TransferAdapter for S3Bucket {
        fn container(&self) -> &str {
            &self.bucket
        }

        fn max_blocks(&self) -> Option<usize> {
            Some(S3_MAX_PARTS)
        }

        async fn list_objects(&self, prefix: &str) -> Result<Vec<String>> {
            let mut keys = Vec::new();
            let mut token: Option<String> = None;
            loop {
                let resp = self
                    .client
                    .list_objects_v2()
                    .bucket(&self.bucket)
                    .prefix(prefix)
                    .set_continuation_token(token.take())
                    .send()
                    .await
                    .map_err(|e| match e.as_service_error() {
                        Some(se) if se.is_no_such_bucket() => {
                            StratusError::ContainerNotFound(self.bucket.clone())
                        }
                        _ => self.err("list_objects_v2", e),
                    })?;

                let page: Vec<String> = resp
                    .contents()
                    .iter()
                    .filter_map(|o| o.key().map(str::to_string))
                    .collect();
                debug!("Listed page of {} keys in '{}'", page.len(), self.bucket);
                keys.extend(page);

                match (resp.is_truncated(), resp.next_continuation_token()) {
                    (Some(true), Some(next)) => token = Some(next.to_string()),
                    _ => break,
                }
            }
            Ok(keys)
        }

        async fn object_size(&self, object: &str) -> Result<u64> {
            let resp = self
                .client
                .head_object()
                .bucket(&self.bucket)
                .key(object)
                .send()
                .await
                .map_err(|e| {
                    if e.as_service_error().is_some_and(|se| se.is_not_found()) || is_missing(&e) {
                        self.not_found(object)
                    } else {
                        self.err("head_object", e)
                    }
                })?;
            Ok(resp.content_length().unwrap_or(0).max(0) as u64)
        }

        async fn delete_object(&self, object: &str) -> Result<()> {
            let versions = self.object_versions(object).await?;

            if versions.is_empty() {
                self.client
                    .delete_object()
                    .bucket(&self.bucket)
                    .key(object)
                    .send()
                    .await
                    .map_err(|e| self.err("delete_object", e))?;
            } else {
                debug!(
                    "Deleting {} versions of '{}/{object}'",
                    versions.len(),
                    self.bucket
                );
                let delete = Delete::builder()
                    .set_objects(Some(versions))
                    .quiet(true)
                    .build()
                    .map_err(|e| self.err("delete_objects", e))?;
                self.client
                    .delete_objects()
                    .bucket(&self.bucket)
                    .delete(delete)
                    .send()
                    .await
                    .map_err(|e| self.err("delete_objects", e))?;
            }

            self.client
                .wait_until_object_not_exists()
                .bucket(&self.bucket)
                .key(object)
                .wait(WAITER_MAX_WAIT)
                .await
                .map_err(|e| self.err("wait_until_object_not_exists", e))?;
            Ok(())
        }

        async fn put_object(&self, object: &str, content_type: &str, data: Bytes) -> Result<()> {
            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(object)
                .content_type(content_type)
                .body(ByteStream::from(data))
                .send()
                .await
                .map_err(|e| self.err("put_object", e))?;
            Ok(())
        }

        async fn begin_upload(&self, object: &str, content_type: &str) -> Result<UploadTicket> {
            let resp = self
                .client
                .create_multipart_upload()
                .bucket(&self.bucket)
                .key(object)
                .content_type(content_type)
                .send()
                .await
                .map_err(|e| self.err("create_multipart_upload", e))?;

            let upload_id = resp.upload_id().ok_or_else(|| {
                self.err("create_multipart_upload", "response carried no upload id")
            })?;

            Ok(UploadTicket {
                object: object.to_string(),
                content_type: content_type.to_string(),
                upload_id: upload_id.to_string(),
            })
        }

        async fn stage_block(
            &self,
            ticket: &UploadTicket,
            block: BlockRange,
            data: Bytes,
        ) -> Result<StagedBlock> {
            let resp = self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(&ticket.object)
                .upload_id(&ticket.upload_id)
                .part_number(part_number(block.index))
                .body(ByteStream::from(data))
                .send()
                .await
                .map_err(|e| self.err("upload_part", e))?;

            Ok(StagedBlock {
                index: block.index,
                tag: resp.e_tag().unwrap_or_default().to_string(),
            })
        }

        async fn commit_blocks(
            &self,
            ticket: &UploadTicket,
            blocks: Vec<StagedBlock>,
        ) -> Result<()> {
            let parts = blocks
                .into_iter()
                .map(|b| {
                    CompletedPart::builder()
                        .part_number(part_number(b.index))
                        .e_tag(b.tag)
                        .build()
                })
                .collect();
            let upload = CompletedMultipartUpload::builder()
                .set_parts(Some(parts))
                .build();

            self.client
                .complete_multipart_upload()
                .bucket(&self.bucket)
                .key(&ticket.object)
                .upload_id(&ticket.upload_id)
                .multipart_upload(upload)
                .send()
                .await
                .map_err(|e| self.err("complete_multipart_upload", e))?;
            Ok(())
        }

        async fn abort_upload(&self, ticket: &UploadTicket) -> Result<()> {
            self.client
                .abort_multipart_upload()
                .bucket(&self.bucket)
                .key(&ticket.object)
                .upload_id(&ticket.upload_id)
                .send()
                .await
                .map_err(|e| self.err("abort_multipart_upload", e))?;
            Ok(())
        }

        async fn read_range(&self, object: &str, block: BlockRange) -> Result<Bytes> {
            let resp = self
                .client
                .get_object()
                .bucket(&self.bucket)
                .key(object)
                .range(http_range(block))
                .send()
                .await
                .map_err(|e| {
                    if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                        self.not_found(object)
                    } else {
                        self.err("get_object", e)
                    }
                })?;

            let data = resp
                .body
                .collect()
                .await
                .map_err(|e| self.err("get_object", e))?;
            Ok(data.into_bytes())
        }
    }

    /// S3 part numbers start at 1.
    fn part_number(index: usize) -> i32 {
        index as i32 + 1
    }

    /// Inclusive HTTP byte range for a block.
    pub(crate) fn http_range(block: BlockRange) -> String {
        format!("bytes={}-{}", block.offset, block.end() - 1)
    }

}

#[cfg(feature = "s3")]
pub use inner::{S3Bucket, S3Options, S3Service, S3_MAX_PARTS, S3_MIN_BLOCK_SIZE};
