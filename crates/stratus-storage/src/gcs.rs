#[cfg(feature = "gcs")]
mod inner {
    use std::sync::Arc;

    use async_trait::async_trait;
    use bytes::Bytes;
    use google_cloud_storage::client::{Client, ClientConfig};
    use google_cloud_storage::http::Error as GcsError;
    use google_cloud_storage::http::buckets::delete::DeleteBucketRequest;
    use google_cloud_storage::http::buckets::get::GetBucketRequest;
    use google_cloud_storage::http::buckets::insert::{
        BucketCreationConfig, InsertBucketParam, InsertBucketRequest,
    };
    use google_cloud_storage::http::buckets::list::ListBucketsRequest;
    use google_cloud_storage::http::buckets::IamConfiguration;
    use google_cloud_storage::http::buckets::iam_configuration::PublicAccessPrevention;
    use google_cloud_storage::http::objects::compose::{ComposeObjectRequest, ComposingTargets};
    use google_cloud_storage::http::objects::delete::DeleteObjectRequest;
    use google_cloud_storage::http::objects::download::Range;
    use google_cloud_storage::http::objects::get::GetObjectRequest;
    use google_cloud_storage::http::objects::list::ListObjectsRequest;
    use google_cloud_storage::http::objects::upload::{Media, UploadObjectRequest, UploadType};
    use google_cloud_storage::http::objects::{Object, SourceObjects};
    use stratus_core::error::{Result, StratusError};
    use stratus_core::plan::encode_block_id;
    use stratus_core::types::{BlockRange, MIB, ProviderType, TransferProperties};
    use tracing::{debug, warn};
    use uuid::Uuid;

    use crate::provider::{ContainerApi, StagedBlock, TransferAdapter, UploadTicket};

    /// Compose accepts at most this many source objects per call.
    const MAX_COMPOSE_SOURCES: usize = 32;
    const DEFAULT_LOCATION: &str = "US";

    fn is_missing(e: &GcsError) -> bool {
        matches!(e, GcsError::Response(r) if r.code == 404)
    }

    fn err<E>(op: &'static str, e: E) -> StratusError
    where
        E: Into<stratus_core::error::BoxError>,
    {
        StratusError::provider(ProviderType::Gcs, op, e)
    }

    /// Google Cloud Storage project.
    pub struct GcsService {
        client: Client,
        project_id: String,
        region: Option<String>,
    }

    impl GcsService {
        /// Create using application default credentials.
        ///
        /// `project_id` falls back to the project of the credentials.
        /// `region` is the location of created buckets and filters listings.
        pub async fn new(project_id: Option<&str>, region: Option<&str>) -> Result<Self> {
            let config = ClientConfig::default()
                .with_auth()
                .await
                .map_err(|e| err("authenticate", e))?;

            let project_id = project_id
                .map(str::to_string)
                .or_else(|| config.project_id.clone())
                .ok_or_else(|| {
                    StratusError::Config("GCS provider needs a project_id".to_string())
                })?;

            Ok(Self {
                client: Client::new(config),
                project_id,
                region: region.map(str::to_string),
            })
        }

        fn in_region(&self, location: &str) -> bool {
            self.region
                .as_deref()
                .is_none_or(|r| r.eq_ignore_ascii_case(location))
        }
    }

    #[async_trait]
    impl ContainerApi for GcsService {
        fn provider_type(&self) -> ProviderType {
            ProviderType::Gcs
        }

        fn default_properties(&self) -> TransferProperties {
            TransferProperties::new(5 * MIB, 8)
        }

        async fn container_exists(&self, name: &str) -> Result<bool> {
            let request = GetBucketRequest {
                bucket: name.to_string(),
                ..Default::default()
            };
            match self.client.get_bucket(&request).await {
                Ok(_) => Ok(true),
                Err(e) if is_missing(&e) => Ok(false),
                Err(e) => Err(err("get_bucket", e)),
            }
        }

        async fn create_container(&self, name: &str) -> Result<()> {
            let location = self
                .region
                .clone()
                .unwrap_or_else(|| DEFAULT_LOCATION.to_string());
            let request = InsertBucketRequest {
                name: name.to_string(),
                param: InsertBucketParam {
                    project: self.project_id.clone(),
                    ..Default::default()
                },
                bucket: BucketCreationConfig {
                    location: location.clone(),
                    iam_configuration: Some(IamConfiguration {
                        uniform_bucket_level_access: None,
                        public_access_prevention: Some(PublicAccessPrevention::Enforced),
                    }),
                    ..Default::default()
                },
            };
            self.client
                .insert_bucket(&request)
                .await
                .map_err(|e| err("insert_bucket", e))?;
            debug!("Created GCS bucket '{name}' in {location}");
            Ok(())
        }

        async fn delete_container(&self, name: &str) -> Result<()> {
            let request = DeleteBucketRequest {
                bucket: name.to_string(),
                ..Default::default()
            };
            match self.client.delete_bucket(&request).await {
                Ok(()) => Ok(()),
                Err(e) if is_missing(&e) => Err(StratusError::ContainerNotFound(name.to_string())),
                Err(e) => Err(err("delete_bucket", e)),
            }
        }

        async fn list_containers(&self) -> Result<Vec<String>> {
            let mut names = Vec::new();
            let mut page_token: Option<String> = None;
            loop {
                let request = ListBucketsRequest {
                    project: self.project_id.clone(),
                    page_token: page_token.take(),
                    ..Default::default()
                };
                let resp = self
                    .client
                    .list_buckets(&request)
                    .await
                    .map_err(|e| err("list_buckets", e))?;

                names.extend(
                    resp.items
                        .into_iter()
                        .filter(|b| self.in_region(&b.location))
                        .map(|b| b.name),
                );

                match resp.next_page_token {
                    Some(next) if !next.is_empty() => page_token = Some(next),
                    _ => break,
                }
            }
            Ok(names)
        }

        fn adapter(&self, container: &str) -> Arc<dyn TransferAdapter> {
            Arc::new(GcsBucket {
                client: self.client.clone(),
                bucket: container.to_string(),
            })
        }
    }

    /// Object operations on one GCS bucket.
    ///
    /// Staged blocks are uploaded as temporary part objects and merged with
    /// compose on commit.
    pub struct GcsBucket {
        client: Client,
        bucket: String,
    }

    impl GcsBucket {
        fn not_found(&self, object: &str) -> StratusError {
            StratusError::ObjectNotFound {
                container: self.bucket.clone(),
                object: object.to_string(),
            }
        }

        fn get_request(&self, object: &str) -> GetObjectRequest {
            GetObjectRequest {
                bucket: self.bucket.clone(),
                object: object.to_string(),
                ..Default::default()
            }
        }

        async fn upload(&self, object: &str, content_type: &str, data: Bytes) -> Result<()> {
            let mut media = Media::new(object.to_string());
            media.content_type = content_type.to_string().into();
            self.client
                .upload_object(
                    &UploadObjectRequest {
                        bucket: self.bucket.clone(),
                        ..Default::default()
                    },
                    data,
                    &UploadType::Simple(media),
                )
                .await
                .map_err(|e| err("upload_object", e))?;
            Ok(())
        }

        async fn compose(
            &self,
            target: &str,
            content_type: &str,
            sources: Vec<String>,
        ) -> Result<()> {
            let request = ComposeObjectRequest {
                bucket: self.bucket.clone(),
                destination_object: target.to_string(),
                composing_targets: ComposingTargets {
                    destination: Some(Object {
                        content_type: Some(content_type.to_string()),
                        ..Default::default()
                    }),
                    source_objects: sources
                        .into_iter()
                        .map(|name| SourceObjects {
                            name,
                            ..Default::default()
                        })
                        .collect(),
                },
                ..Default::default()
            };
            self.client
                .compose_object(&request)
                .await
                .map_err(|e| err("compose_object", e))?;
            Ok(())
        }

        /// Delete part objects, logging instead of failing.
        async fn remove_parts(&self, parts: impl IntoIterator<Item = String>) {
            for part in parts {
                let request = DeleteObjectRequest {
                    bucket: self.bucket.clone(),
                    object: part.clone(),
                    ..Default::default()
                };
                if let Err(e) = self.client.delete_object(&request).await {
                    if !is_missing(&e) {
                        warn!("Failed to remove part object '{}/{part}': {e}", self.bucket);
                    }
                }
            }
        }

        /// Remove every part and intermediate object of an upload.
        async fn clear_staging(&self, ticket: &UploadTicket) -> Result<()> {
            let staged = self.list_objects(&part_prefix(ticket)).await?;
            self.remove_parts(staged).await;
            Ok(())
        }
    }

    /// Prefix under which the parts of one staged upload are stored.
    fn part_prefix(ticket: &UploadTicket) -> String {
        format!("{}.stratus-part/{}/", ticket.object, ticket.upload_id)
    }

    /// One compose call: `sources`, in order, merged into `target`.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub(crate) struct ComposeStep {
        pub sources: Vec<String>,
        pub target: String,
    }

    /// Compose calls that merge `parts` into `destination` as a tree.
    ///
    /// While a level holds more sources than one call accepts, its groups are
    /// merged into intermediate objects under `scratch`. Only the last step
    /// writes `destination`, so the object never appears half assembled.
    pub(crate) fn compose_steps(
        destination: &str,
        scratch: &str,
        parts: &[String],
    ) -> Vec<ComposeStep> {
        let mut steps = Vec::new();
        let mut level = parts.to_vec();
        let mut depth = 0;

        while level.len() > MAX_COMPOSE_SOURCES {
            let mut next = Vec::with_capacity(level.len().div_ceil(MAX_COMPOSE_SOURCES));
            for (i, group) in level.chunks(MAX_COMPOSE_SOURCES).enumerate() {
                let target = format!("{scratch}compose/{depth}-{i}");
                steps.push(ComposeStep {
                    sources: group.to_vec(),
                    target: target.clone(),
                });
                next.push(target);
            }
            level = next;
            depth += 1;
        }

        steps.push(ComposeStep {
            sources: level,
            target: destination.to_string(),
        });
        steps
    }

    #[async_trait]
    impl TransferAdapter for GcsBucket {
        fn container(&self) -> &str {
            &self.bucket
        }

        async fn list_objects(&self, prefix: &str) -> Result<Vec<String>> {
            let mut names = Vec::new();
            let mut page_token: Option<String> = None;
            loop {
                let request = ListObjectsRequest {
                    bucket: self.bucket.clone(),
                    prefix: Some(prefix.to_string()),
                    page_token: page_token.take(),
                    ..Default::default()
                };
                let resp = self.client.list_objects(&request).await.map_err(|e| {
                    if is_missing(&e) {
                        StratusError::ContainerNotFound(self.bucket.clone())
                    } else {
                        err("list_objects", e)
                    }
                })?;

                let page: Vec<String> = resp
                    .items
                    .unwrap_or_default()
                    .into_iter()
                    .map(|o| o.name)
                    .collect();
                debug!("Listed page of {} objects in '{}'", page.len(), self.bucket);
                names.extend(page);

                match resp.next_page_token {
                    Some(next) if !next.is_empty() => page_token = Some(next),
                    _ => break,
                }
            }
            Ok(names)
        }

        async fn object_size(&self, object: &str) -> Result<u64> {
            let meta = self
                .client
                .get_object(&self.get_request(object))
                .await
                .map_err(|e| {
                    if is_missing(&e) {
                        self.not_found(object)
                    } else {
                        err("get_object", e)
                    }
                })?;
            Ok(meta.size.max(0) as u64)
        }

        async fn delete_object(&self, object: &str) -> Result<()> {
            let request = DeleteObjectRequest {
                bucket: self.bucket.clone(),
                object: object.to_string(),
                ..Default::default()
            };
            match self.client.delete_object(&request).await {
                Ok(()) => Ok(()),
                Err(e) if is_missing(&e) => Ok(()),
                Err(e) => Err(err("delete_object", e)),
            }
        }

        async fn put_object(&self, object: &str, content_type: &str, data: Bytes) -> Result<()> {
            self.upload(object, content_type, data).await
        }

        async fn begin_upload(&self, object: &str, content_type: &str) -> Result<UploadTicket> {
            Ok(UploadTicket {
                object: object.to_string(),
                content_type: content_type.to_string(),
                upload_id: Uuid::now_v7().to_string(),
            })
        }

        async fn stage_block(
            &self,
            ticket: &UploadTicket,
            block: BlockRange,
            data: Bytes,
        ) -> Result<StagedBlock> {
            let part = format!("{}{}", part_prefix(ticket), encode_block_id(block.index));
            self.upload(&part, "application/octet-stream", data).await?;
            Ok(StagedBlock {
                index: block.index,
                tag: part,
            })
        }

        async fn commit_blocks(
            &self,
            ticket: &UploadTicket,
            blocks: Vec<StagedBlock>,
        ) -> Result<()> {
            let parts: Vec<String> = blocks.into_iter().map(|b| b.tag).collect();
            let steps = compose_steps(&ticket.object, &part_prefix(ticket), &parts);
            debug!(
                "Composing {} parts into '{}/{}' in {} calls",
                parts.len(),
                self.bucket,
                ticket.object,
                steps.len()
            );

            for step in steps {
                self.compose(&step.target, &ticket.content_type, step.sources)
                    .await?;
            }
            if let Err(e) = self.clear_staging(ticket).await {
                warn!("Failed to clean up parts of '{}/{}': {e}", self.bucket, ticket.object);
            }
            Ok(())
        }

        async fn abort_upload(&self, ticket: &UploadTicket) -> Result<()> {
            self.clear_staging(ticket).await
        }

        async fn read_range(&self, object: &str, block: BlockRange) -> Result<Bytes> {
            let data = self
                .client
                .download_object(
                    &self.get_request(object),
                    &Range(Some(block.offset), Some(block.end() - 1)),
                )
                .await
                .map_err(|e| {
                    if is_missing(&e) {
                        self.not_found(object)
                    } else {
                        err("download_object", e)
                    }
                })?;
            Ok(Bytes::from(data))
        }
    }

}

#[cfg(feature = "gcs")]
pub use inner::{GcsBucket, GcsService};
