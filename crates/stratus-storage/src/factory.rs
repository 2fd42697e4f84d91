//! Factory for building the right storage provider from configuration.

use std::path::Path;
use std::sync::Arc;

use stratus_core::config::{ProviderConfig, TransferSettings};
use stratus_core::error::{Result, StratusError};
use stratus_core::types::ProviderType;

use crate::local::LocalService;
use crate::provider::ContainerApi;
use crate::storage::StorageProvider;

/// Azurite's well-known development account.
#[cfg(feature = "azure")]
const AZURITE_ACCOUNT: &str = "devstoreaccount1";

fn required<'a>(pc: &'a ProviderConfig, field: &str, value: &'a Option<String>) -> Result<&'a str> {
    value.as_deref().ok_or_else(|| {
        StratusError::Config(format!(
            "{field} required for {} provider '{}'",
            pc.provider_type, pc.name
        ))
    })
}

/// Create the container API for a provider entry.
///
/// Supported types:
/// - `local`: directory tree under `root`
/// - `s3`: AWS S3 (optional `region`, credentials from env/profile unless given)
/// - `s3compatible`: MinIO, RustFS, Garage, etc. (requires `endpoint_url`)
/// - `azure`: Blob Storage (requires `account`, plus `access_key` unless Azurite)
/// - `gcs`: Cloud Storage (application default credentials, optional `project_id` and `region`)
pub async fn create_container_api(pc: &ProviderConfig) -> Result<Arc<dyn ContainerApi>> {
    match pc.provider_type {
        ProviderType::Local => {
            let root = required(pc, "root", &pc.root)?;
            Ok(Arc::new(LocalService::new(Path::new(root))?))
        }

        #[cfg(feature = "s3")]
        ProviderType::S3 => {
            let service = crate::s3::S3Service::with_options(crate::s3::S3Options {
                region: pc.region.as_deref(),
                endpoint_url: pc.endpoint_url.as_deref(),
                path_style: pc.path_style.unwrap_or(false),
                access_key: pc.access_key.as_deref(),
                secret_key: pc.secret_key.as_deref(),
            })
            .await?;
            Ok(Arc::new(service))
        }

        #[cfg(feature = "s3")]
        ProviderType::S3Compatible => {
            let endpoint = required(pc, "endpoint_url", &pc.endpoint_url)?;
            let service = crate::s3::S3Service::with_options(crate::s3::S3Options {
                region: Some(pc.region.as_deref().unwrap_or("us-east-1")),
                endpoint_url: Some(endpoint),
                path_style: pc.path_style.unwrap_or(true),
                access_key: pc.access_key.as_deref(),
                secret_key: pc.secret_key.as_deref(),
            })
            .await?;
            Ok(Arc::new(service))
        }

        #[cfg(not(feature = "s3"))]
        ProviderType::S3 | ProviderType::S3Compatible => Err(StratusError::Config(
            "s3 feature not enabled. Recompile with --features s3".to_string(),
        )),

        #[cfg(feature = "azure")]
        ProviderType::Azure => {
            let account = required(pc, "account", &pc.account)?;
            let service = if account == AZURITE_ACCOUNT {
                crate::azure::AzureService::emulator()
            } else {
                let key = required(pc, "access_key", &pc.access_key)?;
                crate::azure::AzureService::new(account, key)
            };
            Ok(Arc::new(service))
        }

        #[cfg(not(feature = "azure"))]
        ProviderType::Azure => Err(StratusError::Config(
            "azure feature not enabled. Recompile with --features azure".to_string(),
        )),

        #[cfg(feature = "gcs")]
        ProviderType::Gcs => {
            let service =
                crate::gcs::GcsService::new(pc.project_id.as_deref(), pc.region.as_deref()).await?;
            Ok(Arc::new(service))
        }

        #[cfg(not(feature = "gcs"))]
        ProviderType::Gcs => Err(StratusError::Config(
            "gcs feature not enabled. Recompile with --features gcs".to_string(),
        )),
    }
}

/// Create a `StorageProvider` for a provider entry, resolving its transfer
/// properties against the shared settings and the provider's defaults.
pub async fn create_storage_provider(
    pc: &ProviderConfig,
    settings: &TransferSettings,
) -> Result<StorageProvider> {
    let api = create_container_api(pc).await?;
    let props = pc.transfer_properties(settings, api.default_properties());
    StorageProvider::with_properties(api, props)
}
