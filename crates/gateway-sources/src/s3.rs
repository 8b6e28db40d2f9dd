use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region as AwsRegion};
use aws_credential_types::Credentials;
use aws_sdk_s3::Client;
use gateway_core::ContiguousData;
use tokio_util::sync::CancellationToken;

use crate::error::TierError;
use crate::request::DataRequest;
use crate::tier::ContiguousDataTier;

#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Overrides the endpoint for S3-compatible services (MinIO, R2, ...).
    pub endpoint_url: Option<String>,
    /// Prefix prepended to the object key, e.g. `"data/"`.
    pub key_prefix: String,
}

/// Object-store retrieval tier. Objects are keyed by the content
/// identifier's wire string under `key_prefix`; this tier is always
/// `trusted` since the bucket is an operator-configured store, never
/// `verified` since the object store performs no Merkle validation.
pub struct S3Tier {
    client: Client,
    bucket: String,
    key_prefix: String,
}

impl S3Tier {
    pub async fn new(config: S3Config) -> Result<Self, TierError> {
        let credentials = Credentials::new(
            config.access_key_id,
            config.secret_access_key,
            None,
            None,
            "gateway-s3-tier",
        );

        let mut builder = aws_config::defaults(BehaviorVersion::latest())
            .region(AwsRegion::new(config.region))
            .credentials_provider(credentials);
        if let Some(endpoint) = config.endpoint_url {
            builder = builder.endpoint_url(endpoint);
        }
        let aws_config = builder.load().await;

        Ok(Self {
            client: Client::new(&aws_config),
            bucket: config.bucket,
            key_prefix: config.key_prefix,
        })
    }

    fn object_key(&self, id: &gateway_core::Identifier) -> String {
        format!("{}{}", self.key_prefix, id.to_wire_string())
    }
}

#[async_trait]
impl ContiguousDataTier for S3Tier {
    async fn fetch(
        &self,
        req: &DataRequest,
        _cancel: CancellationToken,
    ) -> Result<ContiguousData, TierError> {
        let key = self.object_key(&req.id);
        let mut get = self.client.get_object().bucket(&self.bucket).key(&key);
        if let Some(region) = req.region {
            get = get.range(format!("bytes={}-{}", region.offset, region.end_inclusive()));
        }

        let response = get.send().await.map_err(|e| {
            if matches!(&e, aws_sdk_s3::error::SdkError::ServiceError(se) if se.err().is_no_such_key()) {
                TierError::NotFound {
                    tier: self.name().to_string(),
                }
            } else {
                TierError::Transient {
                    tier: self.name().to_string(),
                    message: e.to_string(),
                }
            }
        })?;

        let content_type = response.content_type().map(|s| s.to_string());
        let body = response
            .body
            .collect()
            .await
            .map_err(|e| TierError::Transient {
                tier: self.name().to_string(),
                message: e.to_string(),
            })?
            .into_bytes();

        Ok(ContiguousData::from_bytes(body, content_type, false, true, false))
    }

    fn name(&self) -> &str {
        "s3"
    }
}
