//! S3-compatible backend built on the AWS SDK.
//!
//! Works against AWS and S3-compatible endpoints (path-style addressing).
//! Anonymous access is used when no credentials are configured, which is
//! what public archive buckets expect.

use crate::{ListPage, ListRequest, ObjectEntry, ObjectStore, Result, StoreError};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::types::Object;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

/// Error codes S3 uses for throttling and server-side hiccups.
const TRANSIENT_CODES: &[&str] = &[
    "SlowDown",
    "Throttling",
    "ThrottlingException",
    "RequestTimeout",
    "RequestTimeTooSkewed",
    "InternalError",
    "ServiceUnavailable",
];

/// Connection settings for [`S3Store`].
#[derive(Debug, Clone)]
pub struct S3Settings {
    /// Custom endpoint (S3-compatible services); `None` uses AWS
    pub endpoint: Option<String>,
    pub region: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub bucket: String,
    pub force_path_style: bool,
}

/// S3 listing client.
pub struct S3Store {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3Store {
    /// Build a client from settings. No request is sent.
    pub async fn connect(settings: S3Settings) -> Result<Self> {
        if settings.bucket.is_empty() {
            return Err(StoreError::Config("bucket name is empty".to_string()));
        }

        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(settings.region.clone()));
        if let Some(endpoint) = &settings.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        loader = match (&settings.access_key_id, &settings.secret_access_key) {
            (Some(key), Some(secret)) => {
                loader.credentials_provider(Credentials::new(key, secret, None, None, "eoaudit"))
            }
            (None, None) => loader.no_credentials(),
            _ => {
                return Err(StoreError::Config(
                    "access key id and secret access key must be set together".to_string(),
                ))
            }
        };

        let shared = loader.load().await;
        let config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(settings.force_path_style)
            .build();

        info!(
            bucket = %settings.bucket,
            endpoint = settings.endpoint.as_deref().unwrap_or("aws"),
            region = %settings.region,
            "S3 client configured"
        );

        Ok(Self {
            client: aws_sdk_s3::Client::from_conf(config),
            bucket: settings.bucket,
        })
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn list_page(&self, request: &ListRequest) -> Result<ListPage> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(&request.prefix)
            .set_delimiter(request.delimiter.clone())
            .set_continuation_token(request.continuation.clone())
            .send()
            .await
            .map_err(|err| classify(&request.prefix, err))?;

        let common_prefixes = output
            .common_prefixes()
            .iter()
            .filter_map(|p| p.prefix().map(str::to_string))
            .collect();
        let objects = output
            .contents()
            .iter()
            .map(entry_from_sdk)
            .collect::<Result<Vec<_>>>()?;

        let next_continuation = if output.is_truncated().unwrap_or(false) {
            match output.next_continuation_token() {
                Some(token) => Some(token.to_string()),
                None => {
                    return Err(StoreError::invalid_response(format!(
                        "truncated listing for '{}' without continuation token",
                        request.prefix
                    )))
                }
            }
        } else {
            None
        };

        debug!(
            prefix = %request.prefix,
            objects = output.contents().len(),
            common_prefixes = output.common_prefixes().len(),
            truncated = next_continuation.is_some(),
            "Listed page"
        );

        Ok(ListPage {
            common_prefixes,
            objects,
            next_continuation,
        })
    }
}

fn entry_from_sdk(object: &Object) -> Result<ObjectEntry> {
    let key = object
        .key()
        .ok_or_else(|| StoreError::invalid_response("object without key"))?;
    let size = object.size().unwrap_or(0);
    let size = u64::try_from(size)
        .map_err(|_| StoreError::invalid_response(format!("negative size {} for {}", size, key)))?;
    let modified = object
        .last_modified()
        .ok_or_else(|| StoreError::invalid_response(format!("missing LastModified for {}", key)))?;
    let last_modified = DateTime::<Utc>::from_timestamp(modified.secs(), modified.subsec_nanos())
        .ok_or_else(|| StoreError::invalid_response(format!("LastModified out of range for {}", key)))?;

    Ok(ObjectEntry {
        key: key.to_string(),
        size,
        last_modified,
    })
}

fn classify<E, R>(prefix: &str, err: SdkError<E, R>) -> StoreError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let throttled = err
        .code()
        .map(|code| TRANSIENT_CODES.contains(&code))
        .unwrap_or(false);
    let transient = throttled
        || matches!(
            err,
            SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_)
        );
    let message = DisplayErrorContext(&err).to_string();

    if transient {
        StoreError::transient(prefix, message)
    } else {
        StoreError::listing(prefix, message)
    }
}
