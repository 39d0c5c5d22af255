//! Access to the Object Storage bucket holding the cost reports
#[cfg(test)]
pub(crate) mod fake;
mod location;
pub(crate) use self::location::*;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::operation::{
    get_object::GetObjectError, head_object::HeadObjectError,
    list_objects_v2::ListObjectsV2Error,
};
use aws_sdk_s3::Client;
use aws_smithy_runtime_api::client::{orchestrator::HttpResponse, result::SdkError};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;
use tokio::io::AsyncRead;

/// Maximum number of object names requested per listing page
const LIST_PAGE_SIZE: i32 = 1000;

type InnerListError = SdkError<ListObjectsV2Error, HttpResponse>;
type InnerHeadError = SdkError<HeadObjectError, HttpResponse>;
type InnerGetError = SdkError<GetObjectError, HttpResponse>;

/// A stream of the bytes of an object's content
pub(crate) type ObjectBody = Pin<Box<dyn AsyncRead + Send>>;

/// One page of a bucket listing
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct ObjectPage {
    /// The names of the objects on this page
    pub(crate) names: Vec<String>,

    /// The token to pass in order to fetch the next page.  `None` or an empty
    /// string means that this was the last page.
    pub(crate) next_start: Option<String>,
}

/// Read-only access to report objects in Object Storage
pub(crate) trait ReportStore: Send + Sync + 'static {
    /// Fetch the page of object names in `namespace`/`bucket` that follows
    /// the continuation token `start` (or the first page if `start` is
    /// `None`)
    fn list_objects(
        &self,
        namespace: &str,
        bucket: &str,
        start: Option<String>,
    ) -> impl Future<Output = Result<ObjectPage, ListObjectsError>> + Send;

    /// Retrieve the size in bytes of an object without fetching its content
    fn object_size(
        &self,
        object: &ObjectLocation,
    ) -> impl Future<Output = Result<u64, ObjectSizeError>> + Send;

    /// Open a stream of an object's content
    fn get_object(
        &self,
        object: &ObjectLocation,
    ) -> impl Future<Output = Result<ObjectBody, FetchObjectError>> + Send;
}

/// Retrieve the size of `object`, logging a warning and returning 0 on
/// failure
pub(crate) async fn size_or_zero<S: ReportStore>(store: &S, object: &ObjectLocation) -> u64 {
    match store.object_size(object).await {
        Ok(size) => size,
        Err(e) => {
            let e = anyhow::Error::from(e);
            tracing::warn!(error = ?e, %object, "Could not get object size; recording size as 0");
            0
        }
    }
}

/// Returns the Amazon S3 Compatibility API endpoint for the given Object
/// Storage namespace & region
pub(crate) fn compat_endpoint(namespace: &str, region: &str) -> String {
    format!("https://{namespace}.compat.objectstorage.{region}.oraclecloud.com")
}

/// A client for OCI Object Storage's Amazon S3 Compatibility API
#[derive(Clone, Debug)]
pub(crate) struct S3Client {
    inner: Client,
    endpoint: String,
}

impl S3Client {
    /// Construct a client for `endpoint`, signing requests for `region`.
    /// Credentials are taken from the SDK's default provider chain.
    pub(crate) async fn new(region: String, endpoint: String) -> S3Client {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region))
            .load()
            .await;
        let s3config = aws_sdk_s3::config::Builder::from(&config)
            .endpoint_url(&endpoint)
            .force_path_style(true)
            .build();
        S3Client {
            inner: Client::from_conf(s3config),
            endpoint,
        }
    }

    pub(crate) fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl ReportStore for S3Client {
    // The namespace is part of the endpoint's hostname, so it is only used
    // here for error reporting.
    async fn list_objects(
        &self,
        namespace: &str,
        bucket: &str,
        start: Option<String>,
    ) -> Result<ObjectPage, ListObjectsError> {
        let page = self
            .inner
            .list_objects_v2()
            .bucket(bucket)
            .set_continuation_token(start)
            .max_keys(LIST_PAGE_SIZE)
            .send()
            .await
            .map_err(|source| ListObjectsError {
                namespace: namespace.to_owned(),
                bucket: bucket.to_owned(),
                source: Box::new(source),
            })?;
        let names = page
            .contents
            .unwrap_or_default()
            .into_iter()
            .filter_map(|obj| obj.key)
            .collect();
        Ok(ObjectPage {
            names,
            next_start: page.next_continuation_token,
        })
    }

    async fn object_size(&self, object: &ObjectLocation) -> Result<u64, ObjectSizeError> {
        let output = self
            .inner
            .head_object()
            .bucket(object.bucket())
            .key(object.key())
            .send()
            .await
            .map_err(|source| ObjectSizeError::Head {
                object: object.clone(),
                source: Box::new(source),
            })?;
        let Some(length) = output.content_length else {
            return Err(ObjectSizeError::NoLength {
                object: object.clone(),
            });
        };
        u64::try_from(length).map_err(|_| ObjectSizeError::BadLength {
            object: object.clone(),
            length,
        })
    }

    async fn get_object(&self, object: &ObjectLocation) -> Result<ObjectBody, FetchObjectError> {
        let output = self
            .inner
            .get_object()
            .bucket(object.bucket())
            .key(object.key())
            .send()
            .await
            .map_err(|source| FetchObjectError {
                object: object.clone(),
                source: Box::new(source),
            })?;
        Ok(Box::pin(output.body.into_async_read()))
    }
}

#[derive(Debug, Error)]
#[error("failed to list objects in bucket {bucket:?} of namespace {namespace:?}")]
pub(crate) struct ListObjectsError {
    namespace: String,
    bucket: String,
    source: Box<InnerListError>,
}

#[derive(Debug, Error)]
pub(crate) enum ObjectSizeError {
    #[error("failed to get object metadata for {object}")]
    Head {
        object: ObjectLocation,
        source: Box<InnerHeadError>,
    },
    #[error("content length not available for {object}")]
    NoLength { object: ObjectLocation },
    #[error("invalid content length {length} reported for {object}")]
    BadLength { object: ObjectLocation, length: i64 },
}

#[derive(Debug, Error)]
#[error("failed to fetch {object}")]
pub(crate) struct FetchObjectError {
    object: ObjectLocation,
    source: Box<InnerGetError>,
}
