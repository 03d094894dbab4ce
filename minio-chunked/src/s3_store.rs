use std::env;
use std::time::Duration;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream as AwsByteStream;
use aws_sdk_s3::types::{
    BucketLocationConstraint, CompletedMultipartUpload, CompletedPart, CreateBucketConfiguration,
    Delete, ObjectIdentifier,
};
use aws_sdk_s3::Client;
use futures::StreamExt;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    BlobError, BlobResult, BlobStore, BucketInfo, ByteRange, ByteStream, ComposeSource,
    DeleteFailure, DeleteStream, EntryStream, ManagedBlobStore, ObjectEntry, ObjectPut, ObjectStat,
    WriteResponse,
};

/// S3 caps a single DeleteObjects request at this many keys
const DELETE_BATCH_SIZE: usize = 1000;

const DEFAULT_REGION: &str = "us-east-1";

/// Failures detected by the store itself rather than reported by S3
#[derive(Error, Debug)]
pub enum S3StoreError {
    #[error("compose needs at least one source")]
    NoSources,

    #[error("multipart upload for {bucket}/{object} returned no upload id")]
    MissingUploadId { bucket: String, object: String },

    #[error("part copy {part} for {bucket}/{object} returned no etag")]
    MissingPartEtag {
        bucket: String,
        object: String,
        part: i32,
    },
}

/// Connection settings for an S3-compatible endpoint
#[derive(Debug, Clone)]
pub struct S3Config {
    pub endpoint_url: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    /// MinIO and RustFS need path-style bucket addressing
    pub force_path_style: bool,
}

impl S3Config {
    pub fn new<E, A, S>(endpoint_url: E, access_key: A, secret_key: S) -> Self
    where
        E: Into<String>,
        A: Into<String>,
        S: Into<String>,
    {
        Self {
            endpoint_url: endpoint_url.into(),
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            region: DEFAULT_REGION.to_string(),
            force_path_style: true,
        }
    }

    /// Read `MINIO_UTIL_URL`, `MINIO_UTIL_ACCESS_KEY`, `MINIO_UTIL_SECRET_KEY`
    /// and the optional `MINIO_UTIL_REGION`
    pub fn from_env() -> BlobResult<Self> {
        fn get_env(key: &str) -> BlobResult<String> {
            env::var(key)
                .map_err(|_| BlobError::invalid(format!("{} environment variable required", key)))
        }

        let mut config = Self::new(
            get_env("MINIO_UTIL_URL")?,
            get_env("MINIO_UTIL_ACCESS_KEY")?,
            get_env("MINIO_UTIL_SECRET_KEY")?,
        );
        if let Ok(region) = env::var("MINIO_UTIL_REGION") {
            config = config.with_region(region);
        }
        Ok(config)
    }

    pub fn with_region<S: Into<String>>(mut self, region: S) -> Self {
        self.region = region.into();
        self
    }

    pub fn virtual_hosted_style(mut self) -> Self {
        self.force_path_style = false;
        self
    }
}

/// Store backed by any S3-compatible service (MinIO, RustFS, AWS S3)
#[derive(Clone)]
pub struct S3CompatibleStore {
    client: Client,
    region: String,
}

impl S3CompatibleStore {
    pub async fn new(config: S3Config) -> Self {
        let region = config.region.clone();
        let client = Self::create_client(config).await;
        Self { client, region }
    }

    pub async fn from_env() -> BlobResult<Self> {
        Ok(Self::new(S3Config::from_env()?).await)
    }

    /// Wrap an already configured client
    pub fn from_client(client: Client, region: String) -> Self {
        Self { client, region }
    }

    async fn create_client(config: S3Config) -> Client {
        let credentials = Credentials::new(
            config.access_key,
            config.secret_key,
            None,
            None,
            "minio-util",
        );

        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region))
            .credentials_provider(credentials)
            .endpoint_url(config.endpoint_url)
            .load()
            .await;

        Client::from_conf(
            aws_sdk_s3::config::Builder::from(&aws_config)
                .force_path_style(config.force_path_style)
                .build(),
        )
    }

    async fn collect_stream(stream: &mut ByteStream) -> BlobResult<Vec<u8>> {
        let mut data = Vec::new();
        while let Some(chunk) = stream.next().await {
            data.extend_from_slice(&chunk?);
        }
        Ok(data)
    }

    fn map_aws_error(err: impl std::error::Error + Send + Sync + 'static) -> BlobError {
        BlobError::backend(err)
    }

    fn copy_source(source: &ComposeSource) -> String {
        format!("{}/{}", source.bucket, urlencoding::encode(&source.object))
    }

    fn to_chrono(dt: &aws_sdk_s3::primitives::DateTime) -> Option<chrono::DateTime<chrono::Utc>> {
        chrono::DateTime::from_timestamp(dt.secs(), dt.subsec_nanos())
    }

    async fn compose_multipart(
        &self,
        bucket: &str,
        object: &str,
        upload_id: &str,
        sources: &[ComposeSource],
    ) -> BlobResult<WriteResponse> {
        let mut parts = Vec::with_capacity(sources.len());
        for (index, source) in sources.iter().enumerate() {
            let part_number = index as i32 + 1;
            let copied = self
                .client
                .upload_part_copy()
                .bucket(bucket)
                .key(object)
                .upload_id(upload_id)
                .part_number(part_number)
                .copy_source(Self::copy_source(source))
                .send()
                .await
                .map_err(Self::map_aws_error)?;
            let etag = copied
                .copy_part_result()
                .and_then(|r| r.e_tag())
                .ok_or_else(|| {
                    BlobError::backend(S3StoreError::MissingPartEtag {
                        bucket: bucket.to_string(),
                        object: object.to_string(),
                        part: part_number,
                    })
                })?;
            parts.push(
                CompletedPart::builder()
                    .part_number(part_number)
                    .e_tag(etag)
                    .build(),
            );
        }

        let completed = self
            .client
            .complete_multipart_upload()
            .bucket(bucket)
            .key(object)
            .upload_id(upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build(),
            )
            .send()
            .await
            .map_err(Self::map_aws_error)?;

        let mut response = WriteResponse::new(bucket, object);
        if let Some(etag) = completed.e_tag() {
            response = response.with_etag(etag);
        }
        if let Some(version_id) = completed.version_id() {
            response = response.with_version_id(version_id);
        }
        Ok(response)
    }
}

#[async_trait]
impl BlobStore for S3CompatibleStore {
    async fn bucket_exists(&self, bucket: &str) -> BlobResult<bool> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(err) => {
                let not_found = err.as_service_error().is_some_and(|e| e.is_not_found())
                    || err.raw_response().is_some_and(|r| r.status().as_u16() == 404);
                if not_found {
                    Ok(false)
                } else {
                    Err(Self::map_aws_error(err))
                }
            }
        }
    }

    async fn make_bucket(&self, bucket: &str) -> BlobResult<()> {
        let mut request = self.client.create_bucket().bucket(bucket);
        if self.region != DEFAULT_REGION {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }
        request.send().await.map_err(Self::map_aws_error)?;
        Ok(())
    }

    fn list_objects(&self, bucket: &str, prefix: &str, recursive: bool) -> EntryStream {
        let mut request = self.client.list_objects_v2().bucket(bucket).prefix(prefix);
        if !recursive {
            request = request.delimiter("/");
        }
        Box::pin(async_stream::stream! {
            let mut pages = request.into_paginator().send();
            while let Some(page) = pages.next().await {
                match page {
                    Ok(page) => {
                        for object in page.contents() {
                            if let Some(key) = object.key() {
                                yield Ok(ObjectEntry::object(key));
                            }
                        }
                        for common in page.common_prefixes() {
                            if let Some(dir) = common.prefix() {
                                yield Ok(ObjectEntry::dir(dir));
                            }
                        }
                    }
                    Err(err) => {
                        yield Err(Self::map_aws_error(err));
                        break;
                    }
                }
            }
        })
    }

    async fn put_object(
        &self,
        bucket: &str,
        object: &str,
        mut body: ByteStream,
        options: ObjectPut,
    ) -> BlobResult<WriteResponse> {
        let data = Self::collect_stream(&mut body).await?;
        if let Some(hint) = options.size_hint {
            if hint != data.len() as u64 {
                debug!(hint, actual = data.len(), "size hint differs from body length");
            }
        }
        let length = data.len() as i64;

        let mut request = self
            .client
            .put_object()
            .bucket(bucket)
            .key(object)
            .content_length(length)
            .body(AwsByteStream::from(data));

        if let Some(ct) = options.content_type {
            request = request.content_type(ct);
        }

        let result = request.send().await.map_err(Self::map_aws_error)?;

        let mut response = WriteResponse::new(bucket, object);
        if let Some(etag) = result.e_tag {
            response = response.with_etag(etag);
        }
        if let Some(version_id) = result.version_id {
            response = response.with_version_id(version_id);
        }
        Ok(response)
    }

    async fn compose_object(
        &self,
        bucket: &str,
        object: &str,
        sources: Vec<ComposeSource>,
    ) -> BlobResult<WriteResponse> {
        match sources.as_slice() {
            [] => Err(BlobError::backend(S3StoreError::NoSources)),
            [single] => {
                self.copy_object(&single.bucket, &single.object, bucket, object)
                    .await
            }
            _ => {
                let created = self
                    .client
                    .create_multipart_upload()
                    .bucket(bucket)
                    .key(object)
                    .send()
                    .await
                    .map_err(Self::map_aws_error)?;
                let upload_id = created
                    .upload_id()
                    .ok_or_else(|| {
                        BlobError::backend(S3StoreError::MissingUploadId {
                            bucket: bucket.to_string(),
                            object: object.to_string(),
                        })
                    })?
                    .to_string();

                match self.compose_multipart(bucket, object, &upload_id, &sources).await {
                    Ok(response) => Ok(response),
                    Err(err) => {
                        if let Err(abort_err) = self
                            .client
                            .abort_multipart_upload()
                            .bucket(bucket)
                            .key(object)
                            .upload_id(&upload_id)
                            .send()
                            .await
                        {
                            warn!(error = %abort_err, upload_id = %upload_id, "failed to abort compose upload");
                        }
                        Err(err)
                    }
                }
            }
        }
    }

    fn remove_objects(&self, bucket: &str, objects: Vec<String>) -> DeleteStream {
        let client = self.client.clone();
        let bucket = bucket.to_string();
        Box::pin(async_stream::stream! {
            for batch in objects.chunks(DELETE_BATCH_SIZE) {
                let identifiers: Result<Vec<ObjectIdentifier>, _> = batch
                    .iter()
                    .map(|key| ObjectIdentifier::builder().key(key).build())
                    .collect();
                let delete = identifiers.and_then(|ids| {
                    Delete::builder().set_objects(Some(ids)).quiet(true).build()
                });
                let delete = match delete {
                    Ok(delete) => delete,
                    Err(err) => {
                        yield Err(Self::map_aws_error(err));
                        return;
                    }
                };

                match client.delete_objects().bucket(&bucket).delete(delete).send().await {
                    Ok(output) => {
                        for error in output.errors() {
                            yield Ok(DeleteFailure {
                                object_name: error.key().unwrap_or_default().to_string(),
                                message: error.message().unwrap_or_default().to_string(),
                            });
                        }
                    }
                    Err(err) => {
                        yield Err(Self::map_aws_error(err));
                        return;
                    }
                }
            }
        })
    }
}

#[async_trait]
impl ManagedBlobStore for S3CompatibleStore {
    async fn list_buckets(&self) -> BlobResult<Vec<BucketInfo>> {
        let result = self
            .client
            .list_buckets()
            .send()
            .await
            .map_err(Self::map_aws_error)?;

        Ok(result
            .buckets()
            .iter()
            .filter_map(|b| {
                Some(BucketInfo {
                    name: b.name()?.to_string(),
                    creation_date: b.creation_date().and_then(Self::to_chrono),
                })
            })
            .collect())
    }

    async fn stat_object(&self, bucket: &str, object: &str) -> BlobResult<ObjectStat> {
        let result = self
            .client
            .head_object()
            .bucket(bucket)
            .key(object)
            .send()
            .await
            .map_err(|err| {
                if err.as_service_error().is_some_and(|e| e.is_not_found()) {
                    BlobError::not_found(format!("{}/{}", bucket, object))
                } else {
                    Self::map_aws_error(err)
                }
            })?;

        Ok(ObjectStat {
            bucket: bucket.to_string(),
            object: object.to_string(),
            size_bytes: result.content_length().unwrap_or(0) as u64,
            etag: result.e_tag().map(str::to_string),
            content_type: result.content_type().map(str::to_string),
            last_modified: result.last_modified().and_then(Self::to_chrono),
        })
    }

    async fn get_object(
        &self,
        bucket: &str,
        object: &str,
        range: Option<ByteRange>,
    ) -> BlobResult<ByteStream> {
        let header = match range {
            Some(range) => match range.to_header() {
                Some(header) => Some(header),
                None => return Ok(Box::pin(futures::stream::empty())),
            },
            None => None,
        };

        let result = self
            .client
            .get_object()
            .bucket(bucket)
            .key(object)
            .set_range(header)
            .send()
            .await
            .map_err(|err| {
                if err.as_service_error().is_some_and(|e| e.is_no_such_key()) {
                    BlobError::not_found(format!("{}/{}", bucket, object))
                } else {
                    Self::map_aws_error(err)
                }
            })?;

        let body = result.body.collect().await.map_err(Self::map_aws_error)?;
        let stream = futures::stream::once(async move { Ok(body.into_bytes()) });
        Ok(Box::pin(stream))
    }

    async fn copy_object(
        &self,
        src_bucket: &str,
        src_object: &str,
        bucket: &str,
        object: &str,
    ) -> BlobResult<WriteResponse> {
        let result = self
            .client
            .copy_object()
            .bucket(bucket)
            .key(object)
            .copy_source(Self::copy_source(&ComposeSource::new(src_bucket, src_object)))
            .send()
            .await
            .map_err(Self::map_aws_error)?;

        let mut response = WriteResponse::new(bucket, object);
        if let Some(etag) = result.copy_object_result().and_then(|r| r.e_tag()) {
            response = response.with_etag(etag);
        }
        if let Some(version_id) = result.version_id() {
            response = response.with_version_id(version_id);
        }
        Ok(response)
    }

    async fn remove_object(&self, bucket: &str, object: &str) -> BlobResult<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(object)
            .send()
            .await
            .map_err(Self::map_aws_error)?;
        Ok(())
    }

    async fn presign_get(
        &self,
        bucket: &str,
        object: &str,
        expires_in: Duration,
    ) -> BlobResult<String> {
        let presigning = PresigningConfig::expires_in(expires_in).map_err(Self::map_aws_error)?;
        let request = self
            .client
            .get_object()
            .bucket(bucket)
            .key(object)
            .presigned(presigning)
            .await
            .map_err(Self::map_aws_error)?;
        Ok(request.uri().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_to_path_style_us_east_1() {
        let config = S3Config::new("http://localhost:9000", "minioadmin", "minioadmin");
        assert!(config.force_path_style);
        assert_eq!(config.region, "us-east-1");

        let config = config.with_region("eu-west-1").virtual_hosted_style();
        assert!(!config.force_path_style);
        assert_eq!(config.region, "eu-west-1");
    }

    #[test]
    fn copy_source_encodes_object_key() {
        let source = ComposeSource::new("temp-bucket", "abc/01");
        assert_eq!(S3CompatibleStore::copy_source(&source), "temp-bucket/abc%2F01");
    }
}
