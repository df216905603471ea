//! S3-compatible object storage backend

use super::Credentials;
use anyhow::{Context, Result};
use aws_sdk_s3 as s3;
use s3::config::{BehaviorVersion, Region};
use s3::primitives::ByteStream;
use s3::types::{CompletedMultipartUpload, CompletedPart};
use std::path::Path;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};
use url::Url;

/// Objects at or above this size go through multipart upload
pub const MULTIPART_THRESHOLD: u64 = 16 * 1024 * 1024;
const MAX_PARTS: u64 = 10_000;
/// Used when an endpoint override is given without a region
const FALLBACK_REGION: &str = "us-east-1";

#[derive(Debug, Clone, Default)]
pub struct S3Backend;

impl S3Backend {
    pub fn new() -> Self {
        Self
    }

    pub async fn push(
        &self,
        creds: &Credentials,
        destination: &Url,
        remote_name: &str,
        local_path: &Path,
    ) -> Result<u64> {
        let bucket = bucket_name(destination)?;
        let key = object_key(destination, Some(remote_name));
        let size = tokio::fs::metadata(local_path)
            .await
            .with_context(|| format!("Failed to stat {}", local_path.display()))?
            .len();

        let client = build_client(creds).await;
        info!("Uploading {} bytes to s3://{}/{}", size, bucket, key);

        if size < MULTIPART_THRESHOLD {
            let body = ByteStream::from_path(local_path).await.with_context(|| {
                format!("Failed to create ByteStream from file: {}", local_path.display())
            })?;
            client
                .put_object()
                .bucket(&bucket)
                .key(&key)
                .body(body)
                .send()
                .await
                .with_context(|| format!("Failed to upload to s3://{}/{}", bucket, key))?;
        } else {
            upload_multipart(&client, &bucket, &key, local_path, size).await?;
        }

        Ok(size)
    }

    pub async fn pull(&self, creds: &Credentials, source: &Url, local_path: &Path) -> Result<u64> {
        let bucket = bucket_name(source)?;
        let key = object_key(source, None);
        let client = build_client(creds).await;

        debug!("Downloading s3://{}/{} to {}", bucket, key, local_path.display());

        let mut object = client
            .get_object()
            .bucket(&bucket)
            .key(&key)
            .send()
            .await
            .with_context(|| format!("Failed to get object s3://{}/{}", bucket, key))?;

        let mut output = tokio::fs::File::create(local_path)
            .await
            .with_context(|| format!("Failed to create destination file: {}", local_path.display()))?;

        let mut total = 0u64;
        while let Some(chunk) = object
            .body
            .try_next()
            .await
            .with_context(|| format!("Failed reading body of s3://{}/{}", bucket, key))?
        {
            output
                .write_all(&chunk)
                .await
                .with_context(|| format!("Failed to write {}", local_path.display()))?;
            total += chunk.len() as u64;
        }
        output.flush().await?;

        Ok(total)
    }
}

/// Bucket is the URL host
pub fn bucket_name(url: &Url) -> Result<String> {
    url.host_str()
        .filter(|h| !h.is_empty())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("S3 url has no bucket: {}", url))
}

/// Object key from the URL path, optionally joined with a file name, never with a leading `/`
pub fn object_key(url: &Url, file_name: Option<&str>) -> String {
    let prefix = url.path().trim_matches('/');
    match file_name {
        Some(name) if prefix.is_empty() => name.to_string(),
        Some(name) => format!("{}/{}", prefix, name),
        None => prefix.to_string(),
    }
}

/// Part size for an object of `size` bytes, staying under the part count limit
pub fn part_size(size: u64) -> u64 {
    MULTIPART_THRESHOLD.max(size.div_ceil(MAX_PARTS))
}

async fn build_client(creds: &Credentials) -> s3::Client {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());

    match (&creds.s3_region, &creds.s3_endpoint) {
        (Some(region), _) => loader = loader.region(Region::new(region.clone())),
        (None, Some(_)) => loader = loader.region(Region::new(FALLBACK_REGION)),
        (None, None) => {}
    }

    if let (Some(key_id), Some(secret)) = (&creds.s3_access_key_id, &creds.s3_secret_access_key) {
        loader = loader.credentials_provider(s3::config::Credentials::new(
            key_id, secret, None, None, "Static",
        ));
    }

    let sdk_config = loader.load().await;
    let mut builder = s3::config::Builder::from(&sdk_config);
    if let Some(endpoint) = &creds.s3_endpoint {
        builder = builder.endpoint_url(endpoint).force_path_style(true);
    }

    s3::Client::from_conf(builder.build())
}

async fn upload_multipart(
    client: &s3::Client,
    bucket: &str,
    key: &str,
    local_path: &Path,
    size: u64,
) -> Result<()> {
    let chunk_size = part_size(size);
    info!(
        "Starting multipart upload of {} ({} parts)",
        key,
        size.div_ceil(chunk_size)
    );

    let multipart = client
        .create_multipart_upload()
        .bucket(bucket)
        .key(key)
        .send()
        .await
        .context("Failed to initiate multipart upload")?;
    let upload_id = multipart
        .upload_id()
        .ok_or_else(|| anyhow::anyhow!("No upload ID returned"))?
        .to_string();

    match upload_parts(client, bucket, key, &upload_id, local_path, chunk_size).await {
        Ok(parts) => {
            client
                .complete_multipart_upload()
                .bucket(bucket)
                .key(key)
                .upload_id(&upload_id)
                .multipart_upload(
                    CompletedMultipartUpload::builder()
                        .set_parts(Some(parts))
                        .build(),
                )
                .send()
                .await
                .context("Failed to complete multipart upload")?;
            Ok(())
        }
        Err(e) => {
            if let Err(abort_err) = client
                .abort_multipart_upload()
                .bucket(bucket)
                .key(key)
                .upload_id(&upload_id)
                .send()
                .await
            {
                warn!("Failed to abort multipart upload {}: {}", upload_id, abort_err);
            }
            Err(e)
        }
    }
}

async fn upload_parts(
    client: &s3::Client,
    bucket: &str,
    key: &str,
    upload_id: &str,
    local_path: &Path,
    chunk_size: u64,
) -> Result<Vec<CompletedPart>> {
    let file = tokio::fs::File::open(local_path)
        .await
        .with_context(|| format!("Failed to open {}", local_path.display()))?;
    let mut reader = BufReader::new(file);
    let mut parts = Vec::new();
    let mut part_number = 1;

    loop {
        let mut buffer = Vec::with_capacity(chunk_size as usize);
        let read = (&mut reader)
            .take(chunk_size)
            .read_to_end(&mut buffer)
            .await
            .context("Failed to read file chunk")?;
        if read == 0 {
            break;
        }

        debug!("Uploading part {} ({} bytes)", part_number, read);
        let uploaded = client
            .upload_part()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .body(ByteStream::from(buffer))
            .send()
            .await
            .with_context(|| format!("Failed to upload part {}", part_number))?;

        parts.push(
            CompletedPart::builder()
                .part_number(part_number)
                .set_e_tag(uploaded.e_tag().map(str::to_string))
                .build(),
        );
        part_number += 1;
    }

    Ok(parts)
}
