use anyhow::{anyhow, Result};
use aws_config::meta::region::RegionProviderChain;
use aws_config::BehaviorVersion;
use aws_config::Region;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use url::Url;

use crate::config::AppConfig;

#[derive(Clone)]
pub struct ObjectStorage {
    client: Client,
    bucket: String,
    public_base: Url,
}

impl ObjectStorage {
    pub async fn new(config: &AppConfig) -> Result<Self> {
        let region_provider = RegionProviderChain::first_try(Region::new(config.s3_region.clone()));
        let shared_config = aws_config::defaults(BehaviorVersion::latest())
            .region(region_provider)
            .load()
            .await;

        let mut s3_builder = aws_sdk_s3::config::Builder::from(&shared_config)
            .region(shared_config.region().cloned())
            .endpoint_url(config.s3_endpoint.clone())
            .force_path_style(true);
        if let Some(provider) = shared_config.credentials_provider() {
            s3_builder = s3_builder.credentials_provider(provider);
        }
        let s3_config = s3_builder.build();

        let client = Client::from_conf(s3_config);
        let public_base = public_base_url(
            config.media_public_base_url.as_deref(),
            &config.s3_endpoint,
            &config.s3_bucket,
        )?;

        Ok(Self {
            client,
            bucket: config.s3_bucket.clone(),
            public_base,
        })
    }

    pub async fn put_object(&self, key: &str, content_type: &str, body: Bytes) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await?;
        Ok(())
    }

    pub async fn delete_object(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await?;
        Ok(())
    }

    /// Browser-facing URL for a stored object.
    pub fn public_url(&self, key: &str) -> String {
        join_key(&self.public_base, key)
    }
}

fn public_base_url(configured: Option<&str>, endpoint: &str, bucket: &str) -> Result<Url> {
    let raw = match configured {
        Some(base) => base.to_string(),
        None => format!("{}/{}", endpoint.trim_end_matches('/'), bucket),
    };
    let raw = if raw.contains("://") {
        raw
    } else {
        format!("http://{}", raw)
    };
    let mut url = Url::parse(&raw).map_err(|err| anyhow!("invalid media base url: {}", err))?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn join_key(base: &Url, key: &str) -> String {
    base.join(key.trim_start_matches('/'))
        .map(|url| url.to_string())
        .unwrap_or_else(|_| format!("{}{}", base, key))
}

/// Content type sent to the object store, by file extension.
pub fn content_type_for(name: &str) -> &'static str {
    match crate::domain::post::extension(name).as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("mov") => "video/quicktime",
        _ => "application/octet-stream",
    }
}
