use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client,
};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use crate::{
    canvas::preview::{decode_data_url, NftMetadata},
    config::Config,
    error::{AppError, Result},
    utils::{retry_with_backoff, RetryPolicy},
};

/// Content-addressed storage for NFT images and metadata.
#[async_trait]
pub trait PinningService: Send + Sync {
    /// Pin raw bytes; returns the content identifier.
    async fn pin_file(&self, file_name: &str, bytes: Vec<u8>, mime: &str) -> Result<String>;

    /// Pin a JSON document; returns the content identifier.
    async fn pin_json(&self, name: &str, document: &Value) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NftUpload {
    pub image_uri: String,
    pub metadata_uri: String,
}

pub fn ipfs_uri(cid: &str) -> String {
    format!("ipfs://{}", cid)
}

/// Upload the preview image, then the metadata pointing at it.
pub async fn upload_complete_nft(
    pinning: &dyn PinningService,
    image_data_url: &str,
    metadata: NftMetadata,
    policy: RetryPolicy,
) -> Result<NftUpload> {
    let png = decode_data_url(image_data_url)?;
    let image_cid = retry_with_backoff("pin NFT image", policy, || {
        pinning.pin_file("pixel-art.png", png.clone(), "image/png")
    })
    .await?;
    let image_uri = ipfs_uri(&image_cid);

    let document = serde_json::to_value(metadata.with_image(image_uri.clone()))
        .map_err(|e| AppError::Internal(format!("Failed to serialize NFT metadata: {}", e)))?;
    let metadata_cid = retry_with_backoff("pin NFT metadata", policy, || {
        pinning.pin_json("pixel-art-metadata", &document)
    })
    .await?;

    let upload = NftUpload {
        image_uri,
        metadata_uri: ipfs_uri(&metadata_cid),
    };
    tracing::info!("NFT uploaded: metadata {}", upload.metadata_uri);
    Ok(upload)
}

fn ipfs_hash_from(body: &Value) -> Result<String> {
    body.get("IpfsHash")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| AppError::Storage(format!("pinning response has no IpfsHash: {}", body)))
}

/// Pinata-compatible HTTP pinning client.
#[derive(Clone, Debug)]
pub struct HttpPinning {
    base_url: String,
    jwt: Option<String>,
    client: Client,
}

impl HttpPinning {
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| AppError::Internal(format!("Pinning HTTP client init failed: {}", e)))?;
        Ok(Self {
            base_url: config.pinning_api_url.trim_end_matches('/').to_string(),
            jwt: config.pinning_jwt.clone(),
            client,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.jwt.is_some()
    }

    async fn send(&self, request: reqwest::RequestBuilder, what: &str) -> Result<String> {
        let Some(jwt) = self.jwt.as_deref() else {
            return Err(AppError::Storage("PINNING_JWT is not configured".to_string()));
        };
        let response = request
            .bearer_auth(jwt)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("{} request failed: {}", what, e)))?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Storage(format!("{} failed with {}: {}", what, status, body)));
        }
        let body: Value = response
            .json()
            .await
            .map_err(|e| AppError::Storage(format!("{} parse failed: {}", what, e)))?;
        ipfs_hash_from(&body)
    }
}

#[async_trait]
impl PinningService for HttpPinning {
    async fn pin_file(&self, file_name: &str, bytes: Vec<u8>, mime: &str) -> Result<String> {
        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(mime)
            .map_err(|e| AppError::Storage(format!("invalid mime type {}: {}", mime, e)))?;
        let form = Form::new().part("file", part);
        let request = self
            .client
            .post(format!("{}/pinning/pinFileToIPFS", self.base_url))
            .multipart(form);
        self.send(request, "pinFileToIPFS").await
    }

    async fn pin_json(&self, name: &str, document: &Value) -> Result<String> {
        let body = serde_json::json!({
            "pinataContent": document,
            "pinataMetadata": { "name": name },
        });
        let request = self
            .client
            .post(format!("{}/pinning/pinJSONToIPFS", self.base_url))
            .json(&body);
        self.send(request, "pinJSONToIPFS").await
    }
}
