//! Cloudinary upload API, signed requests only.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Utc;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use super::{ObjectStore, StoredObject};
use crate::error::AppError;

const CLOUDINARY_API_ROOT: &str = "https://api.cloudinary.com/v1_1";

/// Account details for signed uploads.
#[derive(Clone, Debug)]
pub struct CloudinaryCredentials {
    /// Cloud name, part of every API URL
    pub cloud_name: String,
    /// API key
    pub api_key: String,
    /// API secret, only used for signing
    pub api_secret: String,
    /// Folder prefix for uploaded public ids
    pub folder: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
    url: Option<String>,
    public_id: Option<String>,
    error: Option<CloudinaryError>,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: Option<String>,
    error: Option<CloudinaryError>,
}

#[derive(Debug, Deserialize)]
struct CloudinaryError {
    message: Option<String>,
}

/// Signs the given parameters: sorted `k=v` pairs joined by `&`, secret appended, SHA-256.
pub fn sign_params(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let to_sign = sorted
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");
    let mut hasher = Sha256::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Cloudinary-backed [ObjectStore].
#[derive(Clone, Debug)]
pub struct CloudinaryStore {
    http: reqwest::Client,
    credentials: CloudinaryCredentials,
    api_root: String,
}

impl CloudinaryStore {
    /// New store talking to the public Cloudinary API.
    pub fn new(http: reqwest::Client, credentials: CloudinaryCredentials) -> Self {
        Self {
            http,
            credentials,
            api_root: CLOUDINARY_API_ROOT.to_string(),
        }
    }

    /// Points the store at a different API root.
    pub fn with_api_root(mut self, api_root: &str) -> Self {
        self.api_root = api_root.trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self, action: &str) -> String {
        format!(
            "{}/{}/image/{}",
            self.api_root, self.credentials.cloud_name, action
        )
    }

    fn public_id_for(&self, key: &str) -> String {
        let key = key.trim_matches('/');
        if self.credentials.folder.is_empty() {
            key.to_string()
        } else {
            format!("{}/{}", self.credentials.folder, key)
        }
    }

    async fn signed_post<T: for<'de> Deserialize<'de>>(
        &self,
        action: &str,
        mut params: Vec<(&str, String)>,
    ) -> Result<T, AppError> {
        let timestamp = Utc::now().timestamp().to_string();
        let signature = {
            let mut signed: Vec<(&str, &str)> = params
                .iter()
                .filter(|(key, _)| *key != "file")
                .map(|(key, value)| (*key, value.as_str()))
                .collect();
            signed.push(("timestamp", timestamp.as_str()));
            sign_params(&signed, &self.credentials.api_secret)
        };
        params.push(("timestamp", timestamp));
        params.push(("api_key", self.credentials.api_key.clone()));
        params.push(("signature", signature));
        params.push(("signature_algorithm", "sha256".to_string()));

        let response = self
            .http
            .post(self.endpoint(action))
            .form(&params)
            .send()
            .await
            .map_err(|err| AppError::Storage(format!("cloudinary {action}: {err}")))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|err| AppError::Storage(format!("cloudinary {action}: {err}")))?;
        if !status.is_success() {
            return Err(AppError::Storage(format!(
                "cloudinary {action} returned {status}: {}",
                String::from_utf8_lossy(&body)
            )));
        }
        serde_json::from_slice(&body).map_err(|err| {
            AppError::Storage(format!(
                "cloudinary {action} response unreadable ({err}): {}",
                String::from_utf8_lossy(&body)
            ))
        })
    }
}

#[async_trait]
impl ObjectStore for CloudinaryStore {
    fn name(&self) -> &'static str {
        "cloudinary"
    }

    async fn put(
        &self,
        key: &str,
        bytes: &[u8],
        mime_type: &str,
    ) -> Result<StoredObject, AppError> {
        let public_id = self.public_id_for(key);
        let file = format!("data:{mime_type};base64,{}", BASE64.encode(bytes));
        let response: UploadResponse = self
            .signed_post(
                "upload",
                vec![("file", file), ("public_id", public_id.clone())],
            )
            .await?;
        if let Some(message) = response.error.and_then(|err| err.message) {
            return Err(AppError::Storage(format!("cloudinary upload: {message}")));
        }
        let url = response
            .secure_url
            .or(response.url)
            .ok_or_else(|| AppError::Storage("cloudinary upload returned no URL".to_string()))?;
        debug!("Uploaded {} to {}", public_id, url);
        Ok(StoredObject {
            url,
            provider_id: response.public_id.unwrap_or(public_id),
        })
    }

    async fn fetch(&self, object: &StoredObject) -> Result<Vec<u8>, AppError> {
        let response = self
            .http
            .get(&object.url)
            .send()
            .await
            .map_err(|err| AppError::Storage(format!("fetch {}: {err}", object.url)))?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Storage(format!(
                "fetch {} returned {status}",
                object.url
            )));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|err| AppError::Storage(format!("fetch {}: {err}", object.url)))?;
        Ok(bytes.to_vec())
    }

    async fn delete(&self, provider_id: &str) -> Result<(), AppError> {
        let response: DestroyResponse = self
            .signed_post("destroy", vec![("public_id", provider_id.to_string())])
            .await?;
        if let Some(message) = response.error.and_then(|err| err.message) {
            return Err(AppError::Storage(format!("cloudinary destroy: {message}")));
        }
        match response.result.as_deref() {
            Some("ok") | Some("not found") => Ok(()),
            other => Err(AppError::Storage(format!(
                "cloudinary destroy of {provider_id} answered {other:?}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials(folder: &str) -> CloudinaryCredentials {
        CloudinaryCredentials {
            cloud_name: "demo".to_string(),
            api_key: "key".to_string(),
            api_secret: "shh".to_string(),
            folder: folder.to_string(),
        }
    }

    #[test]
    fn signature_sorts_params_and_appends_secret() {
        let signature = sign_params(
            &[("timestamp", "1700000000"), ("public_id", "promptframe/abc")],
            "shh",
        );
        assert_eq!(
            signature,
            "6098959318145dc0ea3e32d6e7193d52551a0b1cbedf8d4685badcbdaf056f60"
        );
    }

    #[test]
    fn public_ids_carry_the_folder() {
        let store = CloudinaryStore::new(reqwest::Client::new(), credentials("promptframe"));
        assert_eq!(store.public_id_for("/abc/"), "promptframe/abc");
        let store = CloudinaryStore::new(reqwest::Client::new(), credentials(""));
        assert_eq!(store.public_id_for("abc"), "abc");
        assert_eq!(
            store.endpoint("upload"),
            "https://api.cloudinary.com/v1_1/demo/image/upload"
        );
    }
}
