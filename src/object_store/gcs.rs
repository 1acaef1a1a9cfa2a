use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, SubsecRound, Utc};
use futures::stream::{self, StreamExt};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;

use super::{
    ListPage, ListRequest, ObjectMeta, ObjectStore, ObjectStoreError, PresignOp, PresignedUrl,
};

const API_BASE: &str = "https://storage.googleapis.com/storage/v1";
const UPLOAD_BASE: &str = "https://storage.googleapis.com/upload/storage/v1";
const SIGNING_HOST: &str = "storage.googleapis.com";

/// Access tokens live for an hour; refresh with some slack.
const TOKEN_MAX_AGE: Duration = Duration::from_secs(50 * 60);

/// GCS caps V4 signed URLs at seven days.
const MAX_SIGNED_EXPIRY: Duration = Duration::from_secs(7 * 24 * 3600);

const DELETE_FAN_OUT: usize = 16;

/// Google Cloud Storage object store backend.
pub struct GcsStore {
    bucket: String,
    client: Client,
    token: tokio::sync::RwLock<Option<CachedToken>>,
    service_account: Option<ServiceAccountKey>,
}

struct CachedToken {
    value: String,
    fetched_at: Instant,
}

#[derive(Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    token_uri: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GcsObject {
    name: String,
    #[serde(default)]
    size: Option<String>,
    updated: DateTime<Utc>,
    #[serde(default)]
    content_type: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GcsListResponse {
    #[serde(default)]
    items: Vec<GcsObject>,
    #[serde(default)]
    prefixes: Vec<String>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RewriteResponse {
    done: bool,
    #[serde(default)]
    rewrite_token: Option<String>,
}

impl From<GcsObject> for ObjectMeta {
    fn from(o: GcsObject) -> Self {
        ObjectMeta {
            size: o.size.and_then(|s| s.parse().ok()).unwrap_or(0),
            key: o.name,
            last_modified: o.updated,
            content_type: o.content_type,
        }
    }
}

impl GcsStore {
    pub async fn new(bucket: &str, credentials_file: Option<&str>) -> Result<Self, anyhow::Error> {
        let client = Client::builder().build()?;

        let service_account = match credentials_file {
            Some(path) => {
                let key_json = tokio::fs::read_to_string(path).await?;
                Some(serde_json::from_str::<ServiceAccountKey>(&key_json)?)
            }
            None => None,
        };

        let store = Self {
            bucket: bucket.to_string(),
            client,
            token: tokio::sync::RwLock::new(None),
            service_account,
        };

        // Fail fast on bad credentials rather than on the first request.
        store.access_token().await?;
        Ok(store)
    }

    async fn access_token(&self) -> Result<String, ObjectStoreError> {
        if let Some(cached) = self.token.read().await.as_ref() {
            if cached.fetched_at.elapsed() < TOKEN_MAX_AGE {
                return Ok(cached.value.clone());
            }
        }

        let mut lock = self.token.write().await;
        // Another task may have refreshed while we waited for the lock.
        if let Some(cached) = lock.as_ref() {
            if cached.fetched_at.elapsed() < TOKEN_MAX_AGE {
                return Ok(cached.value.clone());
            }
        }

        let value = match self.service_account {
            Some(ref key) => self.token_from_service_account(key).await,
            None => self.token_from_metadata_server().await,
        }
        .map_err(|e| ObjectStoreError::Backend(format!("GCS authentication failed: {e}")))?;

        tracing::debug!("Refreshed GCS access token");
        *lock = Some(CachedToken {
            value: value.clone(),
            fetched_at: Instant::now(),
        });
        Ok(value)
    }

    async fn token_from_service_account(
        &self,
        key: &ServiceAccountKey,
    ) -> Result<String, anyhow::Error> {
        let now = Utc::now().timestamp();
        let claims = serde_json::json!({
            "iss": key.client_email,
            "scope": "https://www.googleapis.com/auth/devstorage.read_write",
            "aud": key.token_uri,
            "iat": now,
            "exp": now + 3600,
        });

        // Build JWT (header.claims.signature)
        let header = base64_url_encode(&serde_json::to_vec(&serde_json::json!({
            "alg": "RS256",
            "typ": "JWT"
        }))?);
        let payload = base64_url_encode(&serde_json::to_vec(&claims)?);
        let unsigned = format!("{header}.{payload}");

        let signature = sign_rs256(unsigned.as_bytes(), &key.private_key)?;
        let jwt = format!("{unsigned}.{}", base64_url_encode(&signature));

        let resp: TokenResponse = self
            .client
            .post(&key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", &jwt),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(resp.access_token)
    }

    async fn token_from_metadata_server(&self) -> Result<String, anyhow::Error> {
        let resp: TokenResponse = self
            .client
            .get("http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token")
            .header("Metadata-Flavor", "Google")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(resp.access_token)
    }

    fn object_url(&self, key: &str) -> String {
        format!(
            "{API_BASE}/b/{}/o/{}",
            self.bucket,
            urlencoding::encode(key)
        )
    }

    fn upload_url(&self, key: &str) -> String {
        format!(
            "{UPLOAD_BASE}/b/{}/o?uploadType=media&name={}",
            self.bucket,
            urlencoding::encode(key)
        )
    }

    fn rewrite_url(&self, source: &str, dest: &str) -> String {
        format!(
            "{API_BASE}/b/{bucket}/o/{}/rewriteTo/b/{bucket}/o/{}",
            urlencoding::encode(source),
            urlencoding::encode(dest),
            bucket = self.bucket,
        )
    }

    /// Build a V4 signed URL (`GOOG4-RSA-SHA256`) for one object.
    fn sign_v4(
        &self,
        op: &PresignOp,
        key: &str,
        expires_in: Duration,
    ) -> Result<PresignedUrl, ObjectStoreError> {
        let account = self.service_account.as_ref().ok_or_else(|| {
            ObjectStoreError::Unsupported(
                "signed URLs require GCS_CREDENTIALS_FILE to be set".to_string(),
            )
        })?;

        let now = Utc::now().trunc_subsecs(0);
        let datetime = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();
        let scope = format!("{date}/auto/storage/goog4_request");
        let expires = expires_in.min(MAX_SIGNED_EXPIRY).as_secs();
        let expires_at = now + chrono::Duration::seconds(expires as i64);

        let (method, canonical_headers, signed_headers) = match op {
            PresignOp::Get => ("GET", format!("host:{SIGNING_HOST}\n"), "host"),
            PresignOp::Put { content_type } => (
                "PUT",
                format!("content-type:{content_type}\nhost:{SIGNING_HOST}\n"),
                "content-type;host",
            ),
        };

        let canonical_uri = format!(
            "/{}/{}",
            self.bucket,
            key.split('/')
                .map(|segment| urlencoding::encode(segment).into_owned())
                .collect::<Vec<_>>()
                .join("/")
        );

        // Parameter names are already in sorted order.
        let credential = format!("{}/{scope}", account.client_email);
        let query = format!(
            "X-Goog-Algorithm=GOOG4-RSA-SHA256&X-Goog-Credential={}&X-Goog-Date={datetime}&X-Goog-Expires={expires}&X-Goog-SignedHeaders={}",
            urlencoding::encode(&credential),
            urlencoding::encode(signed_headers),
        );

        let canonical_request = format!(
            "{method}\n{canonical_uri}\n{query}\n{canonical_headers}\n{signed_headers}\nUNSIGNED-PAYLOAD"
        );
        let digest = ring::digest::digest(&ring::digest::SHA256, canonical_request.as_bytes());
        let string_to_sign = format!(
            "GOOG4-RSA-SHA256\n{datetime}\n{scope}\n{}",
            hex::encode(digest.as_ref())
        );

        let signature = sign_rs256(string_to_sign.as_bytes(), &account.private_key)
            .map_err(|e| ObjectStoreError::Backend(e.to_string()))?;

        let url = format!(
            "https://{SIGNING_HOST}{canonical_uri}?{query}&X-Goog-Signature={}",
            hex::encode(signature)
        );
        Ok(PresignedUrl { url, expires_at })
    }
}

/// Turn a non-success response into a backend error, keeping the body for diagnosis.
async fn check(resp: Response, action: &str) -> Result<Response, ObjectStoreError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    Err(ObjectStoreError::Backend(format!(
        "GCS {action} failed ({status}): {body}"
    )))
}

fn transport(e: reqwest::Error) -> ObjectStoreError {
    ObjectStoreError::Backend(e.to_string())
}

#[async_trait]
impl ObjectStore for GcsStore {
    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), ObjectStoreError> {
        let token = self.access_token().await?;

        let resp = self
            .client
            .post(self.upload_url(key))
            .bearer_auth(&token)
            .header("Content-Type", content_type)
            .body(data)
            .send()
            .await
            .map_err(transport)?;

        check(resp, "upload").await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, ObjectStoreError> {
        let token = self.access_token().await?;

        let resp = self
            .client
            .get(format!("{}?alt=media", self.object_url(key)))
            .bearer_auth(&token)
            .send()
            .await
            .map_err(transport)?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(ObjectStoreError::NotFound(key.to_string()));
        }

        check(resp, "download").await?.bytes().await.map_err(transport)
    }

    async fn head(&self, key: &str) -> Result<ObjectMeta, ObjectStoreError> {
        let token = self.access_token().await?;

        let resp = self
            .client
            .get(self.object_url(key))
            .bearer_auth(&token)
            .send()
            .await
            .map_err(transport)?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(ObjectStoreError::NotFound(key.to_string()));
        }

        let object: GcsObject = check(resp, "metadata")
            .await?
            .json()
            .await
            .map_err(transport)?;
        Ok(object.into())
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        let token = self.access_token().await?;

        let resp = self
            .client
            .delete(self.object_url(key))
            .bearer_auth(&token)
            .send()
            .await
            .map_err(transport)?;

        // 404 is fine -- object already gone
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        check(resp, "delete").await?;
        Ok(())
    }

    async fn delete_many(&self, keys: &[String]) -> Vec<(String, Result<(), ObjectStoreError>)> {
        stream::iter(keys.to_vec())
            .map(|key| async move {
                let result = self.delete(&key).await;
                (key, result)
            })
            .buffered(DELETE_FAN_OUT)
            .collect()
            .await
    }

    async fn copy(&self, source: &str, dest: &str) -> Result<(), ObjectStoreError> {
        let mut rewrite_token: Option<String> = None;

        // Large or cross-location objects take several rewrite calls.
        loop {
            let token = self.access_token().await?;
            let mut request = self
                .client
                .post(self.rewrite_url(source, dest))
                .bearer_auth(&token)
                .header("Content-Length", "0");
            if let Some(ref rt) = rewrite_token {
                request = request.query(&[("rewriteToken", rt)]);
            }

            let resp = request.send().await.map_err(transport)?;
            if resp.status() == StatusCode::NOT_FOUND {
                return Err(ObjectStoreError::NotFound(source.to_string()));
            }

            let body: RewriteResponse = check(resp, "copy")
                .await?
                .json()
                .await
                .map_err(transport)?;
            if body.done {
                return Ok(());
            }
            rewrite_token = body.rewrite_token;
            if rewrite_token.is_none() {
                return Err(ObjectStoreError::Backend(
                    "GCS rewrite incomplete without a rewrite token".to_string(),
                ));
            }
        }
    }

    async fn list(&self, request: &ListRequest) -> Result<ListPage, ObjectStoreError> {
        let token = self.access_token().await?;

        let mut query: Vec<(&str, String)> = vec![("prefix", request.prefix.clone())];
        if let Some(d) = request.delimiter {
            query.push(("delimiter", d.to_string()));
        }
        if let Some(ref page_token) = request.continuation {
            query.push(("pageToken", page_token.clone()));
        }
        if let Some(max) = request.max_keys {
            query.push(("maxResults", max.to_string()));
        }

        let resp = self
            .client
            .get(format!("{API_BASE}/b/{}/o", self.bucket))
            .bearer_auth(&token)
            .query(&query)
            .send()
            .await
            .map_err(transport)?;

        let body: GcsListResponse = check(resp, "list")
            .await?
            .json()
            .await
            .map_err(transport)?;

        Ok(ListPage {
            common_prefixes: body.prefixes,
            objects: body.items.into_iter().map(ObjectMeta::from).collect(),
            next_continuation: body.next_page_token,
        })
    }

    async fn presign(
        &self,
        op: &PresignOp,
        key: &str,
        expires_in: Duration,
    ) -> Result<PresignedUrl, ObjectStoreError> {
        self.sign_v4(op, key, expires_in)
    }
}

fn base64_url_encode(data: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(data)
}

fn sign_rs256(data: &[u8], private_key_pem: &str) -> Result<Vec<u8>, anyhow::Error> {
    // Strip PEM headers and decode base64
    let der_b64: String = private_key_pem
        .lines()
        .filter(|line| !line.starts_with("-----"))
        .collect();
    let der = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, &der_b64)?;

    let key_pair = ring::signature::RsaKeyPair::from_pkcs8(&der)
        .map_err(|e| anyhow::anyhow!("Failed to parse RSA key: {e}"))?;

    let mut signature = vec![0u8; key_pair.public().modulus_len()];
    key_pair
        .sign(
            &ring::signature::RSA_PKCS1_SHA256,
            &ring::rand::SystemRandom::new(),
            data,
            &mut signature,
        )
        .map_err(|e| anyhow::anyhow!("Failed to sign: {e}"))?;

    Ok(signature)
}
