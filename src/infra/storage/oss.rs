//! Minimal OSS REST client: signed virtual-hosted `PUT` uploads.

use std::fmt;
use std::time::Instant;

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use bytes::Bytes;
use hmac::{Hmac, Mac};
use reqwest::Url;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, DATE};
use sha1::Sha1;
use time::{OffsetDateTime, UtcOffset, format_description::FormatItem, macros::format_description};
use tracing::{info, warn};

use crate::config::StorageSettings;

use super::{ObjectStore, StorageError};

type HmacSha1 = Hmac<Sha1>;

const HTTP_DATE_FORMAT: &[FormatItem<'static>] = format_description!(
    "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
);

/// Access key pair used to sign requests.
#[derive(Clone)]
pub struct OssCredentials {
    pub access_key_id: String,
    pub access_key_secret: String,
}

impl fmt::Debug for OssCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OssCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("access_key_secret", &"<redacted>")
            .finish()
    }
}

/// Handle to one bucket behind an OSS endpoint such as
/// `oss-cn-hangzhou.aliyuncs.com`.
#[derive(Debug, Clone)]
pub struct OssBucket {
    client: reqwest::Client,
    base_url: Url,
    bucket: String,
    credentials: OssCredentials,
}

impl OssBucket {
    pub fn new(
        endpoint: impl Into<String>,
        bucket: impl Into<String>,
        credentials: OssCredentials,
    ) -> Result<Self, StorageError> {
        let endpoint = endpoint.into();
        let bucket = bucket.into();
        let base = format!("https://{bucket}.{endpoint}/");
        let base_url = Url::parse(&base)
            .map_err(|err| StorageError::Endpoint(format!("`{base}`: {err}")))?;
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            base_url,
            bucket,
            credentials,
        })
    }

    pub fn from_settings(settings: &StorageSettings) -> Result<Self, StorageError> {
        Self::new(
            settings.endpoint.clone(),
            settings.bucket.clone(),
            OssCredentials {
                access_key_id: settings.access_key_id.clone(),
                access_key_secret: settings.access_key_secret.clone(),
            },
        )
    }

    /// Object URL with every key segment percent-encoded. The signature
    /// covers the raw key.
    fn object_url(&self, key: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.clear().extend(key.split('/'));
        }
        url
    }

    fn build_put_request(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
        now: OffsetDateTime,
    ) -> Result<reqwest::Request, StorageError> {
        let date = http_date(now)?;
        let string_to_sign = format!("PUT\n\n{content_type}\n{date}\n/{}/{key}", self.bucket);
        let signature = sign(&self.credentials.access_key_secret, &string_to_sign)?;
        let authorization = format!("OSS {}:{signature}", self.credentials.access_key_id);

        let request = self
            .client
            .put(self.object_url(key))
            .header(DATE, date)
            .header(CONTENT_TYPE, content_type)
            .header(AUTHORIZATION, authorization)
            .body(body)
            .build()?;
        Ok(request)
    }
}

#[async_trait]
impl ObjectStore for OssBucket {
    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let started_at = Instant::now();
        let size = body.len();
        let request = self.build_put_request(key, body, content_type, OffsetDateTime::now_utc())?;
        let response = self.client.execute(request).await?;
        let status = response.status();

        if status.is_success() {
            info!(
                target = "infra::storage::oss",
                op = "oss::put_object",
                result = "ok",
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                bucket = %self.bucket,
                key,
                bytes = size,
                "Object uploaded"
            );
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        warn!(
            target = "infra::storage::oss",
            op = "oss::put_object",
            result = "rejected",
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            bucket = %self.bucket,
            key,
            status = status.as_u16(),
            "Object store rejected upload"
        );
        Err(StorageError::Rejected {
            key: key.to_string(),
            status: status.as_u16(),
            body,
        })
    }

    fn public_url(&self, key: &str) -> String {
        self.object_url(key).into()
    }
}

fn http_date(now: OffsetDateTime) -> Result<String, StorageError> {
    now.to_offset(UtcOffset::UTC)
        .format(HTTP_DATE_FORMAT)
        .map_err(|err| StorageError::Signing(format!("failed to format date: {err}")))
}

fn sign(secret: &str, string_to_sign: &str) -> Result<String, StorageError> {
    let mut mac = HmacSha1::new_from_slice(secret.as_bytes())
        .map_err(|err| StorageError::Signing(err.to_string()))?;
    mac.update(string_to_sign.as_bytes());
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}
