//! Signed URL tokens for the Local bucket.
//!
//! The token is plain JSON carried in the `signed` query parameter. It is
//! time-boxed and operation-typed but carries no integrity tag, so anyone who
//! can construct the JSON can mint a URL. Deployments that need authenticated
//! URLs use the S3 backend.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use super::Operation;
use crate::datetime;
use crate::{ArborError, Result};

/// Query parameter holding the token.
pub const SIGNED_PARAM: &str = "signed";

/// Contents of a Local signed URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedPayload {
    pub operation: Operation,
    pub key: String,
    /// Expiry, in milliseconds since the Unix epoch.
    pub expires: i64,
}

impl SignedPayload {
    /// A token for `operation` on `key`, valid for `ttl` from now.
    pub fn issue(operation: Operation, key: impl Into<String>, ttl: Duration) -> Self {
        Self::issue_at(operation, key, ttl, Utc::now())
    }

    pub fn issue_at(
        operation: Operation,
        key: impl Into<String>,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        let ttl_millis = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        Self {
            operation,
            key: key.into(),
            expires: datetime::to_millis(&now).saturating_add(ttl_millis),
        }
    }

    /// Render as a URL under `base`.
    pub fn to_url(&self, base: &Url) -> Result<String> {
        let json = serde_json::to_string(self)
            .map_err(|e| ArborError::MalformedSignature(e.to_string()))?;
        let mut url = base.clone();
        url.query_pairs_mut().append_pair(SIGNED_PARAM, &json);
        Ok(url.to_string())
    }

    /// Parse the token out of a full URL.
    pub fn from_url(url: &str) -> Result<Self> {
        let url = Url::parse(url).map_err(|e| ArborError::MalformedSignature(e.to_string()))?;
        let (_, signed) = url
            .query_pairs()
            .find(|(name, _)| name == SIGNED_PARAM)
            .ok_or_else(|| {
                ArborError::MalformedSignature(format!("missing '{SIGNED_PARAM}' parameter"))
            })?;
        Self::from_query(&signed)
    }

    /// Parse the decoded value of the `signed` parameter.
    pub fn from_query(value: &str) -> Result<Self> {
        serde_json::from_str(value).map_err(|e| ArborError::MalformedSignature(e.to_string()))
    }

    /// Check the token against the requested operation and return its key.
    pub fn validate(&self, requested: Operation) -> Result<&str> {
        self.validate_at(requested, Utc::now())
    }

    /// Like [`validate`](Self::validate) with an explicit clock.
    ///
    /// The operation is checked before expiry.
    pub fn validate_at(&self, requested: Operation, now: DateTime<Utc>) -> Result<&str> {
        if self.operation != requested {
            return Err(ArborError::OperationMismatch {
                expected: self.operation,
                actual: requested,
            });
        }
        if datetime::to_millis(&now) > self.expires {
            return Err(ArborError::Expired);
        }
        Ok(&self.key)
    }
}
