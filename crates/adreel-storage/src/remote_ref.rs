//! Remote object references.

use std::fmt;

use url::Url;

use crate::error::{StorageError, StorageResult};

/// Bucket and key of an object.
///
/// Accepted spellings:
/// - `s3://bucket/path/to/key`
/// - `https://bucket.s3.<region>.amazonaws.com/path/to/key` (virtual-hosted
///   style, bucket is the first host label)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRef {
    pub bucket: String,
    pub key: String,
}

impl RemoteRef {
    pub fn parse(value: &str) -> StorageResult<Self> {
        let url = Url::parse(value.trim())
            .map_err(|e| StorageError::invalid_url(format!("{}: {}", value, e)))?;

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| StorageError::invalid_url(format!("{}: missing host", value)))?;

        let bucket = match url.scheme() {
            "s3" => host.to_string(),
            "https" | "http" => {
                let mut labels = host.split('.');
                let bucket = labels.next().unwrap_or_default();
                if labels.next() != Some("s3") {
                    return Err(StorageError::invalid_url(format!(
                        "{}: not an S3 virtual-hosted URL",
                        value
                    )));
                }
                bucket.to_string()
            }
            other => {
                return Err(StorageError::invalid_url(format!(
                    "{}: unsupported scheme '{}'",
                    value, other
                )))
            }
        };

        let key = url.path().trim_start_matches('/');
        if key.is_empty() {
            return Err(StorageError::invalid_url(format!("{}: missing object key", value)));
        }

        let key = urlencoding::decode(key)
            .map_err(|e| StorageError::invalid_url(format!("{}: {}", value, e)))?
            .into_owned();

        Ok(Self { bucket, key })
    }

    /// File name component of the key.
    pub fn file_name(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }
}

impl fmt::Display for RemoteRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_s3_scheme() {
        let r = RemoteRef::parse("s3://media-bucket/uploads/avatar.mp4").unwrap();
        assert_eq!(r.bucket, "media-bucket");
        assert_eq!(r.key, "uploads/avatar.mp4");
        assert_eq!(r.file_name(), "avatar.mp4");
        assert_eq!(r.to_string(), "s3://media-bucket/uploads/avatar.mp4");
    }

    #[test]
    fn test_virtual_hosted_https() {
        let r = RemoteRef::parse(
            "https://media-bucket.s3.us-east-1.amazonaws.com/clips/real%20demo.mp4",
        )
        .unwrap();
        assert_eq!(r.bucket, "media-bucket");
        assert_eq!(r.key, "clips/real demo.mp4");
    }

    #[test]
    fn test_rejects_other_urls() {
        for bad in [
            "ftp://media-bucket/a.mp4",
            "https://example.com/a.mp4",
            "s3://media-bucket/",
            "not a url",
        ] {
            assert!(
                matches!(RemoteRef::parse(bad), Err(StorageError::InvalidUrl(_))),
                "{bad} should be rejected"
            );
        }
    }
}
