use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, LOCATION};
use reqwest::{redirect, Response};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::Duration;
use url::{Host, Url};

use crate::config::ThemeConfig;

use super::palette::{normalize_media_type, PaletteError};

/// Raw image bytes plus the media type they were declared (or detected) as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedImage {
    pub bytes: Vec<u8>,
    pub media_type: String,
}

impl FetchedImage {
    /// Builds from an upload, sniffing the bytes when the declared type is
    /// missing or the generic `application/octet-stream`.
    pub fn from_upload(bytes: Vec<u8>, declared: Option<&str>) -> Result<Self, PaletteError> {
        let media_type = resolve_media_type(&bytes, declared)?;
        Ok(Self { bytes, media_type })
    }
}

/// Where logo bytes come from when only a reference is known.
#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<FetchedImage, PaletteError>;
}

const MAX_REDIRECTS: usize = 5;

/// Fetches images over HTTP(S) with a request timeout and a size cap.
///
/// Every hop, including redirect targets, must resolve to public addresses
/// unless private hosts are explicitly allowed.
#[derive(Debug, Clone)]
pub struct HttpImageSource {
    client: reqwest::Client,
    max_bytes: usize,
    allow_private_hosts: bool,
}

impl HttpImageSource {
    pub fn new(timeout: Duration, max_bytes: usize) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(redirect::Policy::none())
            .user_agent(concat!("schoolbox-api/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            max_bytes,
            allow_private_hosts: false,
        })
    }

    pub fn from_config(theme: &ThemeConfig) -> Result<Self, reqwest::Error> {
        Ok(Self::new(Duration::from_secs(theme.fetch_timeout_secs), theme.max_image_bytes)?
            .allow_private_hosts(theme.allow_private_image_hosts))
    }

    /// Permits loopback, private and link-local targets (local development).
    pub fn allow_private_hosts(mut self, allow: bool) -> Self {
        self.allow_private_hosts = allow;
        self
    }

    async fn check_target(&self, url: &Url) -> Result<(), PaletteError> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(PaletteError::FetchFailed(format!("unsupported URL scheme '{}'", url.scheme())));
        }
        if self.allow_private_hosts {
            return Ok(());
        }

        let blocked = || PaletteError::FetchFailed("refusing to fetch from a non-public address".to_string());
        match url.host() {
            Some(Host::Ipv4(ip)) if is_public_ip(IpAddr::V4(ip)) => Ok(()),
            Some(Host::Ipv6(ip)) if is_public_ip(IpAddr::V6(ip)) => Ok(()),
            Some(Host::Domain(domain)) => {
                let port = url.port_or_known_default().unwrap_or(80);
                let addrs: Vec<_> = tokio::net::lookup_host((domain, port))
                    .await
                    .map_err(|e| PaletteError::FetchFailed(format!("could not resolve {}: {}", domain, e)))?
                    .collect();
                if addrs.is_empty() || addrs.iter().any(|addr| !is_public_ip(addr.ip())) {
                    return Err(blocked());
                }
                Ok(())
            }
            _ => Err(blocked()),
        }
    }

    /// Sends the request, following up to [`MAX_REDIRECTS`] redirects and
    /// checking each target before connecting to it.
    async fn send(&self, url: &Url) -> Result<(Url, Response), PaletteError> {
        let mut url = url.clone();
        for _ in 0..=MAX_REDIRECTS {
            self.check_target(&url).await?;

            let response = self
                .client
                .get(url.clone())
                .send()
                .await
                .map_err(|e| PaletteError::FetchFailed(e.to_string()))?;

            if !response.status().is_redirection() {
                return Ok((url, response));
            }

            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| PaletteError::FetchFailed("redirect without a Location header".to_string()))?;
            let next = url
                .join(location)
                .map_err(|e| PaletteError::FetchFailed(format!("invalid redirect target: {}", e)))?;
            tracing::debug!("Following redirect {} -> {}", url, next);
            url = next;
        }
        Err(PaletteError::FetchFailed(format!("more than {} redirects", MAX_REDIRECTS)))
    }
}

/// False for loopback, private, link-local, shared, documentation and other
/// special-purpose ranges.
pub fn is_public_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_public_v4(v4),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => is_public_v4(v4),
            None => is_public_v6(v6),
        },
    }
}

fn is_public_v4(ip: Ipv4Addr) -> bool {
    let [a, b, ..] = ip.octets();
    !(ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_broadcast()
        || ip.is_documentation()
        || ip.is_unspecified()
        || ip.is_multicast()
        || a == 0
        || a >= 240
        || (a == 100 && (b & 0xc0) == 64)
        || (a == 198 && (b & 0xfe) == 18))
}

fn is_public_v6(ip: Ipv6Addr) -> bool {
    let [s0, s1, ..] = ip.segments();
    !(ip.is_loopback()
        || ip.is_unspecified()
        || ip.is_multicast()
        || (s0 & 0xfe00) == 0xfc00
        || (s0 & 0xffc0) == 0xfe80
        || (s0 == 0x2001 && s1 == 0x0db8))
}

#[async_trait]
impl ImageSource for HttpImageSource {
    async fn fetch(&self, url: &Url) -> Result<FetchedImage, PaletteError> {
        let (url, mut response) = self.send(url).await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PaletteError::FetchFailed(format!("{} responded with {}", url, status)));
        }

        if let Some(length) = response.content_length() {
            if length as usize > self.max_bytes {
                return Err(PaletteError::FetchFailed(format!(
                    "image is {} bytes, limit is {}",
                    length, self.max_bytes
                )));
            }
        }

        let declared = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let mut bytes = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| PaletteError::FetchFailed(e.to_string()))?
        {
            if bytes.len() + chunk.len() > self.max_bytes {
                return Err(PaletteError::FetchFailed(format!("image exceeds {} byte limit", self.max_bytes)));
            }
            bytes.extend_from_slice(&chunk);
        }

        tracing::debug!("Fetched {} bytes from {} ({:?})", bytes.len(), url, declared);

        let media_type = resolve_media_type(&bytes, declared.as_deref())?;
        Ok(FetchedImage { bytes, media_type })
    }
}

/// Declared type when it is specific, otherwise whatever the magic bytes say.
pub fn resolve_media_type(bytes: &[u8], declared: Option<&str>) -> Result<String, PaletteError> {
    let essence = declared.map(normalize_media_type).unwrap_or_default();
    if !essence.is_empty() && essence != "application/octet-stream" {
        return Ok(essence);
    }

    image::guess_format(bytes)
        .map(|format| format.to_mime_type().to_string())
        .map_err(|_| PaletteError::UnsupportedMediaType("could not determine content type of image".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0, 0, 0, 0];

    #[test]
    fn keeps_specific_declared_type() {
        assert_eq!(resolve_media_type(b"", Some("image/JPEG; q=1")).unwrap(), "image/jpeg");
    }

    #[test]
    fn sniffs_when_type_is_missing_or_generic() {
        assert_eq!(resolve_media_type(PNG_MAGIC, None).unwrap(), "image/png");
        assert_eq!(
            resolve_media_type(PNG_MAGIC, Some("application/octet-stream")).unwrap(),
            "image/png"
        );
    }

    #[test]
    fn unknown_bytes_without_type_are_unsupported() {
        let err = FetchedImage::from_upload(b"plain text".to_vec(), None).unwrap_err();
        assert!(matches!(err, PaletteError::UnsupportedMediaType(_)));
    }

    #[test]
    fn classifies_special_purpose_addresses() {
        for private in ["127.0.0.1", "10.1.2.3", "172.16.0.1", "192.168.1.1", "169.254.169.254", "100.64.0.1", "0.0.0.0", "::1", "fd00::1", "fe80::1", "::ffff:127.0.0.1"] {
            assert!(!is_public_ip(private.parse().unwrap()), "{} should not be public", private);
        }
        for public in ["93.184.216.34", "8.8.8.8", "2606:4700::1111"] {
            assert!(is_public_ip(public.parse().unwrap()), "{} should be public", public);
        }
    }

    #[tokio::test]
    async fn refuses_private_targets_before_connecting() {
        let source = HttpImageSource::new(Duration::from_secs(1), 1024).unwrap();
        for target in ["http://169.254.169.254/latest/meta-data", "http://127.0.0.1:9/logo.png", "http://[::1]/x.png", "http://localhost/x.png"] {
            let err = source.fetch(&Url::parse(target).unwrap()).await.unwrap_err();
            assert!(
                matches!(&err, PaletteError::FetchFailed(msg) if msg.contains("non-public")),
                "{}: {}",
                target,
                err
            );
        }
    }

    #[tokio::test]
    async fn rejects_non_http_schemes() {
        let source = HttpImageSource::new(Duration::from_secs(1), 1024).unwrap();
        let url = Url::parse("file:///etc/passwd").unwrap();
        let err = source.fetch(&url).await.unwrap_err();
        assert!(matches!(err, PaletteError::FetchFailed(_)));
    }
}
