use crate::error::IngestError;
use crate::extractor::extract_bytes;
use crate::models::Document;
use reqwest::header::CONTENT_DISPOSITION;
use reqwest::Client;
use tracing::{debug, info};
use url::Url;

const DRIVE_HOST: &str = "drive.google.com";

/// Turns Google Drive share links into direct-download links; other
/// http(s) URLs pass through unchanged.
pub fn resolve_download_url(raw: &str) -> Result<Url, IngestError> {
    let parsed = Url::parse(raw.trim())?;

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(IngestError::InvalidArgument(format!(
            "unsupported url scheme `{}` in {raw}",
            parsed.scheme()
        )));
    }

    if parsed.host_str() != Some(DRIVE_HOST) {
        return Ok(parsed);
    }

    let file_id = drive_file_id(&parsed).ok_or_else(|| {
        IngestError::InvalidArgument(format!("no drive file id found in {raw}"))
    })?;

    let mut direct = Url::parse("https://drive.google.com/uc")?;
    direct
        .query_pairs_mut()
        .append_pair("export", "download")
        .append_pair("id", &file_id);
    Ok(direct)
}

fn drive_file_id(url: &Url) -> Option<String> {
    let segments: Vec<&str> = url.path_segments()?.collect();
    if let Some(position) = segments.iter().position(|segment| *segment == "d") {
        if let Some(id) = segments.get(position + 1).filter(|id| !id.is_empty()) {
            return Some((*id).to_string());
        }
    }

    url.query_pairs()
        .find(|(key, value)| key == "id" && !value.is_empty())
        .map(|(_, value)| value.into_owned())
}

/// File name from a `Content-Disposition` header value, if it names one.
pub fn filename_from_disposition(value: &str) -> Option<String> {
    value
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("filename="))
        .map(|name| name.trim_matches('"').trim().to_string())
        .filter(|name| !name.is_empty())
}

fn filename_from_url(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty() && *segment != "uc")
        .map(str::to_string)
        .unwrap_or_else(|| "download".to_string())
}

#[derive(Debug, Clone, Default)]
pub struct Downloader {
    client: Client,
}

impl Downloader {
    /// Single-attempt fetch of `raw_url`, extracted into a [`Document`].
    pub async fn fetch(&self, raw_url: &str) -> Result<Document, IngestError> {
        let url = resolve_download_url(raw_url)?;
        debug!(url = %url, "downloading document");

        let response = self.client.get(url.clone()).send().await?;
        if !response.status().is_success() {
            return Err(IngestError::Download {
                url: raw_url.to_string(),
                details: response.status().to_string(),
            });
        }

        let name = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .and_then(filename_from_disposition)
            .unwrap_or_else(|| filename_from_url(&url));

        let bytes = response.bytes().await?;
        info!(url = %url, name = %name, bytes = bytes.len(), "downloaded document");

        extract_bytes(&name, raw_url, &bytes)
    }
}
