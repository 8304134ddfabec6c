use std::time::Duration;

use reqwest::{header, Client, Url};

use crate::error::DownloadError;
use crate::model::ResourceDescriptor;

/// Issues a HEAD request to learn the resource's size and range support. A
/// non-200 response is not an error at this layer; it is reported as an
/// unusable descriptor (`total_bytes == 0`) and the coordinator treats that
/// as fatal.
pub async fn probe(
    client: &Client,
    url: &Url,
    timeout: Option<Duration>,
) -> Result<ResourceDescriptor, DownloadError> {
    let mut request = client.head(url.clone());
    if let Some(timeout) = timeout {
        request = request.timeout(timeout);
    }

    let response = request
        .send()
        .await
        .map_err(|err| DownloadError::ProbeFailed(err.to_string()))?;

    if !response.status().is_success() {
        return Ok(ResourceDescriptor {
            total_bytes: 0,
            range_supported: false,
        });
    }

    let total_bytes = response
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(0);

    let range_supported = response
        .headers()
        .get(header::ACCEPT_RANGES)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.eq_ignore_ascii_case("bytes"))
        .unwrap_or(false);

    Ok(ResourceDescriptor {
        total_bytes,
        range_supported,
    })
}
