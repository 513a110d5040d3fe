//! Share-link resolution against the Graph drive-item endpoint

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::error::truncate;
use crate::http::{GraphClient, GraphStatus};

use super::parser::{
    encode_sharing_url, extract_file_kind, extract_guid_from_etag, extract_guid_from_url,
    extract_site_id, find_share_links, normalize_guid,
};
use super::types::DocumentRef;

/// Subset of the drive-item document the resolver reads.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveItem {
    e_tag: Option<String>,
    web_url: Option<String>,
    remote_item: Option<Box<DriveItem>>,
}

/// Resolves SharePoint/OneDrive share URLs into [`DocumentRef`]s.
///
/// Local parsing is always tried first; the Graph `/shares` lookup only
/// runs for URL formats that do not carry the guid themselves.
pub struct LinkConverter {
    client: Arc<GraphClient>,
}

impl LinkConverter {
    pub fn new(client: Arc<GraphClient>) -> Self {
        Self { client }
    }

    /// Scans free text for share links and resolves the first one found.
    pub async fn resolve_text(&self, text: &str) -> Option<DocumentRef> {
        let links = find_share_links(text);
        let first = links.first()?;
        self.resolve_url(first).await
    }

    /// Resolves a share URL into a full document reference.
    pub async fn resolve_url(&self, url: &str) -> Option<DocumentRef> {
        let guid = match extract_guid_from_url(url) {
            Some(guid) => {
                debug!(url, "share url resolved locally");
                guid
            }
            None => self.guid_from_url(url).await?,
        };
        Some(DocumentRef {
            guid,
            site_id: extract_site_id(url),
            source_url: Some(url.to_string()),
            file_type: extract_file_kind(url),
        })
    }

    /// Looks the share URL up through Graph and extracts the document guid
    /// from the returned drive item. A `remoteItem`, when present, is the
    /// authoritative record and replaces the wrapper wholesale.
    pub async fn guid_from_url(&self, url: &str) -> Option<String> {
        let path = format!("/shares/{}/driveItem", encode_sharing_url(url));
        let response = self.client.get(&path, &[]).await;
        if response.status != GraphStatus::Code(200) {
            warn!(
                url,
                status = ?response.status,
                body = %truncate(&response.body, 400),
                "share lookup failed"
            );
            return None;
        }

        let Some(item) = response.json::<DriveItem>() else {
            warn!(url, "share lookup returned an unparseable drive item");
            return None;
        };
        let item = match item.remote_item {
            Some(remote) => *remote,
            None => item,
        };

        if let Some(guid) = item.web_url.as_deref().and_then(guid_from_web_url) {
            return Some(guid);
        }
        if let Some(guid) = item.e_tag.as_deref().and_then(extract_guid_from_etag) {
            return Some(guid);
        }
        warn!(url, "drive item carries no recognizable document guid");
        None
    }
}

/// Reads the `sourcedoc` parameter off a drive item's `webUrl`. Graph
/// already reports the guid in its stored casing, so only braces are
/// stripped here.
fn guid_from_web_url(web_url: &str) -> Option<String> {
    let parsed = Url::parse(web_url).ok()?;
    let sourcedoc = parsed
        .query_pairs()
        .find(|(key, _)| key == "sourcedoc")
        .map(|(_, value)| value.into_owned())?;
    normalize_guid(&sourcedoc)
}
