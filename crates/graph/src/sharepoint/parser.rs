//! Pure share-URL parsing
//!
//! Everything here is network-free string work: the Graph share encoding,
//! guid extraction from the URL formats SharePoint hands out, site and
//! file-type classification, and share-link scanning in free text. The
//! network-backed resolution built on top lives in
//! [`super::link_converter`].

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use super::types::FileKind;

static SOURCEDOC_GUID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\{?([0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12})\}?$",
    )
    .expect("pattern compiles")
});

static WD_TARGET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"target\(([^)]*)\)").expect("pattern compiles"));

static GUID_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}")
        .expect("pattern compiles")
});

static ETAG_GUID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([a-fA-F0-9\-]+)\}").expect("pattern compiles"));

static SITE_SHORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/:([a-z]):/s/([^/?]+)").expect("pattern compiles"));

static SITE_ROOTED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/:([a-z]):/r/sites/([^/?]+)").expect("pattern compiles"));

static SITE_PLAIN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/sites/([^/?]+)").expect("pattern compiles"));

static SHARE_LETTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/:([a-z]):/").expect("pattern compiles"));

static PERSONAL_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/personal/([^/]+)").expect("pattern compiles"));

static SHARE_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"https://[^/\s]+\.sharepoint\.com/[^\s]+").expect("pattern compiles")
});

/// Encodes a sharing URL the way the `/shares/{id}` endpoint expects:
/// base64url without padding, prefixed with `u!`.
#[must_use]
pub fn encode_sharing_url(url: &str) -> String {
    format!("u!{}", URL_SAFE_NO_PAD.encode(url.as_bytes()))
}

/// Extracts the document guid directly from a share URL, without touching
/// the network. Covers `sourcedoc` query parameters and OneNote `wd`
/// target expressions; anything else needs the Graph lookup.
#[must_use]
pub fn extract_guid_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    if let Some(value) = query_param(&parsed, "sourcedoc") {
        if let Some(caps) = SOURCEDOC_GUID.captures(&value) {
            return Some(caps[1].to_uppercase());
        }
    }
    if let Some(wd) = query_param(&parsed, "wd") {
        if let Some(target) = WD_TARGET.captures(&wd) {
            if let Some(token) = GUID_TOKEN.find(&target[1]) {
                return Some(token.as_str().to_uppercase());
            }
        }
    }
    None
}

/// Pulls the guid out of a drive item `eTag` value such as
/// `"{5ED33D2A-FB0A-43D8-9962-1A25D287D521},5"`.
#[must_use]
pub fn extract_guid_from_etag(etag: &str) -> Option<String> {
    ETAG_GUID
        .captures(etag)
        .map(|caps| caps[1].to_string())
}

/// Extracts the site identifier from a share URL, trying the short share
/// form, the rooted form, and the plain `/sites/` path in that order.
#[must_use]
pub fn extract_site_id(url: &str) -> Option<String> {
    if let Some(caps) = SITE_SHORT.captures(url) {
        return Some(caps[2].to_string());
    }
    if let Some(caps) = SITE_ROOTED.captures(url) {
        return Some(caps[2].to_string());
    }
    if let Some(caps) = SITE_PLAIN.captures(url) {
        return Some(caps[1].to_string());
    }
    None
}

/// Classifies a share URL by its type letter, when present.
#[must_use]
pub fn extract_file_kind(url: &str) -> Option<FileKind> {
    SHARE_LETTER
        .captures(url)
        .map(|caps| FileKind::from_share_letter(&caps[1]))
}

/// Derives the site (or personal) base URL a document lives under.
///
/// Personal OneDrive paths win over site paths, matching how mixed
/// `/personal/<user>/...` URLs must be grouped. Falls back to the bare
/// scheme + host when no recognized segment is present.
#[must_use]
pub fn extract_base_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    let origin = format!("{}://{}", parsed.scheme(), host);
    let path = parsed.path();

    if let Some(caps) = PERSONAL_PATH.captures(path) {
        return Some(format!("{}/personal/{}", origin, &caps[1]));
    }
    if let Some(caps) = SITE_SHORT.captures(path) {
        return Some(format!("{}/sites/{}", origin, &caps[2]));
    }
    if let Some(caps) = SITE_ROOTED.captures(path) {
        return Some(format!("{}/sites/{}", origin, &caps[2]));
    }
    if let Some(caps) = SITE_PLAIN.captures(path) {
        return Some(format!("{}/sites/{}", origin, &caps[1]));
    }
    Some(origin)
}

/// Finds SharePoint share links in free text, in order of appearance.
#[must_use]
pub fn find_share_links(text: &str) -> Vec<String> {
    SHARE_LINK
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Strips nested brace wrapping and surrounding whitespace from a guid
/// value. Empty results are reported as `None`.
#[must_use]
pub fn normalize_guid(value: &str) -> Option<String> {
    let mut guid = value.trim();
    while guid.len() >= 2 && guid.starts_with('{') && guid.ends_with('}') {
        guid = guid[1..guid.len() - 1].trim();
    }
    if guid.is_empty() {
        None
    } else {
        Some(guid.to_string())
    }
}

fn query_param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoding_prefixes_and_strips_padding() {
        let url = "https://contoso.sharepoint.com/:x:/s/TeamA/EwABC?e=xyz";
        let encoded = encode_sharing_url(url);

        assert!(encoded.starts_with("u!"));
        let tail = &encoded[2..];
        assert!(!tail.contains('+'));
        assert!(!tail.contains('/'));
        assert!(!tail.contains('='));
    }

    #[test]
    fn encoding_round_trips_to_the_original_url() {
        let url = "https://contoso.sharepoint.com/sites/TeamA/Shared Documents/plan.xlsx";
        let encoded = encode_sharing_url(url);

        let decoded = URL_SAFE_NO_PAD.decode(&encoded[2..]).unwrap();
        assert_eq!(String::from_utf8(decoded).unwrap(), url);
    }

    #[test]
    fn braced_sourcedoc_parameter_yields_an_uppercase_guid() {
        let url = "https://contoso.sharepoint.com/sites/TeamA/_layouts/15/Doc.aspx\
                   ?sourcedoc=%7B1DA5CF75-88CB-49E7-9596-E4F4ABDC76CF%7D&action=edit";

        assert_eq!(
            extract_guid_from_url(url),
            Some("1DA5CF75-88CB-49E7-9596-E4F4ABDC76CF".to_string())
        );
    }

    #[test]
    fn bare_lowercase_sourcedoc_is_uppercased() {
        let url = "https://contoso.sharepoint.com/sites/TeamA/_layouts/15/Doc.aspx\
                   ?sourcedoc=1da5cf75-88cb-49e7-9596-e4f4abdc76cf";

        assert_eq!(
            extract_guid_from_url(url),
            Some("1DA5CF75-88CB-49E7-9596-E4F4ABDC76CF".to_string())
        );
    }

    #[test]
    fn malformed_sourcedoc_is_rejected() {
        let url = "https://contoso.sharepoint.com/Doc.aspx?sourcedoc=not-a-guid";
        assert_eq!(extract_guid_from_url(url), None);
    }

    #[test]
    fn onenote_wd_target_yields_the_first_guid() {
        let url = "https://contoso.sharepoint.com/sites/TeamA/_layouts/OneNote.aspx\
                   ?id=%2Fsites%2FTeamA%2FNotebook\
                   &wd=target%28Planning.one%7C9bc1d502-33a8-4910-8e1f-1b2f8a4c1111%2FMeeting%20notes%7C4fa2f3b7-0001-4f00-9cde-1b2f8a4c2222%2F%29";

        assert_eq!(
            extract_guid_from_url(url),
            Some("9BC1D502-33A8-4910-8E1F-1B2F8A4C1111".to_string())
        );
    }

    #[test]
    fn urls_without_guid_parameters_need_the_lookup() {
        assert_eq!(
            extract_guid_from_url("https://contoso.sharepoint.com/:x:/s/TeamA/EwABC?e=xyz"),
            None
        );
        assert_eq!(extract_guid_from_url("not a url"), None);
    }

    #[test]
    fn etag_guid_is_extracted_from_the_braced_segment() {
        assert_eq!(
            extract_guid_from_etag("\"{5ED33D2A-FB0A-43D8-9962-1A25D287D521},5\""),
            Some("5ED33D2A-FB0A-43D8-9962-1A25D287D521".to_string())
        );
        assert_eq!(extract_guid_from_etag("no braces here"), None);
    }

    #[test]
    fn short_share_urls_yield_site_and_kind() {
        let url = "https://contoso.sharepoint.com/:x:/s/TeamA/EwABC?e=xyz";

        assert_eq!(extract_site_id(url), Some("TeamA".to_string()));
        assert_eq!(extract_file_kind(url), Some(FileKind::Excel));
    }

    #[test]
    fn rooted_share_urls_yield_the_site_after_sites() {
        let url = "https://contoso.sharepoint.com/:w:/r/sites/TeamB/Shared%20Documents/plan.docx";

        assert_eq!(extract_site_id(url), Some("TeamB".to_string()));
        assert_eq!(extract_file_kind(url), Some(FileKind::Word));
    }

    #[test]
    fn plain_site_paths_stop_at_separators() {
        let url = "https://contoso.sharepoint.com/sites/TeamC?rlid=1";

        assert_eq!(extract_site_id(url), Some("TeamC".to_string()));
        assert_eq!(extract_file_kind(url), None);
    }

    #[test]
    fn urls_without_site_segments_have_no_site_id() {
        assert_eq!(
            extract_site_id("https://contoso.sharepoint.com/Shared%20Documents/x.pdf"),
            None
        );
    }

    #[test]
    fn personal_paths_win_over_site_segments_in_base_urls() {
        let url = "https://contoso-my.sharepoint.com/personal/jane_contoso_com\
                   /Documents/sites/notes.docx";

        assert_eq!(
            extract_base_url(url),
            Some("https://contoso-my.sharepoint.com/personal/jane_contoso_com".to_string())
        );
    }

    #[test]
    fn short_share_base_url_maps_to_the_sites_path() {
        assert_eq!(
            extract_base_url("https://contoso.sharepoint.com/:x:/s/TeamA/EwABC?e=xyz"),
            Some("https://contoso.sharepoint.com/sites/TeamA".to_string())
        );
    }

    #[test]
    fn rooted_share_base_url_maps_to_the_sites_path() {
        assert_eq!(
            extract_base_url(
                "https://contoso.sharepoint.com/:b:/r/sites/TeamB/Shared%20Documents/a.pdf"
            ),
            Some("https://contoso.sharepoint.com/sites/TeamB".to_string())
        );
    }

    #[test]
    fn plain_sites_base_url_keeps_the_site_segment() {
        assert_eq!(
            extract_base_url("https://contoso.sharepoint.com/sites/TeamC/Lists/Tasks"),
            Some("https://contoso.sharepoint.com/sites/TeamC".to_string())
        );
    }

    #[test]
    fn unrecognized_paths_fall_back_to_the_origin() {
        assert_eq!(
            extract_base_url("https://contoso.sharepoint.com/Shared%20Documents/x.pdf"),
            Some("https://contoso.sharepoint.com".to_string())
        );
    }

    #[test]
    fn invalid_urls_have_no_base() {
        assert_eq!(extract_base_url("not a url"), None);
    }

    #[test]
    fn share_links_are_found_in_order() {
        let text = "See https://contoso.sharepoint.com/:x:/s/TeamA/EwABC?e=1 and\n\
                    also https://contoso.sharepoint.com/sites/TeamB/doc, but\n\
                    ignore https://example.com/other.";

        let links = find_share_links(text);
        assert_eq!(
            links,
            vec![
                "https://contoso.sharepoint.com/:x:/s/TeamA/EwABC?e=1".to_string(),
                "https://contoso.sharepoint.com/sites/TeamB/doc,".to_string(),
            ]
        );
    }

    #[test]
    fn text_without_share_links_yields_nothing() {
        assert!(find_share_links("plain text with https://example.com/x").is_empty());
    }

    #[test]
    fn guid_normalization_strips_nested_braces() {
        assert_eq!(normalize_guid("{ABC-123}"), Some("ABC-123".to_string()));
        assert_eq!(normalize_guid("ABC-123"), Some("ABC-123".to_string()));
        assert_eq!(normalize_guid("{{ABC-123}}"), Some("ABC-123".to_string()));
    }

    #[test]
    fn guid_normalization_retrims_between_brace_layers() {
        assert_eq!(normalize_guid("{ {ABC-123} }"), Some("ABC-123".to_string()));
        assert_eq!(normalize_guid(" { { ABC-123 } } "), Some("ABC-123".to_string()));
        assert_eq!(normalize_guid("{ { } }"), None);
    }

    #[test]
    fn empty_guids_normalize_to_none() {
        assert_eq!(normalize_guid(""), None);
        assert_eq!(normalize_guid("{}"), None);
        assert_eq!(normalize_guid("  "), None);
    }
}
