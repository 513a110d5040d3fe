//! SharePoint share-link resolution
//!
//! Turns the share URL formats SharePoint and OneDrive hand out into
//! canonical document references: pure parsers for the formats that carry
//! the guid inline, and a Graph-backed converter for the opaque ones.

pub mod link_converter;
pub mod parser;
pub mod types;

pub use link_converter::LinkConverter;
pub use parser::{
    encode_sharing_url, extract_base_url, extract_file_kind, extract_guid_from_etag,
    extract_guid_from_url, extract_site_id, find_share_links, normalize_guid,
};
pub use types::{DocumentRef, FileKind};
