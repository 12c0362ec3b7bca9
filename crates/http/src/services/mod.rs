//! Typed wrappers over the OtherLink REST endpoints
//!
//! Auth endpoints return the raw JSON body: their layouts vary and are
//! resolved by [`crate::envelope`]. Resource endpoints unwrap the
//! `{ status, data, message }` envelope into typed records.

pub mod link;
pub mod otherlink;
pub mod user;

pub use link::{LinkPage, LinkService, ShortcodeCheck};
pub use otherlink::{DisplayNameCheck, OtherlinkPage, OtherlinkService, PublicOtherlink};
pub use user::UserService;

use crate::client::error::ClientError;
use crate::envelope::Envelope;
use serde::de::DeserializeOwned;

/// Percent-encode a single path segment
pub(crate) fn segment(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

/// Unwrap an envelope, turning `status: false` into a rejection carrying the message
pub(crate) fn unwrap_envelope<T: DeserializeOwned>(
    envelope: Envelope<T>,
) -> Result<T, ClientError> {
    let message = envelope.message.clone().filter(|m| !m.is_empty());
    envelope
        .into_data()
        .ok_or(ClientError::Rejected { message })
}

/// Page/limit plus free-form string filters, as query pairs
pub(crate) fn page_query(page: u32, limit: u32, filters: &[(&str, &str)]) -> Vec<(String, String)> {
    let mut query = vec![
        ("page".to_string(), page.to_string()),
        ("limit".to_string(), limit.to_string()),
    ];
    query.extend(
        filters
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string())),
    );
    query
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_encoding() {
        assert_eq!(segment("my-page"), "my-page");
        assert_eq!(segment("a b/c"), "a%20b%2Fc");
    }

    #[test]
    fn test_page_query() {
        let query = page_query(2, 10, &[("active", "true")]);
        assert_eq!(query[0], ("page".into(), "2".into()));
        assert_eq!(query[2], ("active".into(), "true".into()));
    }
}
