//! Share links: the entire addressing scheme.
//!
//! A session publishes its peer identity as a single query parameter on
//! its own URL; the remote side parses the parameter back out and
//! connects to it. There is no directory service.

use url::Url;

/// Query parameter carrying the target peer identity.
pub const REMOTE_PARAM: &str = "remote";

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("empty peer identity")]
    EmptyIdentity,
}

/// Build a share link by attaching the local identity to a base URL.
///
/// Any existing `remote` parameter is replaced, so re-sharing a link that
/// was itself followed does not accumulate stale targets.
pub fn share_link(base: &str, identity: &str) -> Result<Url, LinkError> {
    if identity.is_empty() {
        return Err(LinkError::EmptyIdentity);
    }
    let mut url = Url::parse(base)?;
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != REMOTE_PARAM)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair(REMOTE_PARAM, identity);
    Ok(url)
}

/// Extract the target peer identity from an incoming link, if present.
///
/// Returns `None` for links with no `remote` parameter or an empty value;
/// a session opened without a target simply waits for inbound connections.
pub fn parse_share_link(raw: &str) -> Result<Option<String>, LinkError> {
    let url = Url::parse(raw)?;
    let identity = url
        .query_pairs()
        .find(|(key, _)| key == REMOTE_PARAM)
        .map(|(_, value)| value.into_owned());
    Ok(identity.filter(|id| !id.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_roundtrip() {
        let url = share_link("https://duet.example/", "abc").unwrap();
        assert_eq!(parse_share_link(url.as_str()).unwrap().as_deref(), Some("abc"));
    }

    #[test]
    fn reserved_characters_survive_roundtrip() {
        let identity = "p&q=r top/1+2 ünïcode";
        let url = share_link("https://duet.example/session?theme=dark", identity).unwrap();
        assert_eq!(
            parse_share_link(url.as_str()).unwrap().as_deref(),
            Some(identity)
        );
    }

    #[test]
    fn resharing_replaces_previous_target() {
        let first = share_link("https://duet.example/", "abc").unwrap();
        let second = share_link(first.as_str(), "xyz").unwrap();
        assert_eq!(parse_share_link(second.as_str()).unwrap().as_deref(), Some("xyz"));
        assert_eq!(second.as_str().matches(REMOTE_PARAM).count(), 1);
    }

    #[test]
    fn missing_or_empty_parameter_yields_none() {
        assert_eq!(parse_share_link("https://duet.example/").unwrap(), None);
        assert_eq!(
            parse_share_link("https://duet.example/?remote=").unwrap(),
            None
        );
    }

    #[test]
    fn empty_identity_is_rejected() {
        assert!(matches!(
            share_link("https://duet.example/", ""),
            Err(LinkError::EmptyIdentity)
        ));
    }

    #[test]
    fn unrelated_parameters_are_kept() {
        let url = share_link("https://duet.example/?theme=dark", "abc").unwrap();
        assert!(url.query_pairs().any(|(k, v)| k == "theme" && v == "dark"));
    }
}
