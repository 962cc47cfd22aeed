//! Magnet reference validation

use super::super::IngestError;

/// A validated magnet URI identifying one swarm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MagnetReference {
    uri: String,
    info_hash: String,
    display_name: Option<String>,
}

impl MagnetReference {
    /// Parses a magnet URI carrying a BitTorrent info hash topic.
    ///
    /// # Errors
    /// - `IngestError::InvalidRequest` - Empty input, not a magnet URI, or no valid `btih` topic
    pub fn parse(raw: &str) -> Result<Self, IngestError> {
        let uri = raw.trim();
        if uri.is_empty() {
            return Err(IngestError::invalid("Magnet link is required"));
        }
        if !uri.starts_with("magnet:?") {
            return Err(IngestError::invalid(format!(
                "Not a magnet link: {uri:?}"
            )));
        }

        let magnet = magnet_url::Magnet::new(uri)
            .map_err(|e| IngestError::invalid(format!("Invalid magnet link: {e}")))?;

        let info_hash = extract_info_hash(uri).ok_or_else(|| {
            IngestError::invalid(format!("Missing or invalid info hash in magnet link: {uri}"))
        })?;

        Ok(Self {
            uri: uri.to_string(),
            info_hash,
            display_name: magnet.display_name().map(|s| s.to_string()),
        })
    }

    /// The magnet URI as given.
    pub fn as_str(&self) -> &str {
        &self.uri
    }

    /// Info hash from the `xt=urn:btih:` topic, lowercased.
    pub fn info_hash(&self) -> &str {
        &self.info_hash
    }

    /// Advertised `dn` parameter, if any.
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }
}

impl std::fmt::Display for MagnetReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.display_name {
            Some(name) => write!(f, "{} ({})", self.info_hash, name),
            None => f.write_str(&self.info_hash),
        }
    }
}

fn extract_info_hash(uri: &str) -> Option<String> {
    let (_, query) = uri.split_once('?')?;
    query
        .split('&')
        .filter_map(|param| param.strip_prefix("xt="))
        .filter_map(|topic| {
            topic
                .get(..9)
                .filter(|prefix| prefix.eq_ignore_ascii_case("urn:btih:"))
                .map(|_| &topic[9..])
        })
        .find(|hash| is_hex_hash(hash) || is_base32_hash(hash))
        .map(|hash| hash.to_ascii_lowercase())
}

fn is_hex_hash(hash: &str) -> bool {
    hash.len() == 40 && hash.bytes().all(|b| b.is_ascii_hexdigit())
}

fn is_base32_hash(hash: &str) -> bool {
    hash.len() == 32
        && hash
            .bytes()
            .all(|b| matches!(b.to_ascii_uppercase(), b'A'..=b'Z' | b'2'..=b'7'))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH: &str = "c9e15763f722f23e98a29decdfae341b98d53056";

    #[test]
    fn test_parse_hex_magnet_with_name() {
        let magnet =
            MagnetReference::parse(&format!("magnet:?xt=urn:btih:{HASH}&dn=Sintel")).unwrap();

        assert_eq!(magnet.info_hash(), HASH);
        assert_eq!(magnet.display_name(), Some("Sintel"));
        assert!(magnet.as_str().starts_with("magnet:?"));
    }

    #[test]
    fn test_parse_uppercase_and_base32_hashes() {
        let upper = MagnetReference::parse(&format!(
            "magnet:?xt=urn:btih:{}",
            HASH.to_ascii_uppercase()
        ))
        .unwrap();
        assert_eq!(upper.info_hash(), HASH);

        let base32 =
            MagnetReference::parse("magnet:?xt=urn:btih:ZHQVOY7XELZD5GFCTXWN7LRUDOMNKMCW").unwrap();
        assert_eq!(base32.info_hash(), "zhqvoy7xelzd5gfctxwn7lrudomnkmcw");
    }

    #[test]
    fn test_rejects_empty_and_non_magnet() {
        for raw in ["", "   ", "http://example.com/file.torrent"] {
            assert!(
                matches!(MagnetReference::parse(raw), Err(IngestError::InvalidRequest { .. })),
                "expected {raw:?} to be rejected"
            );
        }
    }

    #[test]
    fn test_rejects_bad_hash() {
        for raw in [
            "magnet:?dn=no-topic",
            "magnet:?xt=urn:btih:1234",
            "magnet:?xt=urn:btih:zz9e15763f722f23e98a29decdfae341b98d5305",
        ] {
            assert!(MagnetReference::parse(raw).is_err(), "expected {raw:?} to be rejected");
        }
    }

    #[test]
    fn test_extract_info_hash_finds_topic_anywhere() {
        let uri = format!("magnet:?dn=x&tr=udp%3A%2F%2Ftracker&xt=urn:btih:{HASH}");
        assert_eq!(extract_info_hash(&uri).as_deref(), Some(HASH));
    }
}
