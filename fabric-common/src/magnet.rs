use regex::Regex;

/// Wire contract pattern from §6: `urn:btih:([A-F\d]+)`, case-insensitive.
/// Shared between the Data Controller (which builds magnet links) and any
/// service that accepts one from a peer and must reject malformed input at
/// the boundary (§8 scenario F).
static MAGNET_PATTERN: &str = r"(?i)urn:btih:([A-F\d]+)";

pub fn is_valid_magnet(magnet: &str) -> bool {
    Regex::new(MAGNET_PATTERN).expect("static pattern is valid").is_match(magnet)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_formed_magnet() {
        assert!(is_valid_magnet("magnet:?xt=urn:btih:ABCDEF0123456789"));
    }

    #[test]
    fn rejects_non_magnet_uri() {
        assert!(!is_valid_magnet("http://not-a-magnet"));
    }
}
