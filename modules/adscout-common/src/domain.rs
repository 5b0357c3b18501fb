//! Root domain normalization for landing page URLs.
//!
//! Products are deduplicated by root domain, so `https://www.shop.example.com/p/1`
//! and `http://example.com/about` must both normalize to `example.com`.

use url::Url;

/// Country-code second-level suffixes where the registrable domain is three
/// labels deep (`example.co.uk`), not two.
const MULTI_PART_SUFFIXES: &[&str] = &[
    "co.uk", "org.uk", "ac.uk", "gov.uk", "com.au", "net.au", "org.au", "co.nz", "co.jp",
    "co.kr", "co.in", "co.za", "com.br", "com.mx", "com.ar", "com.sg", "com.hk", "com.tw",
    "com.tr", "com.my", "com.ph",
];

/// Extract and normalize the root domain from a URL.
/// Returns `None` when the input has no usable registrable host
/// (IP literals, single-label hosts, unparseable strings).
pub fn normalize_root_domain(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let url = Url::parse(trimmed)
        .ok()
        .or_else(|| Url::parse(&format!("https://{trimmed}")).ok())?;

    let host = url.host_str()?.to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);

    if host.parse::<std::net::IpAddr>().is_ok() {
        return None;
    }

    let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
    if labels.len() < 2 {
        return None;
    }

    let last_two = format!("{}.{}", labels[labels.len() - 2], labels[labels.len() - 1]);
    let depth = if MULTI_PART_SUFFIXES.contains(&last_two.as_str()) && labels.len() >= 3 {
        3
    } else {
        2
    };

    Some(labels[labels.len() - depth..].join("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_scheme_www_and_path() {
        assert_eq!(
            normalize_root_domain("https://www.example.com/products/1?ref=fb"),
            Some("example.com".to_string())
        );
    }

    #[test]
    fn collapses_subdomains_to_root() {
        assert_eq!(
            normalize_root_domain("https://shop.checkout.example.com"),
            Some("example.com".to_string())
        );
    }

    #[test]
    fn keeps_multi_part_public_suffixes() {
        assert_eq!(
            normalize_root_domain("https://shop.example.co.uk/cart"),
            Some("example.co.uk".to_string())
        );
        assert_eq!(
            normalize_root_domain("https://example.com.au"),
            Some("example.com.au".to_string())
        );
    }

    #[test]
    fn accepts_bare_hosts_without_scheme() {
        assert_eq!(
            normalize_root_domain("example.com/landing"),
            Some("example.com".to_string())
        );
    }

    #[test]
    fn rejects_unusable_hosts() {
        assert_eq!(normalize_root_domain(""), None);
        assert_eq!(normalize_root_domain("   "), None);
        assert_eq!(normalize_root_domain("http://192.168.0.1/admin"), None);
        assert_eq!(normalize_root_domain("http://localhost:8000"), None);
    }

    #[test]
    fn lowercases_hosts() {
        assert_eq!(
            normalize_root_domain("https://WWW.Example.COM"),
            Some("example.com".to_string())
        );
    }
}
