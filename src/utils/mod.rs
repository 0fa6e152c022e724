use std::net::IpAddr;

/// Normalize MAC address to lowercase with colons
pub fn normalize_mac(mac: &str) -> String {
    // Remove any existing separators
    let clean: String = mac
        .chars()
        .filter(|c| c.is_ascii_hexdigit())
        .collect();

    // Bridges and virtual interfaces carry odd values; keep them as given
    if clean.len() != 12 {
        return mac.trim().to_lowercase();
    }

    clean
        .chars()
        .collect::<Vec<_>>()
        .chunks(2)
        .map(|c| c.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join(":")
        .to_lowercase()
}

/// Parse an IPv4 or IPv6 literal and render it canonically.
/// A trailing host prefix (/32 for IPv4, /128 for IPv6) is accepted and dropped.
pub fn normalize_ip_address(input: &str) -> Result<String, String> {
    let trimmed = input.trim();
    let (addr_str, suffix) = match trimmed.split_once('/') {
        Some((addr, len)) => (addr, Some(len)),
        None => (trimmed, None),
    };

    let addr: IpAddr = addr_str
        .parse()
        .map_err(|_| format!("Invalid IP address: {}", input))?;

    match (suffix, addr) {
        (None, _) | (Some("32"), IpAddr::V4(_)) | (Some("128"), IpAddr::V6(_)) => {
            Ok(addr.to_string())
        }
        (Some(_), _) => Err(format!("Not a host address: {}", input)),
    }
}

/// Longest hostname an address record stores
pub const MAX_HOSTNAME_LEN: usize = 64;
/// Longest normalized alias list an address record stores
pub const MAX_ALIASES_LEN: usize = 256;

/// A hostname is free text: required, at most MAX_HOSTNAME_LEN characters.
pub fn is_valid_hostname(hostname: &str) -> bool {
    !hostname.is_empty() && hostname.chars().count() <= MAX_HOSTNAME_LEN
}

/// Collapse a space-delimited alias list, dropping repeated entries.
pub fn normalize_aliases(aliases: Option<&str>) -> Result<String, String> {
    let mut out: Vec<&str> = Vec::new();
    for alias in aliases.unwrap_or("").split_whitespace() {
        if !out.contains(&alias) {
            out.push(alias);
        }
    }
    let joined = out.join(" ");
    if joined.chars().count() > MAX_ALIASES_LEN {
        return Err(format!("Aliases exceed {} characters", MAX_ALIASES_LEN));
    }
    Ok(joined)
}

/// Validate a slug: lowercase ASCII letters, digits, hyphens and underscores.
/// The empty string is accepted (optional slug fields).
pub fn is_valid_slug(slug: &str) -> bool {
    slug.len() <= 256
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
}

/// Generate a fresh computer API key (32 lowercase hex characters)
pub fn generate_api_key() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_mac() {
        assert_eq!(normalize_mac("AA:BB:CC:DD:EE:FF"), "aa:bb:cc:dd:ee:ff");
        assert_eq!(normalize_mac("AA-BB-CC-DD-EE-FF"), "aa:bb:cc:dd:ee:ff");
        assert_eq!(normalize_mac("AABBCCDDEEFF"), "aa:bb:cc:dd:ee:ff");
        assert_eq!(normalize_mac("aa:bb:cc:dd:ee:ff"), "aa:bb:cc:dd:ee:ff");
        assert_eq!(normalize_mac(" TBD "), "tbd");
    }

    #[test]
    fn test_normalize_ip_address() {
        assert_eq!(normalize_ip_address("192.168.0.1").unwrap(), "192.168.0.1");
        assert_eq!(normalize_ip_address(" 10.0.0.7/32 ").unwrap(), "10.0.0.7");
        assert_eq!(normalize_ip_address("2001:DB8:0:0::1").unwrap(), "2001:db8::1");
        assert_eq!(normalize_ip_address("fe80::1/128").unwrap(), "fe80::1");
        assert!(normalize_ip_address("").is_err());
        assert!(normalize_ip_address("256.1.1.1").is_err());
        assert!(normalize_ip_address("10.0.0.0/24").is_err());
        assert!(normalize_ip_address("10.0.0.1/128").is_err());
        assert!(normalize_ip_address("; rm -rf /").is_err());
    }

    #[test]
    fn test_is_valid_hostname() {
        assert!(is_valid_hostname("switch-01"));
        assert!(is_valid_hostname("router.lab.local"));
        assert!(is_valid_hostname("Front desk printer"));
        assert!(is_valid_hostname(&"h".repeat(MAX_HOSTNAME_LEN)));
        assert!(!is_valid_hostname(""));
        assert!(!is_valid_hostname(&"h".repeat(MAX_HOSTNAME_LEN + 1)));
        // length counts characters, not bytes
        assert!(is_valid_hostname(&"é".repeat(MAX_HOSTNAME_LEN)));
    }

    #[test]
    fn test_normalize_aliases() {
        assert_eq!(normalize_aliases(None).unwrap(), "");
        assert_eq!(normalize_aliases(Some("  www   mail ")).unwrap(), "www mail");
        assert_eq!(normalize_aliases(Some("www www.local www")).unwrap(), "www www.local");
        let long = vec!["a".repeat(100); 3].join(" ");
        assert!(normalize_aliases(Some(&long)).is_err());
    }

    #[test]
    fn test_is_valid_slug() {
        assert!(is_valid_slug(""));
        assert!(is_valid_slug("asset-owner"));
        assert!(is_valid_slug("lab_pc_07"));
        assert!(!is_valid_slug("Asset-Owner"));
        assert!(!is_valid_slug("has space"));
    }

    #[test]
    fn test_generate_api_key() {
        let a = generate_api_key();
        let b = generate_api_key();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}
