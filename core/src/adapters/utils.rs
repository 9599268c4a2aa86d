//! Address parsing shared by the command-output based adapters.

/// Parse an `address:port` string as printed by lsof.
///
/// Handles multiple address formats:
/// - IPv4: "127.0.0.1:3000" or "*:8080"
/// - IPv6: "\[::1]:3000" or "\[fe80::1]:8080"
pub fn parse_address(address: &str) -> Option<(String, u16)> {
    if let Some(rest) = address.strip_prefix('[') {
        let bracket_end = rest.find(']')?;
        let port_str = rest[bracket_end + 1..].strip_prefix(':')?;
        let port: u16 = port_str.parse().ok()?;
        let addr = &rest[..bracket_end];
        let addr = if addr == "::" { "*" } else { addr };
        Some((addr.to_string(), port))
    } else {
        let last_colon = address.rfind(':')?;
        let addr = &address[..last_colon];
        let port: u16 = address[last_colon + 1..].parse().ok()?;
        let addr = if addr.is_empty() || addr == "0.0.0.0" {
            "*"
        } else {
            addr
        };
        Some((addr.to_string(), port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ipv4_address() {
        assert_eq!(
            parse_address("127.0.0.1:3000"),
            Some(("127.0.0.1".to_string(), 3000))
        );
        assert_eq!(parse_address("*:8080"), Some(("*".to_string(), 8080)));
        assert_eq!(parse_address("0.0.0.0:80"), Some(("*".to_string(), 80)));
    }

    #[test]
    fn test_parse_ipv6_address() {
        assert_eq!(parse_address("[::1]:3000"), Some(("::1".to_string(), 3000)));
        assert_eq!(
            parse_address("[fe80::1]:8080"),
            Some(("fe80::1".to_string(), 8080))
        );
        assert_eq!(parse_address("[::]:5173"), Some(("*".to_string(), 5173)));
    }

    #[test]
    fn test_parse_garbage() {
        assert_eq!(parse_address("no-port"), None);
        assert_eq!(parse_address("[::1]3000"), None);
        assert_eq!(parse_address("host:http"), None);
    }
}
