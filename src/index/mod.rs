//! Longest-prefix-match index over IPv4 and IPv6 networks.
//!
//! A [`PrefixIndex`] holds one binary trie per address family. Every index
//! is seeded with the match-all networks `0.0.0.0/0` and `::/0` flagged
//! [`Flag::Unlisted`], so a lookup of any well-formed address always
//! resolves to some flag.
//!
//! # Example
//!
//! ```
//! use blockcheck::{Flag, PrefixIndex};
//!
//! let mut index = PrefixIndex::new();
//! index.insert_str("10.0.0.0/8", Flag::Listed).unwrap();
//! index.insert_str("10.1.0.0/16", Flag::Unlisted).unwrap();
//!
//! assert_eq!(index.lookup_str("10.2.3.4").unwrap(), Flag::Listed);
//! assert_eq!(index.lookup_str("10.1.3.4").unwrap(), Flag::Unlisted);
//! assert_eq!(index.lookup_str("8.8.8.8").unwrap(), Flag::Unlisted);
//! ```

mod trie;

use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use std::fmt::Write as _;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::error::{Error, Result};
use crate::Flag;
use trie::BitTrie;

/// Immutable-after-build longest-prefix-match structure.
#[derive(Debug, Clone)]
pub struct PrefixIndex {
    v4: BitTrie,
    v6: BitTrie,
}

impl Default for PrefixIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl PrefixIndex {
    /// Create an index containing only the match-all defaults.
    pub fn new() -> Self {
        let mut index = Self {
            v4: BitTrie::new(32),
            v6: BitTrie::new(128),
        };
        index.v4.insert(0, 0, Flag::Unlisted);
        index.v6.insert(0, 0, Flag::Unlisted);
        index
    }

    /// Insert a network with its flag.
    ///
    /// Host bits are ignored. Inserting the same network twice keeps the
    /// last flag; across different networks the most specific one wins at
    /// lookup time regardless of insertion order.
    ///
    /// Networks inside `::ffff:0:0/96` are stored as the IPv4 networks
    /// they map, since IPv4-mapped lookups go to the IPv4 trie.
    pub fn insert(&mut self, network: IpNet, flag: Flag) {
        match network.trunc() {
            IpNet::V4(net) => self.insert_v4(net.network(), net.prefix_len(), flag),
            IpNet::V6(net) => match mapped_ipv4(&net) {
                Some((addr, prefix_len)) => self.insert_v4(addr, prefix_len, flag),
                None => self
                    .v6
                    .insert(u128::from(net.network()), net.prefix_len(), flag),
            },
        }
    }

    fn insert_v4(&mut self, addr: Ipv4Addr, prefix_len: u8, flag: Flag) {
        self.v4.insert(u32::from(addr) as u128, prefix_len, flag);
    }

    /// Parse and insert a network token.
    ///
    /// Returns the parsed network so callers can log or count it.
    pub fn insert_str(&mut self, token: &str, flag: Flag) -> Result<IpNet> {
        let network = parse_network(token)?;
        self.insert(network, flag);
        Ok(network)
    }

    /// Flag of the most specific network containing `addr`.
    ///
    /// IPv4-mapped IPv6 addresses (`::ffff:a.b.c.d`) are looked up in the
    /// IPv4 trie.
    pub fn lookup(&self, addr: IpAddr) -> Flag {
        let found = match addr {
            IpAddr::V4(v4) => self.v4.longest_match(u32::from(v4) as u128),
            IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
                Some(v4) => self.v4.longest_match(u32::from(v4) as u128),
                None => self.v6.longest_match(u128::from(v6)),
            },
        };
        // Both roots are seeded in `new`, so a miss cannot happen.
        found.unwrap_or_default()
    }

    /// Parse an address string and look it up.
    pub fn lookup_str(&self, addr: &str) -> Result<Flag> {
        let addr = parse_address(addr)?;
        Ok(self.lookup(addr))
    }

    /// Every stored network that differs from the match-all default.
    ///
    /// IPv4 networks come first, each family in address order.
    pub fn listed_networks(&self) -> Vec<(IpNet, Flag)> {
        let v4 = self.v4.prefixes().into_iter().map(|(key, len, flag)| {
            let net = Ipv4Net::new(Ipv4Addr::from(key as u32), len).map(IpNet::V4);
            (net, flag)
        });
        let v6 = self.v6.prefixes().into_iter().map(|(key, len, flag)| {
            let net = Ipv6Net::new(Ipv6Addr::from(key), len).map(IpNet::V6);
            (net, flag)
        });
        v4.chain(v6)
            .filter_map(|(net, flag)| net.ok().map(|net| (net, flag)))
            .filter(|(net, flag)| !(net.prefix_len() == 0 && *flag == Flag::Unlisted))
            .collect()
    }

    /// Canonical text form: one `network flag` pair per line.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for (net, flag) in self.listed_networks() {
            let _ = writeln!(out, "{} {}", net, flag.as_u8());
        }
        out
    }

    /// Rebuild an index from [`PrefixIndex::to_text`] output.
    pub fn from_text(text: &str) -> Result<Self> {
        let mut index = Self::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (net, flag) = line
                .split_once(' ')
                .ok_or_else(|| Error::Parse(format!("line {}: missing flag", lineno + 1)))?;
            let flag = flag
                .trim()
                .parse::<u8>()
                .ok()
                .and_then(Flag::from_u8)
                .ok_or_else(|| Error::Parse(format!("line {}: invalid flag", lineno + 1)))?;
            index.insert_str(net, flag)?;
        }
        Ok(index)
    }

    /// Total number of stored networks, including both defaults.
    pub fn len(&self) -> usize {
        self.v4.len() + self.v6.len()
    }

    /// Whether the index holds nothing beyond the defaults.
    pub fn is_empty(&self) -> bool {
        self.network_count() == 0
    }

    /// Number of stored networks other than the two match-all roots.
    pub fn network_count(&self) -> usize {
        self.len().saturating_sub(2)
    }

    /// Number of stored IPv4 networks.
    pub fn v4_len(&self) -> usize {
        self.v4.len()
    }

    /// Number of stored IPv6 networks.
    pub fn v6_len(&self) -> usize {
        self.v6.len()
    }

    /// Number of trie nodes across both families.
    pub fn node_count(&self) -> usize {
        self.v4.node_count() + self.v6.node_count()
    }
}

/// The IPv4 network an IPv4-mapped IPv6 network covers, if it is one.
fn mapped_ipv4(net: &Ipv6Net) -> Option<(Ipv4Addr, u8)> {
    if net.prefix_len() < 96 {
        return None;
    }
    net.network()
        .to_ipv4_mapped()
        .map(|addr| (addr, net.prefix_len() - 96))
}

/// Parse a network token: CIDR notation, or a bare address as /32 or /128.
pub fn parse_network(token: &str) -> Result<IpNet> {
    let token = token.trim();
    if token.contains('/') {
        token
            .parse::<IpNet>()
            .map_err(|_| Error::MalformedAddress(token.to_string()))
    } else {
        parse_address(token).map(IpNet::from)
    }
}

/// Parse a single IPv4 or IPv6 address.
pub fn parse_address(token: &str) -> Result<IpAddr> {
    let token = token.trim();
    token
        .parse::<IpAddr>()
        .map_err(|_| Error::MalformedAddress(token.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_default_only_index() {
        let index = PrefixIndex::new();
        for addr in ["0.0.0.0", "1.2.3.4", "255.255.255.255", "::", "2001:db8::1"] {
            assert_eq!(index.lookup(ip(addr)), Flag::Unlisted, "{addr}");
        }
        assert_eq!(index.len(), 2);
        assert_eq!(index.network_count(), 0);
        assert!(index.is_empty());
        assert!(index.listed_networks().is_empty());
    }

    #[test]
    fn test_specificity_beats_insertion_order() {
        let mut forward = PrefixIndex::new();
        forward.insert_str("10.0.0.0/8", Flag::Listed).unwrap();
        forward.insert_str("10.1.0.0/16", Flag::Unlisted).unwrap();

        let mut reverse = PrefixIndex::new();
        reverse.insert_str("10.1.0.0/16", Flag::Unlisted).unwrap();
        reverse.insert_str("10.0.0.0/8", Flag::Listed).unwrap();

        for index in [&forward, &reverse] {
            assert_eq!(index.lookup(ip("10.0.0.1")), Flag::Listed);
            assert_eq!(index.lookup(ip("10.255.255.255")), Flag::Listed);
            assert_eq!(index.lookup(ip("10.1.0.0")), Flag::Unlisted);
            assert_eq!(index.lookup(ip("10.1.255.255")), Flag::Unlisted);
            assert_eq!(index.lookup(ip("11.0.0.0")), Flag::Unlisted);
        }
    }

    #[test]
    fn test_every_address_in_network_is_listed() {
        let mut index = PrefixIndex::new();
        index.insert_str("1.2.3.0/24", Flag::Listed).unwrap();
        for last in 0..=255u8 {
            assert_eq!(index.lookup(IpAddr::from([1, 2, 3, last])), Flag::Listed);
        }
        assert_eq!(index.lookup(ip("1.2.2.255")), Flag::Unlisted);
        assert_eq!(index.lookup(ip("1.2.4.0")), Flag::Unlisted);
    }

    #[test]
    fn test_bare_address_is_host_route() {
        let mut index = PrefixIndex::new();
        let net = index.insert_str("8.8.8.8", Flag::Listed).unwrap();
        assert_eq!(net.prefix_len(), 32);
        assert_eq!(index.lookup(ip("8.8.8.8")), Flag::Listed);
        assert_eq!(index.lookup(ip("8.8.8.9")), Flag::Unlisted);

        let net = index.insert_str("2001:db8::1", Flag::Listed).unwrap();
        assert_eq!(net.prefix_len(), 128);
        assert_eq!(index.lookup(ip("2001:db8::1")), Flag::Listed);
        assert_eq!(index.lookup(ip("2001:db8::2")), Flag::Unlisted);
    }

    #[test]
    fn test_host_bits_are_masked() {
        let mut index = PrefixIndex::new();
        let net = index.insert_str("192.168.1.77/24", Flag::Listed).unwrap();
        assert_eq!(net.prefix_len(), 24);
        assert_eq!(index.lookup(ip("192.168.1.1")), Flag::Listed);
        assert_eq!(
            index.listed_networks(),
            vec![("192.168.1.0/24".parse().unwrap(), Flag::Listed)]
        );
    }

    #[test]
    fn test_ipv6_networks() {
        let mut index = PrefixIndex::new();
        index.insert_str("2001:db8::/32", Flag::Listed).unwrap();
        assert_eq!(index.lookup(ip("2001:db8:ffff::1")), Flag::Listed);
        assert_eq!(index.lookup(ip("2001:db9::1")), Flag::Unlisted);
        assert_eq!(index.v6_len(), 2);
        assert_eq!(index.v4_len(), 1);
        assert_eq!(index.network_count(), 1);
    }

    #[test]
    fn test_ipv4_mapped_ipv6_uses_v4_trie() {
        let mut index = PrefixIndex::new();
        index.insert_str("1.2.3.0/24", Flag::Listed).unwrap();
        assert_eq!(index.lookup(ip("::ffff:1.2.3.4")), Flag::Listed);
    }

    #[test]
    fn test_ipv4_mapped_networks_are_stored_as_ipv4() {
        let mut index = PrefixIndex::new();
        index.insert_str("::ffff:1.2.3.4", Flag::Listed).unwrap();
        index.insert_str("::ffff:5.6.7.0/120", Flag::Listed).unwrap();

        assert_eq!(index.lookup_str("::ffff:1.2.3.4").unwrap(), Flag::Listed);
        assert_eq!(index.lookup_str("1.2.3.4").unwrap(), Flag::Listed);
        assert_eq!(index.lookup_str("::ffff:1.2.3.5").unwrap(), Flag::Unlisted);
        assert_eq!(index.lookup_str("::ffff:5.6.7.9").unwrap(), Flag::Listed);
        assert_eq!(index.lookup_str("5.6.7.255").unwrap(), Flag::Listed);
        assert_eq!(index.lookup_str("5.6.8.0").unwrap(), Flag::Unlisted);
        assert_eq!(index.v4_len(), 3);
        assert_eq!(index.v6_len(), 1);
        assert_eq!(
            index.listed_networks(),
            vec![
                ("1.2.3.4/32".parse().unwrap(), Flag::Listed),
                ("5.6.7.0/24".parse().unwrap(), Flag::Listed),
            ]
        );
    }

    #[test]
    fn test_short_ipv6_prefix_stays_in_v6_trie() {
        let mut index = PrefixIndex::new();
        index.insert_str("::/64", Flag::Listed).unwrap();
        assert_eq!(index.v6_len(), 2);
        assert_eq!(index.lookup_str("::1").unwrap(), Flag::Listed);
        assert_eq!(index.lookup_str("1.2.3.4").unwrap(), Flag::Unlisted);
    }

    #[test]
    fn test_lookup_str_malformed() {
        let index = PrefixIndex::new();
        assert!(matches!(
            index.lookup_str("1.2.3"),
            Err(Error::MalformedAddress(_))
        ));
        assert!(matches!(
            index.lookup_str("not-an-ip"),
            Err(Error::MalformedAddress(_))
        ));
        assert!(matches!(
            index.lookup_str("1.2.3.0/24"),
            Err(Error::MalformedAddress(_))
        ));
        assert_eq!(index.lookup_str(" 1.2.3.4 ").unwrap(), Flag::Unlisted);
    }

    #[test]
    fn test_parse_network_rejects_bad_prefix() {
        assert!(parse_network("1.2.3.4/33").is_err());
        assert!(parse_network("::/129").is_err());
        assert!(parse_network("").is_err());
        assert!(parse_network("1.2.3.4/").is_err());
    }

    #[test]
    fn test_text_round_trip() {
        let mut index = PrefixIndex::new();
        index.insert_str("10.0.0.0/8", Flag::Listed).unwrap();
        index.insert_str("10.1.0.0/16", Flag::Unlisted).unwrap();
        index.insert_str("2001:db8::/32", Flag::Listed).unwrap();
        index.insert_str("5.6.7.8", Flag::Listed).unwrap();

        let text = index.to_text();
        assert_eq!(
            text,
            "5.6.7.8/32 1\n10.0.0.0/8 1\n10.1.0.0/16 0\n2001:db8::/32 1\n"
        );

        let restored = PrefixIndex::from_text(&text).unwrap();
        assert_eq!(restored.listed_networks(), index.listed_networks());
        for addr in ["10.2.2.2", "10.1.1.1", "5.6.7.8", "2001:db8::5", "9.9.9.9"] {
            assert_eq!(restored.lookup(ip(addr)), index.lookup(ip(addr)), "{addr}");
        }
    }

    #[test]
    fn test_from_text_rejects_bad_flag() {
        assert!(PrefixIndex::from_text("1.2.3.0/24 7\n").is_err());
        assert!(PrefixIndex::from_text("1.2.3.0/24\n").is_err());
    }

    #[test]
    fn test_root_override_is_kept_in_listing() {
        let mut index = PrefixIndex::new();
        index.insert_str("0.0.0.0/0", Flag::Listed).unwrap();
        assert_eq!(index.lookup(ip("4.4.4.4")), Flag::Listed);
        assert_eq!(
            index.listed_networks(),
            vec![("0.0.0.0/0".parse().unwrap(), Flag::Listed)]
        );
    }
}
