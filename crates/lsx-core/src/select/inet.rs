//! Internet address selections: `[46][protocol][@host][:port[-port]]`.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv6Addr, ToSocketAddrs};

use lsx_common::{Error, Result};

use super::criterion::NumericRange;
use crate::record::{AddressFamily, NetworkEndpoint};

/// IP version constraint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IpFamily {
    #[default]
    Any,
    V4,
    V6,
}

impl IpFamily {
    pub fn admits(&self, family: AddressFamily) -> bool {
        match self {
            IpFamily::Any => matches!(family, AddressFamily::Inet | AddressFamily::Inet6),
            IpFamily::V4 => family == AddressFamily::Inet,
            IpFamily::V6 => family == AddressFamily::Inet6,
        }
    }

    fn admits_addr(&self, addr: &IpAddr) -> bool {
        match self {
            IpFamily::Any => true,
            IpFamily::V4 => addr.is_ipv4(),
            IpFamily::V6 => addr.is_ipv6(),
        }
    }
}

impl std::fmt::Display for IpFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IpFamily::Any => write!(f, "any"),
            IpFamily::V4 => write!(f, "IPv4"),
            IpFamily::V6 => write!(f, "IPv6"),
        }
    }
}

/// A parsed internet selection. Host names are resolved when parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InetSpec {
    text: String,
    pub family: IpFamily,
    /// Upper-cased protocol name.
    pub protocol: Option<String>,
    pub host: Option<String>,
    pub addresses: Vec<IpAddr>,
    pub ports: Option<NumericRange>,
}

impl InetSpec {
    /// Parse and resolve an inet selection string. The empty string
    /// selects every internet file.
    pub fn parse(spec: &str) -> Result<Self> {
        let bad = |why: &str| Error::InvalidAddress(format!("{}: {}", spec, why));

        let mut rest = spec;
        let mut family = IpFamily::Any;
        if let Some(r) = rest.strip_prefix('4') {
            family = IpFamily::V4;
            rest = r;
        } else if let Some(r) = rest.strip_prefix('6') {
            family = IpFamily::V6;
            rest = r;
        }

        let proto_end = rest.find(|c: char| c == '@' || c == ':').unwrap_or(rest.len());
        let proto = &rest[..proto_end];
        let protocol = if proto.is_empty() {
            None
        } else if proto.chars().all(|c| c.is_ascii_alphanumeric()) {
            Some(proto.to_ascii_uppercase())
        } else {
            return Err(bad("malformed protocol"));
        };
        rest = &rest[proto_end..];

        let mut host = None;
        let mut addresses = Vec::new();
        if let Some(r) = rest.strip_prefix('@') {
            if let Some(r) = r.strip_prefix('[') {
                let end = r.find(']').ok_or_else(|| bad("unterminated [ in address"))?;
                let addr: Ipv6Addr = r[..end].parse().map_err(|_| bad("bad IPv6 address"))?;
                if family == IpFamily::V4 {
                    return Err(bad("IPv6 address with IPv4 family"));
                }
                host = Some(r[..end].to_string());
                addresses.push(IpAddr::V6(addr));
                rest = &r[end + 1..];
            } else {
                let end = r.find(':').unwrap_or(r.len());
                let name = &r[..end];
                if name.is_empty() {
                    return Err(bad("missing host after @"));
                }
                addresses = resolve_host(name, family).map_err(|why| bad(&why))?;
                host = Some(name.to_string());
                rest = &r[end..];
            }
        }

        let mut ports = None;
        if let Some(r) = rest.strip_prefix(':') {
            ports = Some(parse_ports(r).map_err(|why| bad(&why))?);
            rest = "";
        }
        if !rest.is_empty() {
            return Err(bad("trailing characters"));
        }

        Ok(Self {
            text: spec.to_string(),
            family,
            protocol,
            host,
            addresses,
            ports,
        })
    }

    /// The string this spec was parsed from.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// True when either end of the endpoint satisfies every constraint.
    pub fn matches(&self, endpoint: &NetworkEndpoint) -> bool {
        if !self.family.admits(endpoint.family) {
            return false;
        }
        if let Some(proto) = &self.protocol {
            if !endpoint.protocol.eq_ignore_ascii_case(proto) {
                return false;
            }
        }
        if self.addresses.is_empty() && self.ports.is_none() {
            return true;
        }
        [endpoint.local, endpoint.foreign]
            .iter()
            .flatten()
            .any(|sa| {
                let addr_ok = self.addresses.is_empty() || self.addresses.contains(&sa.ip());
                let port_ok = self
                    .ports
                    .map_or(true, |r| r.contains(u64::from(sa.port())));
                addr_ok && port_ok
            })
    }
}

impl std::fmt::Display for InetSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.text)
    }
}

fn resolve_host(name: &str, family: IpFamily) -> std::result::Result<Vec<IpAddr>, String> {
    if let Ok(addr) = name.parse::<IpAddr>() {
        if !family.admits_addr(&addr) {
            return Err("address does not match family".to_string());
        }
        return Ok(vec![addr]);
    }
    let resolved = (name, 0u16)
        .to_socket_addrs()
        .map_err(|e| format!("can't resolve {}: {}", name, e))?;
    let mut addrs: Vec<IpAddr> = Vec::new();
    for sa in resolved {
        let ip = sa.ip();
        if family.admits_addr(&ip) && !addrs.contains(&ip) {
            addrs.push(ip);
        }
    }
    if addrs.is_empty() {
        return Err(format!("no {} address for {}", family, name));
    }
    Ok(addrs)
}

fn parse_ports(text: &str) -> std::result::Result<NumericRange, String> {
    let port = |s: &str| -> std::result::Result<u64, String> {
        let n: u16 = s.parse().map_err(|_| format!("bad port {:?}", s))?;
        Ok(u64::from(n))
    };
    match text.split_once('-') {
        Some((lo, hi)) => {
            let (lo, hi) = (port(lo)?, port(hi)?);
            if lo > hi {
                return Err(format!("port range {}-{} is reversed", lo, hi));
            }
            Ok(NumericRange::between(lo, hi))
        }
        None => Ok(NumericRange::exact(port(text)?)),
    }
}
