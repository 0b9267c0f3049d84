// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Network interface enumeration, so a user can tell remote callers which
// address to point at.

use std::net::IpAddr;

use druckbote_core::error::{DruckboteError, Result};
use druckbote_core::{IpFamily, NetworkInterface};

/// Source of this host's interface addresses.
pub trait InterfaceProvider: Send + Sync {
    fn list(&self) -> Result<Vec<NetworkInterface>>;
}

/// Reads addresses from the operating system via `local-ip-address`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemInterfaces;

impl InterfaceProvider for SystemInterfaces {
    fn list(&self) -> Result<Vec<NetworkInterface>> {
        let addresses = local_ip_address::list_afinet_netifas()
            .map_err(|e| DruckboteError::NetworkInterfaces(e.to_string()))?;
        Ok(from_addresses(addresses))
    }
}

/// Convert `(name, address)` pairs, sorted by name with IPv4 first.
pub fn from_addresses(addresses: impl IntoIterator<Item = (String, IpAddr)>) -> Vec<NetworkInterface> {
    let mut interfaces: Vec<NetworkInterface> = addresses
        .into_iter()
        .map(|(name, address)| NetworkInterface {
            name,
            family: if address.is_ipv4() {
                IpFamily::IPv4
            } else {
                IpFamily::IPv6
            },
            address,
        })
        .collect();

    interfaces.sort_by(|a, b| {
        a.name
            .cmp(&b.name)
            .then_with(|| a.address.is_ipv6().cmp(&b.address.is_ipv6()))
            .then_with(|| a.address.cmp(&b.address))
    });
    interfaces.dedup();
    interfaces
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn families_and_order() {
        let interfaces = from_addresses([
            ("wlan0".to_string(), IpAddr::V6(Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 1))),
            ("eth0".to_string(), IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20))),
            ("wlan0".to_string(), IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5))),
            ("eth0".to_string(), IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20))),
        ]);

        assert_eq!(interfaces.len(), 3);
        assert_eq!(interfaces[0].name, "eth0");
        assert_eq!(interfaces[1].address, IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5)));
        assert_eq!(interfaces[1].family, IpFamily::IPv4);
        assert_eq!(interfaces[2].family, IpFamily::IPv6);
    }

    #[test]
    fn system_interfaces_are_named() {
        match SystemInterfaces.list() {
            Ok(list) => assert!(list.iter().all(|i| !i.name.is_empty())),
            Err(e) => assert!(matches!(e, DruckboteError::NetworkInterfaces(_))),
        }
    }
}
