// Copyright (c) 2023 The SR-IOV utils contributors
//
// SPDX-License-Identifier: Apache-2.0
//

use std::fmt;
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{Error, Result};

/// Domain assumed when an address is given in short `bb:dd.f` form.
pub const DEFAULT_PCI_DOMAIN: u16 = 0;

lazy_static! {
    // [dddd:]bb:dd.f, ':' is also accepted in front of the function.
    static ref PCI_ADDRESS_REGEX: Regex = Regex::new(
        r"^(?:(?P<domain>[0-9a-fA-F]{4}):)?(?P<bus>[0-9a-fA-F]{2}):(?P<device>[0-9a-fA-F]{2})(?P<sep>[.:])(?P<function>[0-7])$"
    )
    .unwrap();
}

/// A PCI address in domain:bus:device.function form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PciAddress {
    pub domain: u16,
    pub bus: u8,
    pub device: u8,
    pub function: u8,
    separator: char,
}

impl PciAddress {
    pub fn new(domain: u16, bus: u8, device: u8, function: u8) -> Self {
        PciAddress {
            domain,
            bus,
            device,
            function,
            separator: '.',
        }
    }
}

impl FromStr for PciAddress {
    type Err = Error;

    fn from_str(address: &str) -> Result<Self> {
        let invalid = || Error::InvalidAddress {
            address: address.to_string(),
        };

        let caps = PCI_ADDRESS_REGEX.captures(address).ok_or_else(invalid)?;

        // The regex guarantees hex digits of bounded width, so these
        // conversions only fail on a regex/field width mismatch.
        let domain = match caps.name("domain") {
            Some(d) => u16::from_str_radix(d.as_str(), 16).map_err(|_| invalid())?,
            None => DEFAULT_PCI_DOMAIN,
        };
        let bus = u8::from_str_radix(&caps["bus"], 16).map_err(|_| invalid())?;
        let device = u8::from_str_radix(&caps["device"], 16).map_err(|_| invalid())?;
        let function = u8::from_str_radix(&caps["function"], 16).map_err(|_| invalid())?;
        let separator = caps["sep"].chars().next().ok_or_else(invalid)?;

        Ok(PciAddress {
            domain,
            bus,
            device,
            function,
            separator,
        })
    }
}

impl fmt::Display for PciAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04x}:{:02x}:{:02x}{}{:x}",
            self.domain, self.bus, self.device, self.separator, self.function
        )
    }
}

/// Returns the long (domain-qualified) form of `address`.
pub fn normalize_pci_address(address: &str) -> Result<String> {
    address.parse::<PciAddress>().map(|a| a.to_string())
}
