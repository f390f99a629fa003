//! Static-addressing validation
//!
//! Pure parsing of caller-supplied textual addressing into a structured
//! [`AddressConfig`]; performs no I/O. The same input always yields the
//! same verdict.

use std::net::Ipv4Addr;

use crate::core::{
    error::{AddressField, ValidationError},
    types::StaticAddressing,
};

/// Validated static addressing applied to an interface before association
///
/// Static addressing is all-or-nothing for ip/gateway/subnet; DNS servers
/// are independently optional.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressConfig {
    pub ip: Ipv4Addr,
    pub gateway: Ipv4Addr,
    pub subnet: Ipv4Addr,
    pub dns1: Option<Ipv4Addr>,
    pub dns2: Option<Ipv4Addr>,
}

impl AddressConfig {
    /// Validate raw textual fields
    ///
    /// Returns `Ok(None)` when no static IP is requested (DHCP); DNS fields
    /// without a static IP are ignored. When a static IP is requested,
    /// gateway and subnet become mandatory and every present field must
    /// parse as a dotted-quad IPv4 address.
    pub fn parse(fields: &StaticAddressing) -> Result<Option<Self>, ValidationError> {
        let ip = match present(&fields.ip) {
            Some(raw) => parse_field(raw, AddressField::Ip)?,
            None => {
                // A gateway or subnet without a static IP violates the
                // all-or-nothing invariant.
                if present(&fields.gateway).is_some() {
                    return Err(ValidationError::MissingField(AddressField::Ip));
                }
                if present(&fields.subnet).is_some() {
                    return Err(ValidationError::MissingField(AddressField::Ip));
                }
                return Ok(None);
            }
        };

        let gateway = present(&fields.gateway)
            .ok_or(ValidationError::MissingField(AddressField::Gateway))
            .and_then(|raw| parse_field(raw, AddressField::Gateway))?;

        let subnet = present(&fields.subnet)
            .ok_or(ValidationError::MissingField(AddressField::Subnet))
            .and_then(|raw| parse_field(raw, AddressField::Subnet))?;

        let dns1 = present(&fields.dns1)
            .map(|raw| parse_field(raw, AddressField::Dns1))
            .transpose()?;

        let dns2 = present(&fields.dns2)
            .map(|raw| parse_field(raw, AddressField::Dns2))
            .transpose()?;

        Ok(Some(Self {
            ip,
            gateway,
            subnet,
            dns1,
            dns2,
        }))
    }

    /// Prefix length of the subnet mask, for `a.b.c.d/len` notation
    pub fn prefix_len(&self) -> u8 {
        u32::from(self.subnet).count_ones() as u8
    }
}

/// Empty strings count as absent, matching the raw text contract
fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.is_empty())
}

fn parse_field(raw: &str, field: AddressField) -> Result<Ipv4Addr, ValidationError> {
    raw.parse::<Ipv4Addr>()
        .map_err(|_| ValidationError::InvalidField(field))
}
