//! Hardware-address value type for derived monitor addresses.
//!
//! The reconciler self-heals the upstream `svc_monitor_mac` option: a
//! well-formed address is adopted as-is, anything else is replaced by a
//! freshly generated unicast, locally-administered address.

use std::fmt;
use std::str::FromStr;

use rand::RngCore;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A 48-bit hardware address.
///
/// Canonical text form is lowercase colon-separated hex
/// (`aa:bb:cc:dd:ee:ff`); parsing accepts either case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EthAddr(pub [u8; 6]);

impl EthAddr {
    /// Generates a random unicast, locally-administered address.
    pub fn random<R: RngCore + ?Sized>(rng: &mut R) -> Self {
        let mut octets = [0u8; 6];
        rng.fill_bytes(&mut octets);
        // Clear the multicast bit, set the locally-administered bit.
        octets[0] = (octets[0] & 0xfe) | 0x02;
        Self(octets)
    }

    /// Whether the multicast bit is clear.
    #[must_use]
    pub fn is_unicast(&self) -> bool {
        self.0[0] & 0x01 == 0
    }

    /// Whether the locally-administered bit is set.
    #[must_use]
    pub fn is_local(&self) -> bool {
        self.0[0] & 0x02 != 0
    }
}

impl fmt::Display for EthAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let o = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            o[0], o[1], o[2], o[3], o[4], o[5]
        )
    }
}

/// Error parsing a hardware-address string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed hardware address: {input}")]
pub struct ParseEthAddrError {
    /// The rejected input.
    pub input: String,
}

impl FromStr for EthAddr {
    type Err = ParseEthAddrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let reject = || ParseEthAddrError {
            input: s.to_string(),
        };

        let mut octets = [0u8; 6];
        let mut parts = s.split(':');
        for octet in &mut octets {
            let part = parts.next().ok_or_else(reject)?;
            if part.len() != 2 {
                return Err(reject());
            }
            *octet = u8::from_str_radix(part, 16).map_err(|_| reject())?;
        }
        if parts.next().is_some() {
            return Err(reject());
        }
        Ok(Self(octets))
    }
}

impl Serialize for EthAddr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

struct EthAddrVisitor;

impl Visitor<'_> for EthAddrVisitor {
    type Value = EthAddr;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a colon-separated hardware address")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        v.parse().map_err(de::Error::custom)
    }
}

impl<'de> Deserialize<'de> for EthAddr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_str(EthAddrVisitor)
    }
}
