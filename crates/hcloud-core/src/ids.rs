//! Strongly-typed identifiers for Hetzner Cloud resources.
//!
//! Hetzner assigns 64-bit integer ids per resource type. Wrapping them keeps
//! a server id from being passed where a firewall id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Macro to generate strongly-typed id wrapper types.
macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident, $doc:expr) => {
        $(#[$meta])*
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Creates an id from its raw value.
            #[must_use]
            pub const fn new(id: u64) -> Self {
                Self(id)
            }

            /// Returns the raw value.
            #[must_use]
            pub const fn get(self) -> u64 {
                self.0
            }

            /// Parses an id from a decimal string.
            ///
            /// # Errors
            ///
            /// Returns an error if the string is not a positive integer.
            pub fn parse_str(input: &str) -> Result<Self> {
                match input.trim().parse::<u64>() {
                    Ok(0) | Err(_) => Err(Error::InvalidId(input.to_string())),
                    Ok(id) => Ok(Self(id)),
                }
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for u64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                Self::parse_str(s)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(ServerId, "Server id");
id_type!(FirewallId, "Firewall id");
id_type!(SshKeyId, "SSH key id");
id_type!(ActionId, "Action id");
