//! Native balance display.

use std::fmt;

use alloy_primitives::U256;
use tracing::warn;

use crate::address::Address;
use crate::chain::ChainReader;
use crate::units::format_units;

/// Decimals of the native currency.
const NATIVE_DECIMALS: u8 = 18;

/// Digits shown after the decimal point.
const DISPLAY_PRECISION: u8 = 6;

/// A native balance that may have failed to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Balance {
    /// Balance in wei.
    Known(U256),
    /// The last refresh failed.
    Unknown,
}

impl Balance {
    /// Reads `account`'s balance. A failed read becomes [`Balance::Unknown`].
    pub async fn refresh(reader: &dyn ChainReader, account: Address) -> Self {
        match reader.balance(account).await {
            Ok(wei) => Self::Known(wei),
            Err(err) => {
                warn!(%account, error = %err, "balance refresh failed");
                Self::Unknown
            }
        }
    }

    /// Returns the balance in wei, if known.
    #[must_use]
    pub const fn wei(&self) -> Option<U256> {
        match self {
            Self::Known(wei) => Some(*wei),
            Self::Unknown => None,
        }
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(wei) => {
                let ether =
                    format_units(*wei, NATIVE_DECIMALS, DISPLAY_PRECISION).map_err(|_| fmt::Error)?;
                write!(f, "{ether} ETH")
            }
            Self::Unknown => f.write_str("unknown"),
        }
    }
}
