// Wallet-level libraries for bitcoin protocol by LNP/BP Association
//
// Written in 2020-2022 by
//     Dr. Maxim Orlovsky <orlovsky@lnp-bp.org>
//
// This software is distributed without any warranty.
//
// You should have received a copy of the Apache-2.0 License
// along with this software.
// If not, see <https://opensource.org/licenses/Apache-2.0>.

use std::fmt::{self, Display, Formatter};

use bitcoin::Network;

/// Consensus capabilities of the chain a strategy factory is bound to.
///
/// Extended keys only distinguish mainnet from "some testnet" in their
/// version bytes, so `network` is used both for key decoding and for address
/// encoding, while `supports_segwit` gates which script types may be
/// constructed.
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate", rename_all = "camelCase")
)]
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct ChainParams {
    /// Human-readable chain name used in error messages
    pub name: String,

    /// Bitcoin network whose key and address encoding is used by the chain
    pub network: Network,

    /// Whether the chain consensus accepts segregated witness outputs
    pub supports_segwit: bool,
}

impl Display for ChainParams {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result { f.write_str(&self.name) }
}

impl From<Network> for ChainParams {
    fn from(network: Network) -> Self { ChainParams::bitcoin(network) }
}

impl ChainParams {
    /// Constructs parameters for one of the bitcoin networks; all of them
    /// support segwit.
    pub fn bitcoin(network: Network) -> ChainParams {
        ChainParams {
            name: network.to_string(),
            network,
            supports_segwit: true,
        }
    }

    /// Constructs parameters for a chain sharing bitcoin key encoding but
    /// lacking segwit consensus rules.
    pub fn legacy(name: impl ToString, network: Network) -> ChainParams {
        ChainParams {
            name: name.to_string(),
            network,
            supports_segwit: false,
        }
    }

    /// Detects whether an extended key decoded with the version bytes of
    /// `key_network` may be used on this chain.
    pub fn accepts_key_network(&self, key_network: Network) -> bool {
        match (self.network, key_network) {
            (Network::Bitcoin, Network::Bitcoin) => true,
            (Network::Bitcoin, _) | (_, Network::Bitcoin) => false,
            _ => true,
        }
    }
}
