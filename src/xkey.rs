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

//! Resolution of textual key tokens into extended public keys.

use bitcoin::util::base58;
use bitcoin::util::bip32::ExtendedPubKey;
use bitcoin::Network;
use slip132::FromSlip132;

use crate::ChainParams;

/// Length of BIP-32 serialized extended key
const EXTENDED_KEY_LEN: usize = 78;

/// Errors resolving extended public keys
#[derive(Clone, PartialEq, Eq, Debug, Display, Error, From)]
#[display(doc_comments)]
pub enum KeyError {
    /// invalid Base58 encoding of the extended key: {0}
    #[from]
    Base58(base58::Error),

    /// extended key must be 78 bytes long, while {0} bytes were provided
    WrongLength(usize),

    /// unrecognized or private extended key: {0}
    #[from]
    Slip132(slip132::Error),

    /// extended key is encoded for {found} network, which can't be used on
    /// {expected} network
    NetworkMismatch {
        /// network of the chain the key is resolved for
        expected: Network,
        /// network detected from the key version
        found: Network,
    },
}

/// Key-management collaborator turning key tokens into extended public keys
/// valid for a given chain.
pub trait KeyResolver {
    /// Resolves key token into an extended public key
    fn resolve_xpub(&self, token: &str, chain: &ChainParams) -> Result<ExtendedPubKey, KeyError>;
}

impl<F> KeyResolver for F
where
    F: Fn(&str, &ChainParams) -> Result<ExtendedPubKey, KeyError>,
{
    fn resolve_xpub(&self, token: &str, chain: &ChainParams) -> Result<ExtendedPubKey, KeyError> {
        self(token, chain)
    }
}

/// Default key resolver accepting BIP-32 `xpub`/`tpub` and SLIP-132
/// application-specific public key encodings.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct Slip132Resolver;

impl KeyResolver for Slip132Resolver {
    fn resolve_xpub(&self, token: &str, chain: &ChainParams) -> Result<ExtendedPubKey, KeyError> {
        let len = base58::from_check(token)?.len();
        if len != EXTENDED_KEY_LEN {
            return Err(KeyError::WrongLength(len));
        }
        let xpub = ExtendedPubKey::from_slip132_str(token)?;
        if !chain.accepts_key_network(xpub.network) {
            return Err(KeyError::NetworkMismatch {
                expected: chain.network,
                found: xpub.network,
            });
        }
        Ok(xpub)
    }
}

#[cfg(test)]
mod test {
    use bitcoin::secp256k1::Secp256k1;
    use bitcoin::util::bip32::ExtendedPrivKey;
    use slip132::{KeyApplication, ToSlip132};

    use super::*;
    use crate::fixtures;

    const APPLICATIONS: [KeyApplication; 5] = [
        KeyApplication::Hashed,
        KeyApplication::SegWit,
        KeyApplication::SegWitMultisig,
        KeyApplication::Nested,
        KeyApplication::NestedMultisig,
    ];

    #[test]
    fn bip32_keys() {
        let chain = ChainParams::bitcoin(Network::Bitcoin);
        for xpub in fixtures::XPUBS {
            let key = Slip132Resolver.resolve_xpub(xpub, &chain).unwrap();
            assert_eq!(key.to_string(), xpub);
        }

        let chain = ChainParams::bitcoin(Network::Regtest);
        let tpub = fixtures::tpub(1);
        let key = Slip132Resolver.resolve_xpub(&tpub.to_string(), &chain).unwrap();
        assert_eq!(key, tpub);
    }

    #[test]
    fn slip132_keys() {
        let xpub = fixtures::xpub(2);
        let chain = ChainParams::bitcoin(Network::Bitcoin);
        for application in APPLICATIONS {
            let s = xpub.to_slip132_string(application, Network::Bitcoin);
            assert_eq!(Slip132Resolver.resolve_xpub(&s, &chain).unwrap(), xpub);
        }

        let tpub = fixtures::tpub(3);
        let chain = ChainParams::bitcoin(Network::Testnet);
        for application in APPLICATIONS {
            let s = tpub.to_slip132_string(application, Network::Testnet);
            assert_eq!(Slip132Resolver.resolve_xpub(&s, &chain).unwrap(), tpub);
        }
    }

    #[test]
    fn network_mismatch() {
        let chain = ChainParams::bitcoin(Network::Testnet);
        assert_eq!(
            Slip132Resolver
                .resolve_xpub(fixtures::XPUBS[0], &chain)
                .unwrap_err(),
            KeyError::NetworkMismatch {
                expected: Network::Testnet,
                found: Network::Bitcoin
            }
        );
        let chain = ChainParams::bitcoin(Network::Bitcoin);
        assert!(matches!(
            Slip132Resolver.resolve_xpub(&fixtures::tpub(1).to_string(), &chain),
            Err(KeyError::NetworkMismatch { .. })
        ));
        // zpub-style testnet encoding is still a testnet key
        let vpub = fixtures::tpub(1).to_slip132_string(KeyApplication::SegWit, Network::Testnet);
        assert!(matches!(
            Slip132Resolver.resolve_xpub(&vpub, &chain),
            Err(KeyError::NetworkMismatch { .. })
        ));
    }

    #[test]
    fn private_keys_are_rejected() {
        let chain = ChainParams::bitcoin(Network::Bitcoin);
        let xpriv = ExtendedPrivKey::new_master(Network::Bitcoin, &[7u8; 32]).unwrap();
        assert_eq!(
            Slip132Resolver
                .resolve_xpub(&xpriv.to_string(), &chain)
                .unwrap_err(),
            KeyError::Slip132(slip132::Error::UnknownSlip32Prefix)
        );
        // public part of the same key is fine
        let xpub = ExtendedPubKey::from_priv(&Secp256k1::new(), &xpriv);
        assert_eq!(Slip132Resolver.resolve_xpub(&xpub.to_string(), &chain).unwrap(), xpub);
    }

    #[test]
    fn garbage_tokens() {
        let chain = ChainParams::bitcoin(Network::Bitcoin);
        assert!(matches!(
            Slip132Resolver.resolve_xpub("notakey", &chain),
            Err(KeyError::Base58(_))
        ));
        assert_eq!(
            Slip132Resolver
                .resolve_xpub(&base58::check_encode_slice(&[0u8; 2]), &chain)
                .unwrap_err(),
            KeyError::WrongLength(2)
        );
        assert_eq!(
            Slip132Resolver
                .resolve_xpub(&base58::check_encode_slice(&[0u8; 10]), &chain)
                .unwrap_err(),
            KeyError::WrongLength(10)
        );
    }

    #[test]
    fn closures_resolve_keys() {
        let resolver = |_: &str, _: &ChainParams| Ok::<_, KeyError>(fixtures::xpub(9));
        let chain = ChainParams::bitcoin(Network::Bitcoin);
        assert_eq!(resolver.resolve_xpub("anything", &chain).unwrap(), fixtures::xpub(9));
    }
}
