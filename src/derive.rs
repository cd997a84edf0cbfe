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

//! Derivation of scriptPubkeys and redeem scripts from strategies.

use bitcoin::blockdata::opcodes::all::OP_CHECKMULTISIG;
use bitcoin::blockdata::script::Builder;
use bitcoin::secp256k1::{Secp256k1, Verification};
use bitcoin::util::bip32::{self, ChildNumber, ExtendedPubKey};
use bitcoin::{Address, Network, PublicKey, Script};

use crate::strategy::{DirectStrategy, MultisigStrategy, P2shStrategy, P2wshStrategy};
use crate::DerivationStrategy;

/// Errors during script derivation
#[derive(Clone, PartialEq, Eq, Debug, Display, Error, From)]
#[display(doc_comments)]
pub enum DeriveError {
    /// index {0} is hardened; only unhardened branch and index numbers are
    /// allowed
    HardenedIndex(u32),

    /// unable to derive public key: {0}
    #[from]
    Bip32(bip32::Error),

    /// uncompressed public key can't be used in witness scripts
    UncompressedKey,

    /// derived scriptPubkey has no address representation
    NoAddress,
}

/// Scripts derived by a strategy for a given branch and index
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Derivation {
    /// Output locking script
    pub script_pubkey: Script,

    /// Script committed to by the scriptPubkey hash, if any
    pub redeem: Option<Script>,
}

impl Derivation {
    /// Constructs address for the derived scriptPubkey
    pub fn address(&self, network: Network) -> Result<Address, DeriveError> {
        Address::from_script(&self.script_pubkey, network).map_err(|_| DeriveError::NoAddress)
    }
}

/// Derivation of output scripts from a strategy node
pub trait DeriveScripts {
    /// Derives scripts at the unhardened path `branch/index`
    fn derive<C: Verification>(
        &self,
        secp: &Secp256k1<C>,
        branch: u32,
        index: u32,
    ) -> Result<Derivation, DeriveError>;
}

fn derive_pubkey<C: Verification>(
    secp: &Secp256k1<C>,
    xpub: &ExtendedPubKey,
    branch: u32,
    index: u32,
) -> Result<PublicKey, DeriveError> {
    let path = [normal(branch)?, normal(index)?];
    let derived = xpub.derive_pub(secp, &path)?;
    Ok(PublicKey::new(derived.public_key))
}

fn normal(index: u32) -> Result<ChildNumber, DeriveError> {
    ChildNumber::from_normal_idx(index).map_err(|_| DeriveError::HardenedIndex(index))
}

impl DeriveScripts for DirectStrategy {
    fn derive<C: Verification>(
        &self,
        secp: &Secp256k1<C>,
        branch: u32,
        index: u32,
    ) -> Result<Derivation, DeriveError> {
        let pubkey = derive_pubkey(secp, self.xpub(), branch, index)?;
        let script_pubkey = if self.is_witness() {
            Script::new_v0_p2wpkh(&pubkey.wpubkey_hash().ok_or(DeriveError::UncompressedKey)?)
        } else {
            Script::new_p2pkh(&pubkey.pubkey_hash())
        };
        Ok(Derivation {
            script_pubkey,
            redeem: None,
        })
    }
}

impl DeriveScripts for MultisigStrategy {
    fn derive<C: Verification>(
        &self,
        secp: &Secp256k1<C>,
        branch: u32,
        index: u32,
    ) -> Result<Derivation, DeriveError> {
        let mut pubkeys = self
            .xpubs()
            .iter()
            .map(|xpub| derive_pubkey(secp, xpub, branch, index))
            .collect::<Result<Vec<_>, _>>()?;
        if !self.is_legacy_output() && pubkeys.iter().any(|pk| !pk.compressed) {
            return Err(DeriveError::UncompressedKey);
        }
        if self.sort_keys() {
            pubkeys.sort_by_key(|pk| pk.to_bytes());
        }

        let builder = pubkeys
            .iter()
            .fold(Builder::new().push_int(self.threshold() as i64), |builder, pubkey| {
                builder.push_key(pubkey)
            });
        let script_pubkey = builder
            .push_int(pubkeys.len() as i64)
            .push_opcode(OP_CHECKMULTISIG)
            .into_script();

        Ok(Derivation {
            script_pubkey,
            redeem: None,
        })
    }
}

impl DeriveScripts for P2shStrategy {
    fn derive<C: Verification>(
        &self,
        secp: &Secp256k1<C>,
        branch: u32,
        index: u32,
    ) -> Result<Derivation, DeriveError> {
        let inner = self.inner().derive(secp, branch, index)?;
        Ok(Derivation {
            script_pubkey: Script::new_p2sh(&inner.script_pubkey.script_hash()),
            redeem: Some(inner.redeem.unwrap_or(inner.script_pubkey)),
        })
    }
}

impl DeriveScripts for P2wshStrategy {
    fn derive<C: Verification>(
        &self,
        secp: &Secp256k1<C>,
        branch: u32,
        index: u32,
    ) -> Result<Derivation, DeriveError> {
        let inner = self.inner().derive(secp, branch, index)?;
        Ok(Derivation {
            script_pubkey: Script::new_v0_p2wsh(&inner.script_pubkey.wscript_hash()),
            redeem: Some(inner.script_pubkey),
        })
    }
}

impl DeriveScripts for DerivationStrategy {
    fn derive<C: Verification>(
        &self,
        secp: &Secp256k1<C>,
        branch: u32,
        index: u32,
    ) -> Result<Derivation, DeriveError> {
        match self {
            DerivationStrategy::Direct(direct) => direct.derive(secp, branch, index),
            DerivationStrategy::Multisig(multisig) => multisig.derive(secp, branch, index),
            DerivationStrategy::P2sh(p2sh) => p2sh.derive(secp, branch, index),
            DerivationStrategy::P2wsh(p2wsh) => p2wsh.derive(secp, branch, index),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{fixtures, ChainParams, DerivationOptions, ScriptType};

    fn chain() -> ChainParams { ChainParams::bitcoin(Network::Bitcoin) }

    fn multisig(script_type: ScriptType, keep_order: bool) -> DerivationStrategy {
        let options = DerivationOptions {
            script_type,
            keep_order,
            ..none!()
        };
        let xpubs = fixtures::XPUBS[..3]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        DerivationStrategy::multisig(2, xpubs, options, &chain()).unwrap()
    }

    #[test]
    fn direct_scripts() {
        let secp = Secp256k1::verification_only();
        let xpub = fixtures::xpub(1);
        let pubkey = derive_pubkey(&secp, &xpub, 0, 3).unwrap();

        let strategy = DerivationStrategy::direct(xpub, none!(), &chain()).unwrap();
        let derivation = strategy.derive(&secp, 0, 3).unwrap();
        assert!(derivation.script_pubkey.is_v0_p2wpkh());
        assert_eq!(derivation.redeem, None);
        assert_eq!(
            derivation.address(Network::Bitcoin).unwrap(),
            Address::p2wpkh(&pubkey, Network::Bitcoin).unwrap()
        );
        assert!(derivation
            .address(Network::Bitcoin)
            .unwrap()
            .to_string()
            .starts_with("bc1q"));

        let strategy =
            DerivationStrategy::direct(xpub, ScriptType::Legacy.into(), &chain()).unwrap();
        let derivation = strategy.derive(&secp, 0, 3).unwrap();
        assert_eq!(derivation.script_pubkey, Script::new_p2pkh(&pubkey.pubkey_hash()));

        let strategy =
            DerivationStrategy::direct(xpub, ScriptType::SegwitInP2sh.into(), &chain()).unwrap();
        let derivation = strategy.derive(&secp, 0, 3).unwrap();
        assert!(derivation.script_pubkey.is_p2sh());
        assert_eq!(
            derivation.address(Network::Bitcoin).unwrap(),
            Address::p2shwpkh(&pubkey, Network::Bitcoin).unwrap()
        );
        assert!(derivation.redeem.unwrap().is_v0_p2wpkh());
    }

    #[test]
    fn multisig_scripts() {
        let secp = Secp256k1::verification_only();

        let derivation = multisig(ScriptType::Segwit, false).derive(&secp, 1, 0).unwrap();
        assert!(derivation.script_pubkey.is_v0_p2wsh());
        let witness_script = derivation.redeem.clone().unwrap();
        assert_eq!(derivation.script_pubkey, Script::new_v0_p2wsh(&witness_script.wscript_hash()));
        assert!(derivation
            .address(Network::Bitcoin)
            .unwrap()
            .to_string()
            .starts_with("bc1q"));

        let derivation = multisig(ScriptType::SegwitInP2sh, false).derive(&secp, 1, 0).unwrap();
        assert!(derivation.script_pubkey.is_p2sh());
        assert_eq!(derivation.redeem.unwrap(), witness_script);

        let derivation = multisig(ScriptType::Legacy, false).derive(&secp, 1, 0).unwrap();
        assert!(derivation.script_pubkey.is_p2sh());
        assert_eq!(derivation.redeem.unwrap(), witness_script);
    }

    #[test]
    fn multisig_key_order() {
        let secp = Secp256k1::verification_only();
        let mut pubkeys = fixtures::XPUBS[..3]
            .iter()
            .map(|s| derive_pubkey(&secp, &s.parse().unwrap(), 0, 0).unwrap())
            .collect::<Vec<_>>();

        let unsorted = multisig(ScriptType::Segwit, true).derive(&secp, 0, 0).unwrap();
        let sorted = multisig(ScriptType::Segwit, false).derive(&secp, 0, 0).unwrap();

        let script = |keys: &[PublicKey]| {
            keys.iter()
                .fold(Builder::new().push_int(2), |builder, key| builder.push_key(key))
                .push_int(3)
                .push_opcode(OP_CHECKMULTISIG)
                .into_script()
        };
        assert_eq!(unsorted.redeem.unwrap(), script(&pubkeys));
        pubkeys.sort_by_key(|pk| pk.to_bytes());
        assert_eq!(sorted.redeem.unwrap(), script(&pubkeys));
    }

    #[test]
    fn bare_multisig_has_no_address() {
        let secp = Secp256k1::verification_only();
        let strategy = DerivationStrategy::from(
            MultisigStrategy::new(1, vec![fixtures::xpub(1)], true, true, none!()).unwrap(),
        );
        let derivation = strategy.derive(&secp, 0, 0).unwrap();
        assert_eq!(derivation.address(Network::Bitcoin).unwrap_err(), DeriveError::NoAddress);
    }

    #[test]
    fn hardened_indexes_are_rejected() {
        let secp = Secp256k1::verification_only();
        let strategy = DerivationStrategy::direct(fixtures::xpub(1), none!(), &chain()).unwrap();
        assert_eq!(
            strategy.derive(&secp, 0, 0x8000_0000).unwrap_err(),
            DeriveError::HardenedIndex(0x8000_0000)
        );
        assert_eq!(
            strategy.derive(&secp, 0x8000_0001, 0).unwrap_err(),
            DeriveError::HardenedIndex(0x8000_0001)
        );
    }
}
