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

//! Descriptor options and their validation against chain capabilities.

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use crate::grammar::OptionToken;
use crate::{ChainParams, Error};

/// Option selecting legacy (non-witness) outputs
pub const OPTION_LEGACY: &str = "legacy";
/// Option selecting witness outputs nested into P2SH
pub const OPTION_P2SH: &str = "p2sh";
/// Option disabling lexicographic ordering of multisig keys
pub const OPTION_KEEP_ORDER: &str = "keeporder";

/// Type of scriptPubkey produced by a derivation strategy
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate", rename_all = "kebab-case")
)]
#[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, Display)]
#[repr(u8)]
pub enum ScriptType {
    /// P2PKH for single-sig, bare multisig wrapped in P2SH
    #[display("legacy")]
    Legacy,

    /// Native segwit v0: P2WPKH or P2WSH
    #[display("segwit")]
    Segwit,

    /// Segwit v0 program wrapped in P2SH
    #[display("segwit-p2sh")]
    SegwitInP2sh,
}

impl Default for ScriptType {
    fn default() -> Self { ScriptType::Segwit }
}

impl ScriptType {
    /// Detects whether the script type requires segwit consensus rules
    #[inline]
    pub fn is_segwit(self) -> bool { self != ScriptType::Legacy }
}

/// unrecognized script type name '{_0}'
#[derive(Clone, PartialEq, Eq, Hash, Debug, Display, Error)]
#[display(doc_comments)]
pub struct UnknownScriptType(pub String);

impl FromStr for ScriptType {
    type Err = UnknownScriptType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().trim() {
            "legacy" | "pkh" | "sh" => ScriptType::Legacy,
            "segwit" | "wpkh" | "wsh" => ScriptType::Segwit,
            "segwit-p2sh" | "p2sh" | "shwpkh" | "shwsh" => ScriptType::SegwitInP2sh,
            unknown => return Err(UnknownScriptType(unknown.to_owned())),
        })
    }
}

/// Options controlling how a derivation strategy is composed
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate", rename_all = "camelCase")
)]
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default)]
pub struct DerivationOptions {
    /// Type of the produced scriptPubkeys
    pub script_type: ScriptType,

    /// If set, multisig public keys are not reordered lexicographically
    pub keep_order: bool,

    /// Authorized options not interpreted by the composer, passed through
    /// to the strategy nodes
    pub additional_options: BTreeMap<String, bool>,
}

impl From<ScriptType> for DerivationOptions {
    fn from(script_type: ScriptType) -> Self {
        DerivationOptions {
            script_type,
            ..Default::default()
        }
    }
}

/// Set of option names which may appear in descriptors for a given chain.
///
/// Computed once per strategy factory and never changed afterwards.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct AuthorizedOptions(BTreeSet<String>);

impl AuthorizedOptions {
    /// Computes options authorized by the chain consensus rules
    pub fn for_chain(chain: &ChainParams) -> AuthorizedOptions {
        AuthorizedOptions::with_extra(chain, None::<&str>)
    }

    /// Computes options authorized by the chain consensus rules, extended
    /// with pass-through option names
    pub fn with_extra(
        chain: &ChainParams,
        extra: impl IntoIterator<Item = impl AsRef<str>>,
    ) -> AuthorizedOptions {
        let mut set = BTreeSet::from([OPTION_KEEP_ORDER.to_owned(), OPTION_LEGACY.to_owned()]);
        if chain.supports_segwit {
            set.insert(OPTION_P2SH.to_owned());
        }
        set.extend(extra.into_iter().map(|name| name.as_ref().to_lowercase()));
        AuthorizedOptions(set)
    }

    /// Checks whether the option is authorized
    #[inline]
    pub fn contains(&self, name: &str) -> bool { self.0.contains(name) }

    /// Iterates over authorized option names in lexicographic order
    pub fn iter(&self) -> impl Iterator<Item = &str> { self.0.iter().map(String::as_str) }

    /// Validates descriptor options against the authorized set and the chain
    /// consensus rules, resolving them into [`DerivationOptions`].
    pub fn validate<'token>(
        &self,
        tokens: impl IntoIterator<Item = &'token OptionToken>,
        chain: &ChainParams,
    ) -> Result<DerivationOptions, Error> {
        let mut options = BTreeMap::new();
        for token in tokens {
            if !self.contains(&token.name) {
                return Err(Error::UnsupportedOption {
                    option: token.name.clone(),
                    chain: chain.name.clone(),
                });
            }
            if options.insert(token.name.clone(), true).is_some() {
                return Err(Error::DuplicateOption(token.name.clone()));
            }
        }

        let legacy = options.remove(OPTION_LEGACY).is_some();
        let p2sh = options.remove(OPTION_P2SH).is_some();
        let keep_order = options.remove(OPTION_KEEP_ORDER).is_some();

        if !legacy && !chain.supports_segwit {
            return Err(Error::SegwitRequired(chain.name.clone()));
        }
        if legacy && p2sh {
            return Err(Error::IncompatibleOptions);
        }

        let script_type = match (legacy, p2sh) {
            (true, _) => ScriptType::Legacy,
            (false, true) => ScriptType::SegwitInP2sh,
            (false, false) => ScriptType::Segwit,
        };

        Ok(DerivationOptions {
            script_type,
            keep_order,
            additional_options: options,
        })
    }
}

#[cfg(test)]
mod test {
    use bitcoin::Network;

    use super::*;
    use crate::grammar::tokenize;

    fn validate(chain: &ChainParams, descr: &str) -> Result<DerivationOptions, Error> {
        AuthorizedOptions::for_chain(chain).validate(&tokenize(descr).options, chain)
    }

    #[test]
    fn authorized_set_depends_on_segwit() {
        let segwit = AuthorizedOptions::for_chain(&ChainParams::bitcoin(Network::Bitcoin));
        assert_eq!(segwit.iter().collect::<Vec<_>>(), vec!["keeporder", "legacy", "p2sh"]);

        let legacy =
            AuthorizedOptions::for_chain(&ChainParams::legacy("litecoin-old", Network::Bitcoin));
        assert_eq!(legacy.iter().collect::<Vec<_>>(), vec!["keeporder", "legacy"]);
    }

    #[test]
    fn script_type_resolution() {
        let chain = ChainParams::bitcoin(Network::Testnet);
        assert_eq!(validate(&chain, "key").unwrap(), DerivationOptions::default());
        assert_eq!(validate(&chain, "key-[legacy]").unwrap().script_type, ScriptType::Legacy);
        assert_eq!(validate(&chain, "key-[p2sh]").unwrap().script_type, ScriptType::SegwitInP2sh);

        let options = validate(&chain, "1-of-key-[keeporder]").unwrap();
        assert_eq!(options.script_type, ScriptType::Segwit);
        assert!(options.keep_order);
    }

    #[test]
    fn unsupported_option_names_chain() {
        let chain = ChainParams::legacy("dogecoin", Network::Bitcoin);
        let err = validate(&chain, "key-[legacy]-[p2sh]").unwrap_err();
        assert_eq!(err, Error::UnsupportedOption {
            option: s!("p2sh"),
            chain: s!("dogecoin")
        });
        assert!(err.to_string().contains("'p2sh'"));
        assert!(err.to_string().contains("dogecoin"));

        let chain = ChainParams::bitcoin(Network::Bitcoin);
        assert!(matches!(
            validate(&chain, "key-[taproot]"),
            Err(Error::UnsupportedOption { option, .. }) if option == "taproot"
        ));
    }

    #[test]
    fn duplicates_are_rejected() {
        let chain = ChainParams::bitcoin(Network::Bitcoin);
        assert_eq!(
            validate(&chain, "key-[legacy]-[Legacy]").unwrap_err(),
            Error::DuplicateOption(s!("legacy"))
        );
    }

    #[test]
    fn segwit_required_without_legacy() {
        let chain = ChainParams::legacy("dogecoin", Network::Bitcoin);
        assert_eq!(validate(&chain, "key").unwrap_err(), Error::SegwitRequired(s!("dogecoin")));
        assert_eq!(
            validate(&chain, "key-[keeporder]").unwrap_err(),
            Error::SegwitRequired(s!("dogecoin"))
        );
        assert_eq!(validate(&chain, "key-[legacy]").unwrap().script_type, ScriptType::Legacy);
    }

    #[test]
    fn legacy_and_p2sh_are_incompatible() {
        let chain = ChainParams::bitcoin(Network::Regtest);
        for descr in ["key-[legacy]-[p2sh]", "key-[p2sh]-[legacy]", "2-of-a-b-[p2sh]-[keeporder]-[legacy]"] {
            assert_eq!(validate(&chain, descr).unwrap_err(), Error::IncompatibleOptions);
        }
    }

    #[test]
    fn extra_options_pass_through() {
        let chain = ChainParams::bitcoin(Network::Bitcoin);
        let authorized = AuthorizedOptions::with_extra(&chain, ["Taproot"]);
        assert!(authorized.contains("taproot"));

        let options = authorized.validate(&tokenize("key-[taproot]-[p2sh]").options, &chain).unwrap();
        assert_eq!(options.script_type, ScriptType::SegwitInP2sh);
        assert_eq!(options.additional_options, BTreeMap::from([(s!("taproot"), true)]));
    }

    #[test]
    fn script_type_strings() {
        for script_type in [ScriptType::Legacy, ScriptType::Segwit, ScriptType::SegwitInP2sh] {
            assert_eq!(script_type.to_string().parse::<ScriptType>().unwrap(), script_type);
        }
        assert_eq!(
            "taproot".parse::<ScriptType>().unwrap_err(),
            UnknownScriptType(s!("taproot"))
        );
    }
}
