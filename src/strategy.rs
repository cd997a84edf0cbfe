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

//! Derivation strategy tree and its composition from validated options.
//!
//! A strategy is either a leaf ([`DirectStrategy`], [`MultisigStrategy`]) or
//! a wrapper owning exactly one child ([`P2shStrategy`], [`P2wshStrategy`]).
//! Valid nestings produced by [`DerivationStrategy::direct`] and
//! [`DerivationStrategy::multisig`] are:
//!
//! ```text
//! Direct(witness)                    xpub
//! Direct(legacy)                     xpub-[legacy]
//! P2sh(Direct(witness))              xpub-[p2sh]
//! P2wsh(Multisig)                    2-of-xpub-xpub
//! P2sh(P2wsh(Multisig))              2-of-xpub-xpub-[p2sh]
//! P2sh(Multisig(legacy))             2-of-xpub-xpub-[legacy]
//! ```

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

use bitcoin::util::bip32::ExtendedPubKey;

use crate::options::{OPTION_KEEP_ORDER, OPTION_LEGACY, OPTION_P2SH};
use crate::{ChainParams, DerivationOptions, Error, ScriptType, ThresholdError};

/// Maximum number of keys in a multisig redeemed through a legacy P2SH
/// envelope
pub const MAX_LEGACY_MULTISIG_KEYS: usize = 15;

/// Maximum number of keys in a multisig used as a witness script
pub const MAX_WITNESS_MULTISIG_KEYS: usize = 20;

fn fmt_extra_options(options: &BTreeMap<String, bool>, f: &mut Formatter<'_>) -> fmt::Result {
    for name in options.keys() {
        write!(f, "-[{}]", name)?;
    }
    Ok(())
}

/// Single-signature strategy over one extended public key
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct DirectStrategy {
    xpub: ExtendedPubKey,
    witness: bool,
    extra_options: BTreeMap<String, bool>,
}

impl DirectStrategy {
    /// Constructs P2WPKH (`witness` set) or P2PKH single-sig strategy
    pub fn new(
        xpub: ExtendedPubKey,
        witness: bool,
        extra_options: BTreeMap<String, bool>,
    ) -> DirectStrategy {
        DirectStrategy {
            xpub,
            witness,
            extra_options,
        }
    }

    /// Extended public key of the strategy
    #[inline]
    pub fn xpub(&self) -> &ExtendedPubKey { &self.xpub }

    /// Whether scriptPubkeys use native witness encoding
    #[inline]
    pub fn is_witness(&self) -> bool { self.witness }

    /// Pass-through options attached to the strategy
    #[inline]
    pub fn extra_options(&self) -> &BTreeMap<String, bool> { &self.extra_options }
}

impl Display for DirectStrategy {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.xpub, f)?;
        if !self.witness {
            write!(f, "-[{}]", OPTION_LEGACY)?;
        }
        fmt_extra_options(&self.extra_options, f)
    }
}

/// Threshold multisig strategy over an ordered set of extended public keys.
///
/// Keys are kept in the order they were provided; lexicographic sorting, if
/// requested, is applied only when the script is constructed.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct MultisigStrategy {
    threshold: usize,
    xpubs: Vec<ExtendedPubKey>,
    legacy_output: bool,
    sort_keys: bool,
    extra_options: BTreeMap<String, bool>,
}

impl MultisigStrategy {
    /// Constructs multisig strategy checking threshold and key count against
    /// the limits of the script context
    pub fn new(
        threshold: usize,
        xpubs: Vec<ExtendedPubKey>,
        legacy_output: bool,
        sort_keys: bool,
        extra_options: BTreeMap<String, bool>,
    ) -> Result<MultisigStrategy, ThresholdError> {
        let keys = xpubs.len();
        let (max, context) = if legacy_output {
            (MAX_LEGACY_MULTISIG_KEYS, "legacy P2SH")
        } else {
            (MAX_WITNESS_MULTISIG_KEYS, "witness")
        };

        if keys == 0 {
            return Err(ThresholdError::NoKeys);
        }
        if threshold == 0 {
            return Err(ThresholdError::Zero);
        }
        if threshold > keys {
            return Err(ThresholdError::ExceedsKeys { threshold, keys });
        }
        if keys > max {
            return Err(ThresholdError::TooManyKeys { keys, max, context });
        }

        Ok(MultisigStrategy {
            threshold,
            xpubs,
            legacy_output,
            sort_keys,
            extra_options,
        })
    }

    /// Number of signatures required
    #[inline]
    pub fn threshold(&self) -> usize { self.threshold }

    /// Extended public keys in the order they were provided
    #[inline]
    pub fn xpubs(&self) -> &[ExtendedPubKey] { &self.xpubs }

    /// Whether the script is redeemed through a legacy (non-witness) envelope
    #[inline]
    pub fn is_legacy_output(&self) -> bool { self.legacy_output }

    /// Whether derived keys are sorted before script construction (BIP-67)
    #[inline]
    pub fn sort_keys(&self) -> bool { self.sort_keys }

    /// Pass-through options attached to the strategy
    #[inline]
    pub fn extra_options(&self) -> &BTreeMap<String, bool> { &self.extra_options }
}

impl Display for MultisigStrategy {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}-of", self.threshold)?;
        for xpub in &self.xpubs {
            write!(f, "-{}", xpub)?;
        }
        if self.legacy_output {
            write!(f, "-[{}]", OPTION_LEGACY)?;
        }
        if !self.sort_keys {
            write!(f, "-[{}]", OPTION_KEEP_ORDER)?;
        }
        fmt_extra_options(&self.extra_options, f)
    }
}

/// Strategy wrapping inner script into a P2SH envelope
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct P2shStrategy {
    inner: Box<DerivationStrategy>,
    inner_is_witness: bool,
}

impl P2shStrategy {
    /// Wraps inner strategy. The inner script must be either a P2WPKH
    /// single key, a multisig with legacy output or a P2WSH envelope; the
    /// witness flag is set for the two witness programs.
    pub fn new(inner: DerivationStrategy) -> Result<P2shStrategy, Error> {
        match &inner {
            DerivationStrategy::Direct(direct) if direct.is_witness() => {}
            DerivationStrategy::Multisig(multisig) if multisig.is_legacy_output() => {}
            DerivationStrategy::P2wsh(_) => {}
            _ => return Err(Error::InvalidNesting("P2SH")),
        }
        Ok(P2shStrategy {
            inner_is_witness: inner.is_witness_program(),
            inner: Box::new(inner),
        })
    }

    /// Wrapped strategy
    #[inline]
    pub fn inner(&self) -> &DerivationStrategy { &self.inner }

    /// Whether the wrapped script is a witness program
    #[inline]
    pub fn is_inner_witness(&self) -> bool { self.inner_is_witness }
}

impl Display for P2shStrategy {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.inner, f)?;
        if self.inner_is_witness {
            write!(f, "-[{}]", OPTION_P2SH)?;
        }
        Ok(())
    }
}

/// Strategy wrapping inner script into a P2WSH envelope
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct P2wshStrategy {
    inner: Box<DerivationStrategy>,
}

impl P2wshStrategy {
    /// Wraps multisig strategy with witness output, failing on chains
    /// without segwit support
    pub fn new(inner: DerivationStrategy, chain: &ChainParams) -> Result<P2wshStrategy, Error> {
        if !chain.supports_segwit {
            return Err(Error::SegwitNotSupported(chain.name.clone()));
        }
        if !matches!(&inner, DerivationStrategy::Multisig(multisig) if !multisig.is_legacy_output())
        {
            return Err(Error::InvalidNesting("P2WSH"));
        }
        Ok(P2wshStrategy {
            inner: Box::new(inner),
        })
    }

    /// Wrapped strategy
    #[inline]
    pub fn inner(&self) -> &DerivationStrategy { &self.inner }
}

impl Display for P2wshStrategy {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result { Display::fmt(&self.inner, f) }
}

/// Composed derivation strategy of a wallet
#[derive(Clone, PartialEq, Eq, Hash, Debug, From)]
pub enum DerivationStrategy {
    /// Single-sig key
    #[from]
    Direct(DirectStrategy),

    /// Bare threshold multisig
    #[from]
    Multisig(MultisigStrategy),

    /// P2SH envelope
    #[from]
    P2sh(P2shStrategy),

    /// P2WSH envelope
    #[from]
    P2wsh(P2wshStrategy),
}

impl Display for DerivationStrategy {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            DerivationStrategy::Direct(direct) => Display::fmt(direct, f),
            DerivationStrategy::Multisig(multisig) => Display::fmt(multisig, f),
            DerivationStrategy::P2sh(p2sh) => Display::fmt(p2sh, f),
            DerivationStrategy::P2wsh(p2wsh) => Display::fmt(p2wsh, f),
        }
    }
}

impl DerivationStrategy {
    /// Composes single-key strategy for the given options
    pub fn direct(
        xpub: ExtendedPubKey,
        options: DerivationOptions,
        chain: &ChainParams,
    ) -> Result<DerivationStrategy, Error> {
        let script_type = options.script_type;
        let direct = DirectStrategy::new(xpub, script_type.is_segwit(), options.additional_options);
        if script_type.is_segwit() && !chain.supports_segwit {
            return Err(Error::SegwitNotSupported(chain.name.clone()));
        }
        Ok(match script_type {
            ScriptType::SegwitInP2sh => P2shStrategy::new(direct.into())?.into(),
            ScriptType::Segwit | ScriptType::Legacy => direct.into(),
        })
    }

    /// Composes threshold multisig strategy for the given options
    pub fn multisig(
        threshold: usize,
        xpubs: Vec<ExtendedPubKey>,
        options: DerivationOptions,
        chain: &ChainParams,
    ) -> Result<DerivationStrategy, Error> {
        let script_type = options.script_type;
        let multisig = MultisigStrategy::new(
            threshold,
            xpubs,
            script_type == ScriptType::Legacy,
            !options.keep_order,
            options.additional_options,
        )?;

        if script_type == ScriptType::Legacy {
            return Ok(P2shStrategy::new(multisig.into())?.into());
        }

        let p2wsh = DerivationStrategy::from(P2wshStrategy::new(multisig.into(), chain)?);
        Ok(match script_type {
            ScriptType::SegwitInP2sh => P2shStrategy::new(p2wsh)?.into(),
            _ => p2wsh,
        })
    }

    /// Returns the leaf strategy of the tree
    pub fn leaf(&self) -> &DerivationStrategy {
        match self {
            DerivationStrategy::P2sh(p2sh) => p2sh.inner().leaf(),
            DerivationStrategy::P2wsh(p2wsh) => p2wsh.inner().leaf(),
            leaf => leaf,
        }
    }

    /// Extended public keys used by the strategy, in declaration order
    pub fn xpubs(&self) -> Vec<ExtendedPubKey> {
        match self.leaf() {
            DerivationStrategy::Direct(direct) => vec![*direct.xpub()],
            DerivationStrategy::Multisig(multisig) => multisig.xpubs().to_vec(),
            _ => vec![],
        }
    }

    /// Type of scriptPubkeys produced by the strategy
    pub fn script_type(&self) -> ScriptType {
        match self {
            DerivationStrategy::Direct(direct) if direct.is_witness() => ScriptType::Segwit,
            DerivationStrategy::Direct(_) => ScriptType::Legacy,
            DerivationStrategy::Multisig(multisig) if multisig.is_legacy_output() => {
                ScriptType::Legacy
            }
            DerivationStrategy::Multisig(_) => ScriptType::Segwit,
            DerivationStrategy::P2sh(p2sh) if p2sh.is_inner_witness() => ScriptType::SegwitInP2sh,
            DerivationStrategy::P2sh(_) => ScriptType::Legacy,
            DerivationStrategy::P2wsh(_) => ScriptType::Segwit,
        }
    }

    /// Reconstructs options the strategy was composed with
    pub fn options(&self) -> DerivationOptions {
        let (keep_order, additional_options) = match self.leaf() {
            DerivationStrategy::Direct(direct) => (false, direct.extra_options().clone()),
            DerivationStrategy::Multisig(multisig) => {
                (!multisig.sort_keys(), multisig.extra_options().clone())
            }
            _ => (false, none!()),
        };
        DerivationOptions {
            script_type: self.script_type(),
            keep_order,
            additional_options,
        }
    }

    /// Whether the strategy requires segwit consensus rules
    #[inline]
    pub fn is_segwit(&self) -> bool { self.script_type().is_segwit() }

    pub(crate) fn is_witness_program(&self) -> bool {
        match self {
            DerivationStrategy::Direct(direct) => direct.is_witness(),
            DerivationStrategy::Multisig(_) | DerivationStrategy::P2sh(_) => false,
            DerivationStrategy::P2wsh(_) => true,
        }
    }
}
