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

use crate::xkey::KeyError;

/// Errors of derivation strategy parsing and composition
#[derive(Clone, PartialEq, Eq, Debug, Display, Error, From)]
#[display(doc_comments)]
pub enum Error {
    /// option '{option}' is not supported by {chain} network
    UnsupportedOption {
        /// lowercased option name
        option: String,
        /// name of the chain the factory is bound to
        chain: String,
    },

    /// option '{0}' is duplicated
    DuplicateOption(String),

    /// segwit is not supported by {0} network; you need to specify option
    /// '-[legacy]'
    SegwitRequired(String),

    /// {0} network does not support segwit
    SegwitNotSupported(String),

    /// option 'legacy' is incompatible with 'p2sh'
    IncompatibleOptions,

    /// {0} envelope can't wrap the given inner strategy, since the result
    /// has no descriptor representation
    InvalidNesting(&'static str),

    /// invalid multisig threshold: {0}
    #[from]
    InvalidThreshold(ThresholdError),

    /// unable to resolve key #{position} '{token}': {source}
    KeyParseFailure {
        /// zero-based position of the key in the descriptor
        position: usize,
        /// key text as it appears in the descriptor
        token: String,
        /// error reported by the key resolver
        source: KeyError,
    },

    /// malformed descriptor '{0}': a single extended public key or
    /// `<m>-of-<key>-<key>...` is expected
    MalformedDescriptor(String),

    /// unable to construct output descriptor: {0}
    OutputDescriptor(String),
}

/// Violations of multisig threshold and key count bounds
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Display, Error)]
#[display(doc_comments)]
pub enum ThresholdError {
    /// multisig requires at least one key
    NoKeys,

    /// multisig requires at least one signature
    Zero,

    /// threshold {threshold} exceeds the number of keys {keys}
    ExceedsKeys {
        /// requested number of signatures
        threshold: usize,
        /// number of keys in the multisig
        keys: usize,
    },

    /// {keys} keys exceed the maximum of {max} keys allowed in {context}
    /// scripts
    TooManyKeys {
        /// number of keys in the multisig
        keys: usize,
        /// maximum allowed for the script context
        max: usize,
        /// script context name
        context: &'static str,
    },
}
