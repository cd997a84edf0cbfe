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

//! Compiler of compact wallet derivation-strategy descriptors.
//!
//! A descriptor like `2-of-xpub...-xpub...-[p2sh]` is tokenized, its options
//! are validated against the capabilities of the chain, keys are resolved and
//! the result is composed into an immutable [`DerivationStrategy`] tree,
//! which can be rendered back into its canonical text form, used to derive
//! scriptPubkeys or exported as a BIP-380 output descriptor.

// Coding conventions
#![recursion_limit = "256"]
#![deny(dead_code, missing_docs)]

#[macro_use]
extern crate amplify;
#[macro_use]
extern crate lazy_static;
#[cfg(feature = "miniscript")]
extern crate miniscript_crate as miniscript;
#[cfg(feature = "serde")]
#[macro_use]
extern crate serde_crate as serde;

mod chain;
pub mod derive;
#[cfg(feature = "miniscript")]
mod descriptor;
mod error;
mod factory;
pub mod grammar;
pub mod options;
pub mod strategy;
pub mod xkey;

pub use chain::ChainParams;
pub use derive::{Derivation, DeriveError, DeriveScripts};
pub use error::{Error, ThresholdError};
pub use factory::StrategyFactory;
pub use options::{AuthorizedOptions, DerivationOptions, ScriptType, UnknownScriptType};
pub use strategy::{
    DerivationStrategy, DirectStrategy, MultisigStrategy, P2shStrategy, P2wshStrategy,
    MAX_LEGACY_MULTISIG_KEYS, MAX_WITNESS_MULTISIG_KEYS,
};
pub use xkey::{KeyError, KeyResolver, Slip132Resolver};
