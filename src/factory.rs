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

use bitcoin::util::bip32::ExtendedPubKey;
use tracing::{debug, trace};

use crate::grammar::{self, Shape};
use crate::options::AuthorizedOptions;
use crate::xkey::{KeyResolver, Slip132Resolver};
use crate::{ChainParams, DerivationOptions, DerivationStrategy, Error};

/// Network-scoped entry point for parsing and constructing derivation
/// strategies.
///
/// The set of authorized options is computed once on construction; the
/// factory is immutable afterwards and may be shared between threads.
#[derive(Clone, Debug)]
pub struct StrategyFactory<R: KeyResolver = Slip132Resolver> {
    chain: ChainParams,
    authorized: AuthorizedOptions,
    resolver: R,
}

impl StrategyFactory {
    /// Constructs factory for the chain using the default SLIP-132 key
    /// resolver
    pub fn new(chain: ChainParams) -> StrategyFactory {
        StrategyFactory::with_resolver(chain, Slip132Resolver)
    }

    /// Constructs factory which additionally authorizes pass-through option
    /// names; such options are not interpreted and are retained by the
    /// strategy leaf
    pub fn with_extra_options(
        chain: ChainParams,
        extra: impl IntoIterator<Item = impl AsRef<str>>,
    ) -> StrategyFactory {
        StrategyFactory {
            authorized: AuthorizedOptions::with_extra(&chain, extra),
            chain,
            resolver: Slip132Resolver,
        }
    }
}

impl<R: KeyResolver> StrategyFactory<R> {
    /// Constructs factory for the chain with a custom key resolver
    pub fn with_resolver(chain: ChainParams, resolver: R) -> StrategyFactory<R> {
        StrategyFactory {
            authorized: AuthorizedOptions::for_chain(&chain),
            chain,
            resolver,
        }
    }

    /// Chain the factory is bound to
    #[inline]
    pub fn chain(&self) -> &ChainParams { &self.chain }

    /// Options which may be used in descriptors parsed by the factory
    #[inline]
    pub fn authorized_options(&self) -> &AuthorizedOptions { &self.authorized }

    /// Parses descriptor text into a composed derivation strategy
    pub fn parse(&self, descriptor: &str) -> Result<DerivationStrategy, Error> {
        trace!(%descriptor, chain = %self.chain, "parsing derivation strategy");

        let tokens = grammar::tokenize(descriptor);
        let options = self.authorized.validate(&tokens.options, &self.chain)?;
        trace!(body = %tokens.body, ?options, "descriptor options validated");

        let strategy = match tokens.shape()? {
            Shape::Single(token) => {
                let xpub = self.resolve(0, token)?;
                DerivationStrategy::direct(xpub, options, &self.chain)?
            }
            Shape::Multisig { threshold, keys } => {
                let xpubs = keys
                    .into_iter()
                    .enumerate()
                    .map(|(position, token)| self.resolve(position, token))
                    .collect::<Result<Vec<_>, _>>()?;
                DerivationStrategy::multisig(threshold as usize, xpubs, options, &self.chain)?
            }
        };

        debug!(%strategy, script_type = %strategy.script_type(), "derivation strategy parsed");
        Ok(strategy)
    }

    /// Constructs single-key strategy; `options` default to native segwit
    pub fn create_direct(
        &self,
        xpub: ExtendedPubKey,
        options: Option<DerivationOptions>,
    ) -> Result<DerivationStrategy, Error> {
        let options = options.unwrap_or_default();
        trace!(%xpub, ?options, "constructing single-key strategy");
        DerivationStrategy::direct(xpub, options, &self.chain)
    }

    /// Constructs `threshold`-of-`xpubs` multisig strategy; `options` default
    /// to native segwit with sorted keys
    pub fn create_multisig(
        &self,
        xpubs: Vec<ExtendedPubKey>,
        threshold: usize,
        options: Option<DerivationOptions>,
    ) -> Result<DerivationStrategy, Error> {
        let options = options.unwrap_or_default();
        trace!(threshold, keys = xpubs.len(), ?options, "constructing multisig strategy");
        DerivationStrategy::multisig(threshold, xpubs, options, &self.chain)
    }

    fn resolve(&self, position: usize, token: &str) -> Result<ExtendedPubKey, Error> {
        self.resolver.resolve_xpub(token, &self.chain).map_err(|source| {
            debug!(position, token, %source, "unable to resolve extended key");
            Error::KeyParseFailure {
                position,
                token: token.to_owned(),
                source,
            }
        })
    }
}
