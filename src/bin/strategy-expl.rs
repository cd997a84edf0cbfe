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

#![allow(clippy::result_large_err)]

#[macro_use]
extern crate clap;
#[macro_use]
extern crate amplify;

use std::path::PathBuf;
use std::{fs, io};

use amplify::IoError;
use bitcoin::hashes::hex::ToHex;
use bitcoin::secp256k1::Secp256k1;
use bitcoin::Network;
use clap::Parser;
use colored::Colorize;
use strategy::{ChainParams, DerivationStrategy, DeriveError, DeriveScripts, StrategyFactory};
use tracing_subscriber::EnvFilter;

/// Command-line arguments
#[derive(Parser)]
#[derive(Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
#[clap(
    author,
    version,
    name = "strategy-expl",
    about = "Command-line explorer for wallet derivation strategies"
)]
pub struct Args {
    /// Command to execute
    #[clap(subcommand)]
    pub command: Command,

    /// Network which key versions and addresses are used for.
    #[clap(short, long, global = true, default_value = "bitcoin")]
    network: Network,

    /// YAML file with chain parameters (`name`, `network`,
    /// `supportsSegwit`). Takes precedence over `--network`.
    #[clap(long, global = true)]
    chain: Option<PathBuf>,

    /// Additional option names accepted in descriptors and passed through
    /// to the strategy without interpretation.
    #[clap(long = "allow-option", global = true)]
    allow_options: Vec<String>,
}

/// Explorer command to execute
#[derive(Subcommand)]
#[derive(Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub enum Command {
    /// Parse descriptor and print the composed strategy tree
    Parse {
        /// Strategy descriptor, like `2-of-xpub...-xpub...-[p2sh]`
        descriptor: String,
    },

    /// Derive scriptPubkeys and addresses for a range of indexes
    Derive {
        /// Strategy descriptor
        descriptor: String,

        /// Derivation branch (0 for receiving, 1 for change addresses)
        #[clap(short, long, default_value = "0")]
        branch: u32,

        /// First index to derive
        #[clap(short, long, default_value = "0")]
        from: u32,

        /// Number of indexes to derive
        #[clap(short, long, default_value = "10")]
        count: u32,
    },

    /// Convert strategy into BIP-380 output descriptor
    Descriptor {
        /// Strategy descriptor
        descriptor: String,

        /// Derivation branch to put into key paths
        #[clap(short, long, default_value = "0")]
        branch: u32,
    },
}

impl Args {
    pub fn exec(self) -> Result<(), Error> {
        match &self.command {
            Command::Parse { descriptor } => self.show_strategy(descriptor),
            Command::Derive {
                descriptor,
                branch,
                from,
                count,
            } => self.derive_scripts(descriptor, *branch, *from, *count),
            Command::Descriptor { descriptor, branch } => {
                self.output_descriptor(descriptor, *branch)
            },
        }
    }

    fn factory(&self) -> Result<StrategyFactory, Error> {
        let chain = match &self.chain {
            Some(path) => serde_yaml::from_str(&fs::read_to_string(path)?)?,
            None => ChainParams::bitcoin(self.network),
        };
        eprintln!(
            "Using {} chain with segwit {}",
            chain.name.yellow(),
            if chain.supports_segwit { "enabled".green() } else { "disabled".red() }
        );
        Ok(StrategyFactory::with_extra_options(chain, &self.allow_options))
    }

    fn show_strategy(&self, descriptor: &str) -> Result<(), Error> {
        let strategy = self.factory()?.parse(descriptor)?;

        println!("\n{}", "Strategy tree:".bold());
        print_tree(&strategy, 1);

        let options = strategy.options();
        println!("\nScript type: {}", options.script_type.to_string().bright_white());
        if strategy.xpubs().len() > 1 {
            println!("Keys sorted: {}", !options.keep_order);
        }
        for name in options.additional_options.keys() {
            println!("Pass-through option: {}", name);
        }
        println!("\n{}\n{}\n", "Canonical form:".bold(), strategy);
        Ok(())
    }

    fn derive_scripts(&self, descriptor: &str, branch: u32, from: u32, count: u32) -> Result<(), Error> {
        let factory = self.factory()?;
        let strategy = factory.parse(descriptor)?;
        let network = factory.chain().network;
        let secp = Secp256k1::verification_only();

        println!();
        for index in from..from.saturating_add(count) {
            let derivation = strategy.derive(&secp, branch, index)?;
            let address = derivation
                .address(network)
                .map(|addr| addr.to_string())
                .unwrap_or_else(|_| s!("<no address>"));
            println!("{}/{}\t{}", branch, index, address.bright_green());
            println!("\tscriptPubkey {}", derivation.script_pubkey.to_hex());
            if let Some(redeem) = derivation.redeem {
                let multisig = matches!(strategy.leaf(), DerivationStrategy::Multisig(_));
                let name = if multisig && strategy.is_segwit() {
                    "witnessScript"
                } else {
                    "redeemScript"
                };
                println!("\t{} {}", name, redeem.to_hex());
            }
        }
        println!();
        Ok(())
    }

    fn output_descriptor(&self, descriptor: &str, branch: u32) -> Result<(), Error> {
        let output = self.factory()?.parse(descriptor)?.to_output_descriptor(branch)?;
        println!("\n{}\n", output);
        Ok(())
    }
}

fn print_tree(strategy: &DerivationStrategy, depth: usize) {
    let indent = "  ".repeat(depth);
    match strategy {
        DerivationStrategy::Direct(direct) => {
            let kind = if direct.is_witness() { "P2WPKH" } else { "P2PKH" };
            println!("{}{} {}", indent, kind.cyan(), direct.xpub());
        }
        DerivationStrategy::Multisig(multisig) => {
            println!(
                "{}{} {}-of-{}{}",
                indent,
                "Multisig".cyan(),
                multisig.threshold(),
                multisig.xpubs().len(),
                if multisig.sort_keys() { ", sorted keys" } else { "" }
            );
            for xpub in multisig.xpubs() {
                println!("{}  {}", indent, xpub);
            }
        }
        DerivationStrategy::P2sh(p2sh) => {
            println!("{}{}", indent, "P2SH".cyan());
            print_tree(p2sh.inner(), depth + 1);
        }
        DerivationStrategy::P2wsh(p2wsh) => {
            println!("{}{}", indent, "P2WSH".cyan());
            print_tree(p2wsh.inner(), depth + 1);
        }
    }
}

#[derive(Debug, Display, Error, From)]
#[display(inner)]
pub enum Error {
    #[from(io::Error)]
    Io(IoError),

    #[from]
    Yaml(serde_yaml::Error),

    #[from]
    Strategy(strategy::Error),

    #[from]
    Derive(DeriveError),
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    if let Err(err) = args.exec() {
        eprintln!("{}: {}\n", "Error".bright_red(), err);
    }
}
