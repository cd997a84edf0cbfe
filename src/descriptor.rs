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

//! Conversion of derivation strategies into BIP-380 output descriptors.

use std::str::FromStr;

use miniscript::descriptor::DescriptorPublicKey;
use miniscript::Descriptor;

use crate::{DerivationStrategy, Error};

impl DerivationStrategy {
    /// Renders strategy as an output descriptor over keys derived at
    /// `<xpub>/<branch>/*`
    pub fn to_output_descriptor(&self, branch: u32) -> Result<Descriptor<DescriptorPublicKey>, Error> {
        let s = self.descriptor_string(branch);
        Descriptor::<DescriptorPublicKey>::from_str(&s)
            .map_err(|err| Error::OutputDescriptor(err.to_string()))
    }

    fn descriptor_string(&self, branch: u32) -> String {
        match self {
            DerivationStrategy::Direct(direct) if direct.is_witness() => {
                format!("wpkh({}/{}/*)", direct.xpub(), branch)
            }
            DerivationStrategy::Direct(direct) => format!("pkh({}/{}/*)", direct.xpub(), branch),
            DerivationStrategy::Multisig(multisig) => {
                let keys = multisig
                    .xpubs()
                    .iter()
                    .map(|xpub| format!("{}/{}/*", xpub, branch))
                    .collect::<Vec<_>>()
                    .join(",");
                let name = if multisig.sort_keys() { "sortedmulti" } else { "multi" };
                format!("{}({},{})", name, multisig.threshold(), keys)
            }
            DerivationStrategy::P2sh(p2sh) => format!("sh({})", p2sh.inner().descriptor_string(branch)),
            DerivationStrategy::P2wsh(p2wsh) => {
                format!("wsh({})", p2wsh.inner().descriptor_string(branch))
            }
        }
    }
}
