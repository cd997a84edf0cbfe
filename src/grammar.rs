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

//! Front end of the strategy descriptor compiler.
//!
//! The descriptor text is a key body (a single extended public key or
//! `<m>-of-<key>-<key>...`) interleaved with option tokens of the form
//! `-[name]`:
//!
//! ```text
//! xpub6ASuArnXK...-[legacy]
//! 2-of-xpub68Gmy5Edv...-xpub6ASuArnXK...-[keeporder]-[p2sh]
//! ```

use regex::Regex;

use crate::Error;

static ERR: &str = "wrong build-in descriptor grammar regex syntax";

lazy_static! {
    static ref RE_OPTION: Regex = Regex::new(r"-\[([^\s\]\-]+)\]").expect(ERR);
    static ref RE_MULTISIG: Regex =
        Regex::new(r"^(?P<threshold>[0-9]{1,2})-of(?P<keys>(-[A-Za-z0-9]+)+)$").expect(ERR);
    static ref RE_SINGLE: Regex = Regex::new(r"^[A-Za-z0-9]+$").expect(ERR);
}

/// Option token extracted from the descriptor text
#[derive(Clone, PartialEq, Eq, Hash, Debug, Display)]
#[display("{name}")]
pub struct OptionToken {
    /// Option name, lowercased
    pub name: String,

    /// Byte offset of the token inside the original descriptor
    pub pos: usize,
}

/// Descriptor text split into option tokens and the key body
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Tokens {
    /// Options in order of their appearance
    pub options: Vec<OptionToken>,

    /// Descriptor text with all option tokens stripped
    pub body: String,
}

/// Shape of the descriptor key body
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Shape<'body> {
    /// Single extended key
    Single(&'body str),

    /// Threshold multisig over a list of extended keys
    Multisig {
        /// Required number of signatures, as written
        threshold: u8,
        /// Key tokens in order of their appearance
        keys: Vec<&'body str>,
    },
}

/// Extracts `-[name]` option tokens from the descriptor and normalizes the
/// remaining text.
pub fn tokenize(descriptor: &str) -> Tokens {
    let options = RE_OPTION
        .captures_iter(descriptor)
        .filter_map(|caps| {
            let name = caps.get(1)?;
            Some(OptionToken {
                name: name.as_str().to_lowercase(),
                pos: caps.get(0)?.start(),
            })
        })
        .collect();

    let mut body = RE_OPTION.replace_all(descriptor, "").into_owned();
    while body.contains("--") {
        body = body.replace("--", "-");
    }
    let body = body.trim_end_matches('-').to_owned();

    Tokens { options, body }
}

impl Tokens {
    /// Matches the key body against multisig and single-key shapes.
    pub fn shape(&self) -> Result<Shape<'_>, Error> {
        let malformed = || Error::MalformedDescriptor(self.body.clone());

        if let Some(caps) = RE_MULTISIG.captures(&self.body) {
            let threshold = caps
                .name("threshold")
                .ok_or_else(malformed)?
                .as_str()
                .parse()
                .map_err(|_| malformed())?;
            // each key capture starts with the `-` separator, which is dropped
            let keys = caps
                .name("keys")
                .ok_or_else(malformed)?
                .as_str()
                .split('-')
                .skip(1)
                .collect();
            return Ok(Shape::Multisig { threshold, keys });
        }

        if RE_SINGLE.is_match(&self.body) {
            Ok(Shape::Single(&self.body))
        } else {
            Err(malformed())
        }
    }
}
