//! Collision-resistant temporary file names.
//!
//! Format: `{prefix}{YYYYMMDD}-{pid}-{random base36}-{suffix}`.
//! The random part is drawn from `0..2^32`, so two names generated on the
//! same day by the same process collide with probability about 2^-32.
//! Over a batch of n such names the birthday bound applies instead: 10,000
//! names share a value with probability about 1.2%, which is why callers
//! open temp files with `create_new` rather than trusting the name alone.
//! Names from different processes or days differ in the pid or date field.

use std::path::Path;

use crate::entropy::{EntropySource, SystemEntropy};

/// What a temp name is derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameSeed<'a> {
    /// A file's base name. The whole name is the prefix and its extension
    /// (dot included) is the suffix.
    Base(&'a str),

    /// Explicit prefix and suffix.
    Affixes { prefix: &'a str, suffix: &'a str },
}

impl<'a> From<&'a str> for NameSeed<'a> {
    fn from(base: &'a str) -> Self {
        NameSeed::Base(base)
    }
}

impl<'a> From<(&'a str, &'a str)> for NameSeed<'a> {
    fn from((prefix, suffix): (&'a str, &'a str)) -> Self {
        NameSeed::Affixes { prefix, suffix }
    }
}

impl<'a> NameSeed<'a> {
    fn split(self) -> (&'a str, String) {
        match self {
            NameSeed::Base(base) => {
                let suffix = Path::new(base)
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| format!(".{}", ext))
                    .unwrap_or_default();
                (base, suffix)
            }
            NameSeed::Affixes { prefix, suffix } => (prefix, suffix.to_string()),
        }
    }
}

/// Generate a temp name using the process clock, pid and RNG.
pub fn make_tmpname<'a>(seed: impl Into<NameSeed<'a>>) -> String {
    make_tmpname_with(seed, &mut SystemEntropy)
}

/// Generate a temp name from an explicit entropy source.
pub fn make_tmpname_with<'a>(seed: impl Into<NameSeed<'a>>, entropy: &mut impl EntropySource) -> String {
    let (prefix, suffix) = seed.into().split();
    let date = entropy.today().format("%Y%m%d");
    let pid = entropy.pid();
    let random = to_base36(entropy.random_u32());
    format!("{}{}-{}-{}-{}", prefix, date, pid, random, suffix)
}

/// Render `value` in lowercase base 36.
pub fn to_base36(mut value: u32) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

    if value == 0 {
        return "0".to_string();
    }

    let mut out = Vec::with_capacity(7);
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    // Only ASCII digits were pushed
    String::from_utf8_lossy(&out).into_owned()
}
