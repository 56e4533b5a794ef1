use std::fmt;
use std::str::FromStr;

use winnow::combinator::cut_err;
use winnow::error::{ContextError, ErrMode, StrContext};
use winnow::prelude::*;
use winnow::token::take_while;

use crate::error::{Error, Result};
use crate::version::parse_version;

/// Unversioned package key, the `category/package` part of an atom
///
/// Naming rules follow
/// [PMS 3.1](https://projects.gentoo.org/pms/latest/pms.html#restrictions-upon-names).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cpn {
    pub category: String,
    pub package: String,
}

impl Cpn {
    pub fn new(category: impl Into<String>, package: impl Into<String>) -> Self {
        Cpn {
            category: category.into(),
            package: package.into(),
        }
    }

    pub fn parse(input: &str) -> Result<Self> {
        parse_cpn()
            .parse(input)
            .map_err(|e| Error::InvalidCpn(format!("{}: {}", input, e)))
    }
}

impl fmt::Display for Cpn {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.category, self.package)
    }
}

impl FromStr for Cpn {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '+'
}

/// `foo-2` would be ambiguous with a versioned atom.
fn has_version_tail(name: &str) -> bool {
    name.match_indices('-')
        .any(|(i, _)| parse_version().parse(&name[i + 1..]).is_ok())
}

// Winnow parsers

/// Category names may contain `.` but can only open with `[A-Za-z0-9_]`.
pub(crate) fn parse_category<'s>() -> impl Parser<&'s str, String, ErrMode<ContextError>> {
    take_while(1.., |c: char| is_name_char(c) || c == '.')
        .verify(|s: &str| {
            s.chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        })
        .map(|s: &str| s.to_string())
        .context(StrContext::Label("category"))
}

pub(crate) fn parse_package<'s>() -> impl Parser<&'s str, String, ErrMode<ContextError>> {
    take_while(1.., is_name_char)
        .verify(|s: &str| {
            s.chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
                && !has_version_tail(s)
        })
        .map(|s: &str| s.to_string())
        .context(StrContext::Label("package"))
}

pub(crate) fn parse_cpn<'s>() -> impl Parser<&'s str, Cpn, ErrMode<ContextError>> {
    (parse_category(), '/', cut_err(parse_package()))
        .map(|(category, _, package)| Cpn { category, package })
        .context(StrContext::Label("cpn"))
}
