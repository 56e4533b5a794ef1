use std::fmt;
use std::str::FromStr;

use winnow::ascii::digit1;
use winnow::combinator::{alt, cut_err, opt, preceded, repeat, separated};
use winnow::error::{ContextError, ErrMode, StrContext};
use winnow::prelude::*;
use winnow::token::one_of;

use crate::error::{Error, Result};

/// Package revision (`-r1`, `-r2`, etc.)
///
/// Tracks packaging changes independently of the upstream version.
///
/// See [PMS 3.2](https://projects.gentoo.org/pms/9/pms.html#version-specifications).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Revision(pub u64);

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "-r{}", self.0)
    }
}

/// Version suffix kind
///
/// See [PMS 3.2](https://projects.gentoo.org/pms/9/pms.html#version-specifications).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SuffixKind {
    /// `_alpha`: earliest pre-release stage.
    Alpha,
    /// `_beta`: feature-complete but not yet stable.
    Beta,
    /// `_pre`: pre-release snapshot.
    Pre,
    /// `_rc`: release candidate.
    Rc,
    /// `_p`: post-release patchlevel.
    P,
}

impl fmt::Display for SuffixKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SuffixKind::Alpha => write!(f, "_alpha"),
            SuffixKind::Beta => write!(f, "_beta"),
            SuffixKind::Pre => write!(f, "_pre"),
            SuffixKind::Rc => write!(f, "_rc"),
            SuffixKind::P => write!(f, "_p"),
        }
    }
}

/// A version suffix with optional numeric qualifier, e.g. `_rc2`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Suffix {
    pub kind: SuffixKind,
    /// Optional numeric qualifier (e.g. `2` in `_rc2`).
    pub version: Option<u64>,
}

impl fmt::Display for Suffix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(v) = self.version {
            write!(f, "{}", v)?;
        }
        Ok(())
    }
}

/// Version comparison operator of a dependency atom
///
/// See [PMS 8.3.1](https://projects.gentoo.org/pms/9/pms.html#operators).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `<`
    Less,
    /// `<=`
    LessOrEqual,
    /// `=`: exactly the specified version (including revision).
    Equal,
    /// `=...*`: the full version must start with the given prefix.
    EqualGlob,
    /// `~`: the same version with any revision.
    Approximate,
    /// `>=`
    GreaterOrEqual,
    /// `>`
    Greater,
}

impl Operator {
    /// Symbol as handed to restriction consumers; the glob form is `=*`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Less => "<",
            Operator::LessOrEqual => "<=",
            Operator::Equal => "=",
            Operator::EqualGlob => "=*",
            Operator::Approximate => "~",
            Operator::GreaterOrEqual => ">=",
            Operator::Greater => ">",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Package version according to PMS
///
/// Represents a version string such as `1.2.3a_alpha4_beta5_pre6_rc7_p8-r9`.
/// The spelling of everything before the revision is kept verbatim in
/// [`Version::base`] since components like `1.01` don't survive a round
/// trip through integers.
///
/// See [PMS 3.2](https://projects.gentoo.org/pms/9/pms.html#version-specifications)
/// for the full version syntax.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version {
    /// Dot-separated numeric components (e.g. `[1, 2, 3]` for `1.2.3`).
    pub numbers: Vec<u64>,
    /// Optional single lowercase letter after the numeric components.
    pub letter: Option<char>,
    /// Zero or more version suffixes (`_alpha`, `_beta`, `_pre`, `_rc`, `_p`).
    pub suffixes: Vec<Suffix>,
    /// Package revision, `None` when no `-rN` was written.
    pub revision: Option<Revision>,
    base: String,
}

impl Version {
    /// Parse version from string without operator
    pub fn parse(input: &str) -> Result<Self> {
        parse_version()
            .parse(input)
            .map_err(|e| Error::InvalidVersion(format!("{}: {}", input, e)))
    }

    /// The version without its revision, spelled as written.
    pub fn base(&self) -> &str {
        &self.base
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.base)?;
        if let Some(rev) = self.revision {
            write!(f, "{}", rev)?;
        }
        Ok(())
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

// Winnow parsers

fn parse_number<'s>() -> impl Parser<&'s str, u64, ErrMode<ContextError>> {
    digit1.try_map(|s: &str| s.parse::<u64>())
}

fn parse_letter<'s>() -> impl Parser<&'s str, char, ErrMode<ContextError>> {
    one_of('a'..='z')
}

fn parse_suffix_kind<'s>() -> impl Parser<&'s str, SuffixKind, ErrMode<ContextError>> {
    alt((
        "alpha".value(SuffixKind::Alpha),
        "beta".value(SuffixKind::Beta),
        "pre".value(SuffixKind::Pre),
        "rc".value(SuffixKind::Rc),
        "p".value(SuffixKind::P),
    ))
}

fn parse_suffix<'s>() -> impl Parser<&'s str, Suffix, ErrMode<ContextError>> {
    preceded('_', cut_err((parse_suffix_kind(), opt(parse_number()))))
        .map(|(kind, version)| Suffix { kind, version })
}

fn parse_revision<'s>() -> impl Parser<&'s str, Revision, ErrMode<ContextError>> {
    preceded("-r", cut_err(parse_number())).map(Revision)
}

fn parse_version_inner(input: &mut &str) -> ModalResult<Version> {
    let start = *input;
    let (numbers, letter, suffixes): (Vec<u64>, Option<char>, Vec<Suffix>) = (
        separated(1.., parse_number(), '.'),
        opt(parse_letter()),
        repeat(0.., parse_suffix()),
    )
        .parse_next(input)?;
    let base = start[..start.len() - input.len()].to_string();
    let revision = opt(parse_revision()).parse_next(input)?;
    Ok(Version {
        numbers,
        letter,
        suffixes,
        revision,
        base,
    })
}

pub(crate) fn parse_version<'s>() -> impl Parser<&'s str, Version, ErrMode<ContextError>> {
    parse_version_inner.context(StrContext::Label("version"))
}

pub(crate) fn parse_operator<'s>() -> impl Parser<&'s str, Operator, ErrMode<ContextError>> {
    alt((
        "<=".value(Operator::LessOrEqual),
        "<".value(Operator::Less),
        ">=".value(Operator::GreaterOrEqual),
        ">".value(Operator::Greater),
        "~".value(Operator::Approximate),
        "=".value(Operator::Equal),
    ))
    .context(StrContext::Label("operator"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_parsing() {
        let v = Version::parse("1.2.3").unwrap();
        assert_eq!(v.numbers, vec![1, 2, 3]);
        assert_eq!(v.letter, None);
        assert!(v.suffixes.is_empty());
        assert_eq!(v.revision, None);
        assert_eq!(v.base(), "1.2.3");
    }

    #[test]
    fn test_version_with_letter() {
        let v = Version::parse("1.2.3a").unwrap();
        assert_eq!(v.letter, Some('a'));
    }

    #[test]
    fn test_version_with_suffixes() {
        let v = Version::parse("1.2.3_alpha4_beta5").unwrap();
        assert_eq!(v.suffixes.len(), 2);
        assert_eq!(v.suffixes[0].kind, SuffixKind::Alpha);
        assert_eq!(v.suffixes[0].version, Some(4));
        assert_eq!(v.suffixes[1].kind, SuffixKind::Beta);
        assert_eq!(v.suffixes[1].version, Some(5));
    }

    #[test]
    fn test_version_with_revision() {
        let v = Version::parse("1.2.3-r1").unwrap();
        assert_eq!(v.revision, Some(Revision(1)));
        assert_eq!(v.base(), "1.2.3");
        assert_eq!(v.to_string(), "1.2.3-r1");

        // an explicit -r0 is still a revision
        let v = Version::parse("1.0-r0").unwrap();
        assert_eq!(v.revision, Some(Revision(0)));
    }

    #[test]
    fn test_version_keeps_spelling() {
        let v = Version::parse("2023.01.05_p20230105").unwrap();
        assert_eq!(v.base(), "2023.01.05_p20230105");
        assert_eq!(v.numbers, vec![2023, 1, 5]);
    }

    #[test]
    fn test_invalid_versions() {
        assert!(Version::parse("").is_err());
        assert!(Version::parse("1.2*").is_err());
        assert!(Version::parse("1.2_foo").is_err());
        assert!(Version::parse("1.2-r").is_err());
        assert!(Version::parse(".1").is_err());
    }

    #[test]
    fn test_operator_parsing() {
        let mut input = ">=cat/pkg-1";
        assert_eq!(
            parse_operator().parse_next(&mut input).unwrap(),
            Operator::GreaterOrEqual
        );
        assert_eq!(input, "cat/pkg-1");
        assert_eq!(Operator::EqualGlob.as_str(), "=*");
        assert_eq!(Operator::Approximate.to_string(), "~");
    }
}
