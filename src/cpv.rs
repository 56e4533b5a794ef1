use std::fmt;
use std::str::FromStr;

use winnow::combinator::cut_err;
use winnow::error::{ContextError, ErrMode, StrContext};
use winnow::prelude::*;
use winnow::token::take_while;

use crate::cpn::{parse_category, parse_package, Cpn};
use crate::error::{Error, Result};
use crate::version::{parse_version, Revision, Version};

/// Category/Package/Version (Cpv)
///
/// Represents versioned package names like `dev-lang/rust-1.75.0`.
/// The version is separated from the package name at the last hyphen
/// followed by a digit.
///
/// See [PMS 3.2](https://projects.gentoo.org/pms/9/pms.html#version-specifications).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cpv {
    pub cpn: Cpn,
    pub version: Version,
}

impl Cpv {
    pub fn new(cpn: Cpn, version: Version) -> Self {
        Cpv { cpn, version }
    }

    /// Parse from string
    pub fn parse(input: &str) -> Result<Self> {
        parse_cpv()
            .parse(input)
            .map_err(|e| Error::InvalidCpv(format!("{}: {}", input, e)))
    }

    pub fn category(&self) -> &str {
        &self.cpn.category
    }

    pub fn package(&self) -> &str {
        &self.cpn.package
    }
}

impl fmt::Display for Cpv {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}-{}", self.cpn, self.version)
    }
}

impl FromStr for Cpv {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// What the atom parser needs to know about the category/package/version
/// span of an atom.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CpvFields {
    pub category: String,
    pub package: String,
    /// Version without revision, as written. `None` for unversioned input.
    pub version: Option<String>,
    pub revision: Option<Revision>,
}

impl CpvFields {
    pub fn unversioned(category: impl Into<String>, package: impl Into<String>) -> Self {
        CpvFields {
            category: category.into(),
            package: package.into(),
            version: None,
            revision: None,
        }
    }

    pub fn versioned(
        category: impl Into<String>,
        package: impl Into<String>,
        version: impl Into<String>,
        revision: Option<Revision>,
    ) -> Self {
        CpvFields {
            category: category.into(),
            package: package.into(),
            version: Some(version.into()),
            revision,
        }
    }

    /// `category/package`
    pub fn key(&self) -> String {
        format!("{}/{}", self.category, self.package)
    }

    /// Version including the revision, e.g. `1.2-r3`.
    pub fn fullver(&self) -> Option<String> {
        self.version.as_ref().map(|v| match self.revision {
            Some(rev) => format!("{}{}", v, rev),
            None => v.clone(),
        })
    }
}

impl From<Cpv> for CpvFields {
    fn from(cpv: Cpv) -> Self {
        CpvFields {
            category: cpv.cpn.category,
            package: cpv.cpn.package,
            version: Some(cpv.version.base().to_string()),
            revision: cpv.version.revision,
        }
    }
}

impl From<Cpn> for CpvFields {
    fn from(cpn: Cpn) -> Self {
        CpvFields::unversioned(cpn.category, cpn.package)
    }
}

/// Parser for the category/package/version span of an atom
///
/// `versioned` is set when the atom carries a version operator; the span
/// must then contain a version, otherwise it must not.
///
/// Closures of the same shape implement this trait, which makes it easy to
/// substitute canned results in tests.
pub trait CpvParser {
    fn parse_cpv(&self, text: &str, versioned: bool) -> Result<CpvFields>;
}

impl<F> CpvParser for F
where
    F: Fn(&str, bool) -> Result<CpvFields>,
{
    fn parse_cpv(&self, text: &str, versioned: bool) -> Result<CpvFields> {
        self(text, versioned)
    }
}

/// The PMS grammar for category, package and version names.
#[derive(Debug, Clone, Copy, Default)]
pub struct PmsCpvParser;

impl CpvParser for PmsCpvParser {
    fn parse_cpv(&self, text: &str, versioned: bool) -> Result<CpvFields> {
        if versioned {
            Cpv::parse(text).map(CpvFields::from)
        } else {
            Cpn::parse(text).map(CpvFields::from)
        }
    }
}

// Winnow parsers

/// Parse Cpv (category/package-version)
/// Package names can contain hyphens, so we need to find the version boundary
/// Per PMS, version always starts after the LAST hyphen followed by a digit
pub(crate) fn parse_cpv<'s>() -> impl Parser<&'s str, Cpv, ErrMode<ContextError>> {
    (
        parse_category(),
        '/',
        cut_err(take_while(1.., |c: char| {
            c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '+' || c == '.'
        })),
    )
        .verify_map(|(category, _, pkg_ver): (String, char, &str)| {
            let version_pos = pkg_ver
                .match_indices('-')
                .map(|(i, _)| i)
                .filter(|&i| pkg_ver[i + 1..].starts_with(|c: char| c.is_ascii_digit()))
                .last()?;
            let pkg_str = &pkg_ver[..version_pos];
            let ver_str = &pkg_ver[version_pos + 1..];

            let package = parse_package().parse(pkg_str).ok()?;
            let version = parse_version().parse(ver_str).ok()?;

            Some(Cpv {
                cpn: Cpn { category, package },
                version,
            })
        })
        .context(StrContext::Label("cpv"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpv_parsing() {
        let cpv = Cpv::parse("dev-lang/rust-1.75.0").unwrap();
        assert_eq!(cpv.category(), "dev-lang");
        assert_eq!(cpv.package(), "rust");
        assert_eq!(cpv.version.numbers, vec![1, 75, 0]);
        assert_eq!(cpv.to_string(), "dev-lang/rust-1.75.0");
    }

    #[test]
    fn test_cpv_with_revision() {
        let cpv = Cpv::parse("dev-lang/rust-1.75.0-r1").unwrap();
        assert_eq!(cpv.version.revision, Some(Revision(1)));
        assert_eq!(cpv.to_string(), "dev-lang/rust-1.75.0-r1");
    }

    #[test]
    fn test_cpv_hyphenated_package() {
        let cpv = Cpv::parse("dev-util/nvidia-cuda-toolkit-11.8.0").unwrap();
        assert_eq!(cpv.package(), "nvidia-cuda-toolkit");
        assert_eq!(cpv.version.base(), "11.8.0");
    }

    #[test]
    fn test_invalid_cpv() {
        assert!(Cpv::parse("dev-lang/rust").is_err());
        assert!(Cpv::parse("dev-lang/rust-").is_err());
        assert!(Cpv::parse("dev-lang/rust-1.0*").is_err());
    }

    #[test]
    fn test_fields() {
        let fields = PmsCpvParser.parse_cpv("cat/pkg-1.2-r3", true).unwrap();
        assert_eq!(fields.key(), "cat/pkg");
        assert_eq!(fields.version.as_deref(), Some("1.2"));
        assert_eq!(fields.revision, Some(Revision(3)));
        assert_eq!(fields.fullver().as_deref(), Some("1.2-r3"));

        let fields = PmsCpvParser.parse_cpv("cat/pkg", false).unwrap();
        assert_eq!(fields, CpvFields::unversioned("cat", "pkg"));
        assert_eq!(fields.fullver(), None);

        assert!(PmsCpvParser.parse_cpv("cat/pkg-1.2", false).is_err());
        assert!(PmsCpvParser.parse_cpv("cat/pkg", true).is_err());
    }

    #[test]
    fn test_closure_parser() {
        let fake = |text: &str, _versioned: bool| -> Result<CpvFields> {
            Err(Error::InvalidCpv(text.to_string()))
        };
        assert_eq!(
            fake.parse_cpv("x", false),
            Err(Error::InvalidCpv("x".to_string()))
        );
    }
}
