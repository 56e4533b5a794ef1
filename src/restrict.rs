//! Restriction descriptors derived from an [`Atom`].
//!
//! The crate only describes restrictions; evaluating them against a
//! package is up to the consumer. Consumers with their own restriction
//! types implement [`RestrictionFactory`] and call
//! [`Atom::restrictions_with`].

use std::fmt;

use crate::atom::Atom;
use crate::error::{Error, Result};
use crate::version::{Operator, Revision};

/// Package attribute a restriction applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attr {
    RepoId,
    Package,
    Category,
    Fullver,
    Slot,
    Use,
}

impl Attr {
    /// Attribute path as package objects expose it.
    pub fn as_str(&self) -> &'static str {
        match self {
            Attr::RepoId => "repo.repo_id",
            Attr::Package => "package",
            Attr::Category => "category",
            Attr::Fullver => "fullver",
            Attr::Slot => "slot",
            Attr::Use => "use",
        }
    }
}

impl fmt::Display for Attr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Matcher applied to the value of a single attribute
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueRestriction {
    /// The value equals the string.
    StrExact(String),
    /// The value starts with the string.
    StrGlob(String),
    /// The value (a set) contains `values`: any of them, or every one when
    /// `all` is set. `negate` inverts the result.
    Containment {
        values: Vec<String>,
        all: bool,
        negate: bool,
    },
    Or(Vec<ValueRestriction>),
    And(Vec<ValueRestriction>),
}

/// Version comparison against a candidate package
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionMatch {
    pub op: Operator,
    pub version: String,
    /// Always `None` for `~`, which ignores revisions.
    pub revision: Option<Revision>,
    pub negate: bool,
}

/// One restriction of an atom
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Restriction {
    Package { attr: Attr, value: ValueRestriction },
    Version(VersionMatch),
}

/// Constructors for the restrictions an atom is turned into.
pub trait RestrictionFactory {
    type Value;
    type Restriction;

    fn exact(&self, value: &str) -> Self::Value;
    fn glob(&self, prefix: &str) -> Self::Value;
    fn containment(&self, values: Vec<String>, all: bool, negate: bool) -> Self::Value;
    fn any_of(&self, values: Vec<Self::Value>) -> Self::Value;
    fn all_of(&self, values: Vec<Self::Value>) -> Self::Value;
    fn package(&self, attr: Attr, value: Self::Value) -> Self::Restriction;
    fn version(&self, matcher: VersionMatch) -> Self::Restriction;
}

/// Factory producing this crate's own descriptor types.
#[derive(Debug, Clone, Copy, Default)]
pub struct Descriptors;

impl RestrictionFactory for Descriptors {
    type Value = ValueRestriction;
    type Restriction = Restriction;

    fn exact(&self, value: &str) -> ValueRestriction {
        ValueRestriction::StrExact(value.to_string())
    }

    fn glob(&self, prefix: &str) -> ValueRestriction {
        ValueRestriction::StrGlob(prefix.to_string())
    }

    fn containment(&self, values: Vec<String>, all: bool, negate: bool) -> ValueRestriction {
        ValueRestriction::Containment {
            values,
            all,
            negate,
        }
    }

    fn any_of(&self, values: Vec<ValueRestriction>) -> ValueRestriction {
        ValueRestriction::Or(values)
    }

    fn all_of(&self, values: Vec<ValueRestriction>) -> ValueRestriction {
        ValueRestriction::And(values)
    }

    fn package(&self, attr: Attr, value: ValueRestriction) -> Restriction {
        Restriction::Package { attr, value }
    }

    fn version(&self, matcher: VersionMatch) -> Restriction {
        Restriction::Version(matcher)
    }
}

fn violation(msg: impl Into<String>) -> Error {
    Error::ContractViolation(msg.into())
}

/// Build the restrictions of `atom`, cheapest first: repo, package,
/// category, version, slot, use.
pub(crate) fn build<F: RestrictionFactory>(atom: &Atom, factory: &F) -> Result<Vec<F::Restriction>> {
    let mut restrictions = Vec::with_capacity(6);

    if let Some(repo_id) = atom.repo_id() {
        restrictions.push(factory.package(Attr::RepoId, factory.exact(repo_id)));
    }
    restrictions.push(factory.package(Attr::Package, factory.exact(atom.package())));
    restrictions.push(factory.package(Attr::Category, factory.exact(atom.category())));

    if let Some(op) = atom.op() {
        if op == Operator::EqualGlob {
            let fullver = atom
                .fullver()
                .ok_or_else(|| violation("glob operator without a version"))?;
            restrictions.push(factory.package(Attr::Fullver, factory.glob(fullver)));
        } else {
            let version = atom
                .version()
                .ok_or_else(|| violation("version operator without a version"))?;
            let revision = match op {
                Operator::Approximate => None,
                _ => atom.revision(),
            };
            restrictions.push(factory.version(VersionMatch {
                op,
                version: version.to_string(),
                revision,
                negate: atom.negate_version(),
            }));
        }
    }

    if let Some(slots) = atom.slot() {
        if slots.iter().any(String::is_empty) {
            return Err(violation("slots must be non empty strings"));
        }
        match slots {
            // a bare slot operator restricts nothing by itself
            [] => {}
            [slot] => restrictions.push(factory.package(Attr::Slot, factory.exact(slot))),
            _ => {
                let any = slots.iter().map(|s| factory.exact(s)).collect();
                restrictions.push(factory.package(Attr::Slot, factory.any_of(any)));
            }
        }
    }

    if let Some(tokens) = atom.use_deps() {
        let value = use_restriction(factory, tokens)?;
        restrictions.push(factory.package(Attr::Use, value));
    }

    Ok(restrictions)
}

fn use_restriction<F: RestrictionFactory>(factory: &F, tokens: &[String]) -> Result<F::Value> {
    if tokens.is_empty() {
        return Err(violation("use deps must be absent or non empty"));
    }

    let mut enabled = Vec::new();
    let mut disabled = Vec::new();
    for token in tokens {
        match token.strip_prefix('-') {
            Some("") => return Err(violation("use flags must be non empty strings")),
            Some(flag) => disabled.push(flag.to_string()),
            None if token.is_empty() => {
                return Err(violation("use flags must be non empty strings"))
            }
            None => enabled.push(token.clone()),
        }
    }

    if disabled.is_empty() {
        let all = enabled.len() > 1;
        return Ok(factory.containment(enabled, all, false));
    }

    let disabled = factory.containment(disabled, true, true);
    if enabled.is_empty() {
        Ok(disabled)
    } else {
        let enabled = factory.containment(enabled, true, false);
        Ok(factory.all_of(vec![disabled, enabled]))
    }
}
