use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::OnceLock;

use tracing::{debug, trace};
use winnow::combinator::{alt, cut_err, not, opt, preceded};
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::token::{any, take_till};

use crate::cpv::{CpvParser, PmsCpvParser};
use crate::eapi::Eapi;
use crate::error::{reason_of, ClauseResult, Error, Malformed, Result};
use crate::repo::parse_repo_clause;
use crate::restrict::{self, Descriptors, Restriction, RestrictionFactory};
use crate::slot::{parse_slot_clause, SlotClause, SlotOperator};
use crate::use_dep::{classify, parse_use_clause, UseClause, UseStyle};
use crate::version::{parse_operator, Operator, Revision};

/// Package dependency blocker type
///
/// See [PMS 8.3.2](https://projects.gentoo.org/pms/9/pms.html#block-operator).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Blocker {
    /// `!`: the blocked package may be temporarily installed during a
    /// transition.
    Weak,
    /// `!!`: the blocked package must never be installed at the same time.
    Strong,
}

impl fmt::Display for Blocker {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Blocker::Weak => write!(f, "!"),
            Blocker::Strong => write!(f, "!!"),
        }
    }
}

/// Parser configuration for dependency atoms
///
/// ```
/// use ebuild_atom::{AtomParser, Eapi};
///
/// let parser = AtomParser::new().eapi(Eapi::Numbered(1));
/// assert!(parser.parse("dev-lang/python:2.7").is_ok());
/// assert!(parser.parse("dev-lang/python[ssl]").is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct AtomParser<P = PmsCpvParser> {
    eapi: Eapi,
    negate_version: bool,
    cpv_parser: P,
}

impl AtomParser {
    /// Any EAPI, plain version match, PMS names.
    pub fn new() -> Self {
        Self::default()
    }
}

impl<P: CpvParser> AtomParser<P> {
    pub fn eapi(mut self, eapi: impl Into<Eapi>) -> Self {
        self.eapi = eapi.into();
        self
    }

    /// Invert the version restriction of every parsed atom.
    pub fn negate_version(mut self, negate: bool) -> Self {
        self.negate_version = negate;
        self
    }

    /// Replace the parser used for the category/package/version span.
    pub fn cpv_parser<Q: CpvParser>(self, cpv_parser: Q) -> AtomParser<Q> {
        AtomParser {
            eapi: self.eapi,
            negate_version: self.negate_version,
            cpv_parser,
        }
    }

    pub fn parse(&self, text: &str) -> Result<Atom> {
        self.parse_atom(text).map_err(|reason| {
            debug!(atom = text, eapi = %self.eapi, %reason, "rejected malformed atom");
            Error::malformed(text, reason)
        })
    }

    /// Handles: [!|!!][op]cat/pkg[-ver][*][:slot][::repo][\[use\]]
    fn parse_atom(&self, text: &str) -> std::result::Result<Atom, Malformed> {
        let eapi = self.eapi;
        let mut input = text;

        let blocker = opt(parse_blocker(eapi)).parse_next(&mut input).ok().flatten();
        let op = opt(parse_operator()).parse_next(&mut input).ok().flatten();
        let Clauses {
            cpv_span,
            slot,
            repo_id,
            use_clause,
        } = parse_clauses.parse_next(&mut input).map_err(reason_of)?;

        let (op, cpv_text) = match cpv_span.strip_suffix('*') {
            Some(stripped) if op == Some(Operator::Equal) && cpv_span.len() > 1 => {
                (Some(Operator::EqualGlob), stripped)
            }
            _ => (op, cpv_span),
        };

        let fields = self
            .cpv_parser
            .parse_cpv(cpv_text, op.is_some())
            .map_err(|e| Malformed::Cpv(e.to_string()))?;

        if op == Some(Operator::Approximate) && fields.revision.is_some() {
            return Err(Malformed::RevisionWithApproximate);
        }

        if use_clause.is_some() && !eapi.allows_use_deps() {
            return Err(Malformed::UseDepsNotAllowed(eapi));
        }
        if slot.is_some() && !eapi.allows_slot_deps() {
            return Err(Malformed::SlotDepsNotAllowed(eapi));
        }
        if repo_id.is_some() && !eapi.allows_repo_deps() {
            return Err(Malformed::RepoDepsNotAllowed(eapi));
        }
        if let Some(clause) = &slot {
            if clause.slots.len() > 1 && !eapi.allows_multiple_slots() {
                return Err(Malformed::MultipleSlotsNotAllowed(eapi));
            }
            if clause.uses_slot_operators() && !eapi.allows_slot_operators() {
                return Err(Malformed::SlotOperatorNotAllowed(eapi));
            }
        }

        let key = fields.key();
        let (version, revision, fullver) = match op {
            Some(_) => (fields.version.clone(), fields.revision, fields.fullver()),
            None => (None, None, None),
        };
        let cpvstr = match &fullver {
            Some(fullver) => format!("{}-{}", key, fullver),
            None => key.clone(),
        };
        let (slot, slot_operator) = match slot {
            Some(clause) => (Some(clause.slots), clause.op),
            None => (None, None),
        };
        let (use_deps, use_style) = match use_clause {
            Some(clause) => (Some(clause.tokens), clause.style),
            None => (None, UseStyle::Plain),
        };

        Ok(Atom {
            text: text.to_string(),
            blocker,
            negate_version: self.negate_version,
            op,
            category: fields.category,
            package: fields.package,
            key,
            version,
            revision,
            fullver,
            cpvstr,
            slot,
            slot_operator,
            use_deps,
            use_style,
            repo_id: repo_id.map(str::to_string),
            content_hash: hash_text(text),
            restrictions: OnceLock::new(),
        })
    }
}

// Winnow parsers

/// A second `!` is only a strong blocker where the EAPI has them;
/// otherwise it is left for the name parser to reject.
fn parse_blocker<'s>(eapi: Eapi) -> impl Parser<&'s str, Blocker, ErrMode<ContextError>> {
    alt((
        "!!".verify(move |_: &str| eapi.allows_strong_blockers())
            .value(Blocker::Strong),
        "!".value(Blocker::Weak),
    ))
}

/// Everything of an atom after the operator
struct Clauses<'s> {
    cpv_span: &'s str,
    slot: Option<SlotClause>,
    repo_id: Option<&'s str>,
    use_clause: Option<UseClause>,
}

/// `:slot`, `:slot::repo` or `::repo`, after the first `:`
fn parse_slot_and_repo<'s>(input: &mut &'s str) -> ClauseResult<(Option<SlotClause>, Option<&'s str>)> {
    alt((
        preceded(':', parse_repo_clause).map(|repo| (None, Some(repo))),
        (
            parse_slot_clause,
            opt(preceded(
                (':', cut_err(':').context(Malformed::OnlyOneSlotRestriction)),
                parse_repo_clause,
            )),
        )
            .map(|(slot, repo)| (Some(slot), repo)),
    ))
    .parse_next(input)
}

/// Handles: cat/pkg[-ver][*][:slot][::repo][\[use\]]
fn parse_clauses<'s>(input: &mut &'s str) -> ClauseResult<Clauses<'s>> {
    let cpv_span = take_till(0.., [':', '[']).parse_next(input)?;
    let (slot, repo_id) = opt(preceded(':', cut_err(parse_slot_and_repo)))
        .parse_next(input)?
        .unwrap_or_default();
    let use_clause = opt(preceded('[', cut_err(parse_use_clause))).parse_next(input)?;
    cut_err(not(any))
        .context(Malformed::TrailingGarbage)
        .parse_next(input)?;

    Ok(Clauses {
        cpv_span,
        slot,
        repo_id,
        use_clause,
    })
}

fn hash_text(text: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish()
}

/// Parsed dependency atom
///
/// Represents atoms like `>=dev-lang/rust-1.75.0:0[ssl]` or
/// `dev-libs/foo::gentoo`. Atoms are immutable; the restriction list is
/// derived on first use and cached.
///
/// See [PMS 8.3](https://projects.gentoo.org/pms/9/pms.html#package-dependency-specifications)
/// for the dependency specification syntax.
#[derive(Debug, Clone)]
pub struct Atom {
    text: String,
    blocker: Option<Blocker>,
    negate_version: bool,
    op: Option<Operator>,
    category: String,
    package: String,
    key: String,
    version: Option<String>,
    revision: Option<Revision>,
    fullver: Option<String>,
    cpvstr: String,
    slot: Option<Vec<String>>,
    slot_operator: Option<SlotOperator>,
    use_deps: Option<Vec<String>>,
    use_style: UseStyle,
    repo_id: Option<String>,
    content_hash: u64,
    restrictions: OnceLock<Result<Vec<Restriction>>>,
}

impl Atom {
    /// Parse with no EAPI restriction.
    pub fn parse(text: &str) -> Result<Self> {
        AtomParser::new().parse(text)
    }

    pub fn parse_with(text: &str, negate_version: bool, eapi: impl Into<Eapi>) -> Result<Self> {
        AtomParser::new()
            .negate_version(negate_version)
            .eapi(eapi)
            .parse(text)
    }

    /// The string the atom was parsed from.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn blocker(&self) -> Option<Blocker> {
        self.blocker
    }

    pub fn blocks(&self) -> bool {
        self.blocker.is_some()
    }

    pub fn blocks_strongly(&self) -> bool {
        self.blocker == Some(Blocker::Strong)
    }

    pub fn negate_version(&self) -> bool {
        self.negate_version
    }

    pub fn op(&self) -> Option<Operator> {
        self.op
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    /// `category/package`
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Version without revision; `None` for unversioned atoms.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn revision(&self) -> Option<Revision> {
        self.revision
    }

    /// Version with revision, e.g. `1.2-r3`.
    pub fn fullver(&self) -> Option<&str> {
        self.fullver.as_deref()
    }

    /// `category/package[-fullver]`
    pub fn cpvstr(&self) -> &str {
        &self.cpvstr
    }

    /// Slot tokens, sorted. Empty for a bare `:=` or `:*`.
    pub fn slot(&self) -> Option<&[String]> {
        self.slot.as_deref()
    }

    /// Sub-slot of a single `slot/subslot` token.
    pub fn subslot(&self) -> Option<&str> {
        match self.slot.as_deref() {
            Some([token]) => token.split_once('/').map(|(_, subslot)| subslot),
            _ => None,
        }
    }

    pub fn slot_operator(&self) -> Option<SlotOperator> {
        self.slot_operator
    }

    /// Use dep tokens as written, sorted.
    pub fn use_deps(&self) -> Option<&[String]> {
        self.use_deps.as_deref()
    }

    pub fn use_style(&self) -> UseStyle {
        self.use_style
    }

    pub fn repo_id(&self) -> Option<&str> {
        self.repo_id.as_deref()
    }

    /// Hash of [`Atom::text`].
    pub fn content_hash(&self) -> u64 {
        self.content_hash
    }

    /// Only a category and package, nothing else.
    pub fn is_simple(&self) -> bool {
        self.blocker.is_none()
            && self.op.is_none()
            && self.slot.is_none()
            && self.use_deps.is_none()
            && self.repo_id.is_none()
    }

    /// Restrictions a matching package has to satisfy, computed once.
    ///
    /// ```
    /// use ebuild_atom::{Atom, Attr, Restriction};
    ///
    /// let atom = Atom::parse("dev-lang/rust::gentoo").unwrap();
    /// let restrictions = atom.restrictions().unwrap();
    /// assert_eq!(restrictions.len(), 3);
    /// assert!(matches!(restrictions[0], Restriction::Package { attr: Attr::RepoId, .. }));
    /// ```
    pub fn restrictions(&self) -> Result<&[Restriction]> {
        let built = self.restrictions.get_or_init(|| {
            let built = restrict::build(self, &Descriptors);
            trace!(atom = %self.text, ok = built.is_ok(), "derived restrictions");
            built
        });
        match built {
            Ok(restrictions) => Ok(restrictions.as_slice()),
            Err(e) => Err(e.clone()),
        }
    }

    /// Build the restrictions with a caller supplied factory. Not cached.
    pub fn restrictions_with<F: RestrictionFactory>(&self, factory: &F) -> Result<Vec<F::Restriction>> {
        restrict::build(self, factory)
    }

    /// Resolve conditional use deps against the flags enabled on the
    /// depending package.
    ///
    /// Returns a plain atom; its text is the canonical rendering of the
    /// resolved atom. Plain atoms come back unchanged.
    ///
    /// ```
    /// use ebuild_atom::Atom;
    ///
    /// let atom = Atom::parse("dev-libs/foo[ssl?,!debug?,gtk=]").unwrap();
    /// let resolved = atom.evaluate_conditionals(["ssl"]).unwrap();
    /// assert_eq!(resolved.text(), "dev-libs/foo[-debug,-gtk,ssl]");
    /// ```
    pub fn evaluate_conditionals<I, S>(&self, enabled: I) -> Result<Atom>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tokens = match (&self.use_deps, self.use_style) {
            (Some(tokens), UseStyle::Transitive) => tokens,
            _ => return Ok(self.clone()),
        };
        let enabled: HashSet<String> = enabled
            .into_iter()
            .map(|flag| flag.as_ref().to_string())
            .collect();

        let mut resolved = Vec::with_capacity(tokens.len());
        for token in tokens {
            let dep = classify(token)
                .map_err(|reason| Error::ContractViolation(format!("use dep '{}': {}", token, reason)))?;
            if let Some(dep) = dep.evaluate(enabled.contains(&dep.flag)) {
                resolved.push(dep.to_string());
            }
        }
        resolved.sort();

        let mut atom = Atom {
            use_deps: (!resolved.is_empty()).then_some(resolved),
            use_style: UseStyle::Plain,
            restrictions: OnceLock::new(),
            ..self.clone()
        };
        atom.text = atom.to_string();
        atom.content_hash = hash_text(&atom.text);
        Ok(atom)
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(blocker) = self.blocker {
            write!(f, "{}", blocker)?;
        }

        match self.op {
            Some(Operator::EqualGlob) => write!(f, "={}*", self.cpvstr)?,
            Some(op) => write!(f, "{}{}", op, self.cpvstr)?,
            None => write!(f, "{}", self.cpvstr)?,
        }

        if let Some(slots) = &self.slot {
            write!(f, ":{}", slots.join(","))?;
            if let Some(op) = self.slot_operator {
                write!(f, "{}", op)?;
            }
        }

        if let Some(repo_id) = &self.repo_id {
            write!(f, "::{}", repo_id)?;
        }

        if let Some(use_deps) = &self.use_deps {
            write!(f, "[{}]", use_deps.join(","))?;
        }

        Ok(())
    }
}

impl PartialEq for Atom {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text && self.negate_version == other.negate_version
    }
}

impl Eq for Atom {}

impl Hash for Atom {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.content_hash);
    }
}

impl FromStr for Atom {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpv::CpvFields;

    fn reason(input: &str, eapi: Eapi) -> String {
        let err = Atom::parse_with(input, false, eapi).unwrap_err();
        match err.reason() {
            Some(reason) => reason.to_string(),
            None => panic!("expected MalformedAtom, got {err:?}"),
        }
    }

    #[test]
    fn test_atom_simple() {
        let atom = Atom::parse("dev-lang/rust").unwrap();
        assert_eq!(atom.text(), "dev-lang/rust");
        assert_eq!(atom.category(), "dev-lang");
        assert_eq!(atom.package(), "rust");
        assert_eq!(atom.key(), "dev-lang/rust");
        assert_eq!(atom.cpvstr(), "dev-lang/rust");
        assert_eq!(atom.op(), None);
        assert_eq!(atom.version(), None);
        assert_eq!(atom.fullver(), None);
        assert!(atom.is_simple());
        assert!(!atom.blocks());
        assert_eq!(atom.to_string(), "dev-lang/rust");
    }

    #[test]
    fn test_atom_versioned() {
        let atom = Atom::parse(">=dev-lang/rust-1.75.0-r1").unwrap();
        assert_eq!(atom.op(), Some(Operator::GreaterOrEqual));
        assert_eq!(atom.version(), Some("1.75.0"));
        assert_eq!(atom.revision(), Some(Revision(1)));
        assert_eq!(atom.fullver(), Some("1.75.0-r1"));
        assert_eq!(atom.cpvstr(), "dev-lang/rust-1.75.0-r1");
        assert!(!atom.is_simple());
    }

    #[test]
    fn test_operators() {
        for (input, op) in [
            ("<cat/pkg-1", Operator::Less),
            ("<=cat/pkg-1", Operator::LessOrEqual),
            ("=cat/pkg-1", Operator::Equal),
            ("=cat/pkg-1*", Operator::EqualGlob),
            ("~cat/pkg-1", Operator::Approximate),
            (">=cat/pkg-1", Operator::GreaterOrEqual),
            (">cat/pkg-1", Operator::Greater),
        ] {
            let atom = Atom::parse(input).unwrap();
            assert_eq!(atom.op(), Some(op), "failed for: {input}");
            assert_eq!(atom.to_string(), input);
        }
    }

    #[test]
    fn test_glob_only_with_equal() {
        let atom = Atom::parse("=cat/pkg-1.2*").unwrap();
        assert_eq!(atom.fullver(), Some("1.2"));
        assert_eq!(atom.cpvstr(), "cat/pkg-1.2");
        assert!(Atom::parse(">=cat/pkg-1.2*").is_err());
        assert!(Atom::parse("cat/pkg*").is_err());
    }

    #[test]
    fn test_blockers() {
        let atom = Atom::parse("!cat/pkg").unwrap();
        assert_eq!(atom.blocker(), Some(Blocker::Weak));
        assert!(atom.blocks());
        assert!(!atom.blocks_strongly());

        let atom = Atom::parse("!!cat/pkg").unwrap();
        assert_eq!(atom.blocker(), Some(Blocker::Strong));
        assert!(atom.blocks_strongly());
        assert_eq!(atom.to_string(), "!!cat/pkg");

        let atom = Atom::parse_with("!!<cat/pkg-2", false, 2u32).unwrap();
        assert_eq!(atom.blocker(), Some(Blocker::Strong));
        assert_eq!(atom.op(), Some(Operator::Less));
    }

    #[test]
    fn test_strong_blocker_in_old_eapi() {
        // the second `!` is handed on and rejected as part of the name
        for eapi in [0u32, 1] {
            let err = Atom::parse_with("!!cat/pkg", false, eapi).unwrap_err();
            assert!(matches!(err.reason(), Some(Malformed::Cpv(_))));
        }
        assert!(Atom::parse_with("!cat/pkg", false, 0u32).is_ok());
    }

    #[test]
    fn test_parse_blocker() {
        let mut input = "!!<cat/pkg-2";
        assert_eq!(parse_blocker(Eapi::Any).parse_next(&mut input).ok(), Some(Blocker::Strong));
        assert_eq!(input, "<cat/pkg-2");

        let mut input = "!!cat/pkg";
        assert_eq!(
            parse_blocker(Eapi::Numbered(1)).parse_next(&mut input).ok(),
            Some(Blocker::Weak)
        );
        assert_eq!(input, "!cat/pkg");

        let mut input = "cat/pkg";
        assert!(parse_blocker(Eapi::Any).parse_next(&mut input).is_err());
        assert_eq!(input, "cat/pkg");
    }

    #[test]
    fn test_parse_clauses() {
        let mut input = "cat/pkg-1*:0/1=::gentoo[foo?]";
        let clauses = parse_clauses(&mut input).unwrap();
        assert_eq!(clauses.cpv_span, "cat/pkg-1*");
        assert_eq!(clauses.slot.unwrap().slots, ["0/1"]);
        assert_eq!(clauses.repo_id, Some("gentoo"));
        assert_eq!(clauses.use_clause.unwrap().style, UseStyle::Transitive);
        assert_eq!(input, "");

        let mut input = "cat/pkg::gentoo";
        let clauses = parse_clauses(&mut input).unwrap();
        assert!(clauses.slot.is_none());
        assert_eq!(clauses.repo_id, Some("gentoo"));

        let mut input = "cat/pkg:0:x";
        let err = parse_clauses(&mut input).map(|_| ()).unwrap_err();
        assert_eq!(reason_of(err), Malformed::OnlyOneSlotRestriction);
    }

    #[test]
    fn test_approximate_revision() {
        assert_eq!(
            reason("~cat/pkg-1.0-r1", Eapi::Any),
            "revision isn't allowed with '~' operator"
        );
        assert!(Atom::parse("~cat/pkg-1.0-r0").is_err());
        let atom = Atom::parse("~cat/pkg-1.0").unwrap();
        assert_eq!(atom.op(), Some(Operator::Approximate));
        assert_eq!(atom.revision(), None);
    }

    #[test]
    fn test_slots() {
        let atom = Atom::parse("cat/pkg:1,0").unwrap();
        assert_eq!(atom.slot().unwrap(), ["0", "1"]);
        assert_eq!(
            Atom::parse("cat/pkg:1,0").unwrap().slot(),
            Atom::parse("cat/pkg:0,1").unwrap().slot()
        );
        assert_eq!(atom.to_string(), "cat/pkg:0,1");

        let atom = Atom::parse("cat/pkg:0/2=").unwrap();
        assert_eq!(atom.slot().unwrap(), ["0/2"]);
        assert_eq!(atom.subslot(), Some("2"));
        assert_eq!(atom.slot_operator(), Some(SlotOperator::Equal));

        let atom = Atom::parse("cat/pkg:=").unwrap();
        assert_eq!(atom.slot(), Some(&[][..]));
        assert_eq!(atom.to_string(), "cat/pkg:=");
    }

    #[test]
    fn test_repo_id() {
        let atom = Atom::parse("cat/pkg::gentoo").unwrap();
        assert_eq!(atom.repo_id(), Some("gentoo"));
        assert_eq!(atom.slot(), None);

        let atom = Atom::parse("cat/pkg:2::gentoo[foo]").unwrap();
        assert_eq!(atom.slot().unwrap(), ["2"]);
        assert_eq!(atom.repo_id(), Some("gentoo"));
        assert_eq!(atom.use_deps().unwrap(), ["foo"]);
        assert_eq!(atom.to_string(), "cat/pkg:2::gentoo[foo]");
    }

    #[test]
    fn test_use_deps() {
        let atom = Atom::parse("cat/pkg[foo,-bar]").unwrap();
        assert_eq!(atom.use_deps().unwrap(), ["-bar", "foo"]);
        assert_eq!(atom.use_style(), UseStyle::Plain);

        let atom = Atom::parse("cat/pkg[foo?]").unwrap();
        assert_eq!(atom.use_deps().unwrap(), ["foo?"]);
        assert_eq!(atom.use_style(), UseStyle::Transitive);
    }

    #[test]
    fn test_full_atom() {
        let atom = Atom::parse(">=cat/pkg-1.0:0/2=[foo,-bar]").unwrap();
        assert_eq!(atom.op(), Some(Operator::GreaterOrEqual));
        assert_eq!(atom.slot().unwrap(), ["0/2"]);
        assert_eq!(atom.use_deps().unwrap(), ["-bar", "foo"]);
        assert_eq!(atom.to_string(), ">=cat/pkg-1.0:0/2=[-bar,foo]");
    }

    #[test]
    fn test_malformed_reasons() {
        assert_eq!(reason("cat/pkg[foo", Eapi::Any), "unclosed use dep");
        assert_eq!(reason("cat/pkg[,foo]", Eapi::Any), "empty use flag detected");
        assert_eq!(reason("cat/pkg[]", Eapi::Any), "empty use flag detected");
        assert_eq!(
            reason("cat/pkg[_foo]", Eapi::Any),
            "first char of a use flag must be alphanumeric"
        );
        assert_eq!(
            reason("cat/pkg[fo.o]", Eapi::Any),
            "invalid char in use dep; each flag must be a-Z0-9_@-+"
        );
        assert_eq!(
            reason("cat/pkg:-0", Eapi::Any),
            "invalid first char of slot dep; must not be '-'"
        );
        assert_eq!(
            reason("cat/pkg:0@", Eapi::Any),
            "invalid char in slot dep; each flag must be a-Z0-9_.-+"
        );
        assert_eq!(
            reason("cat/pkg:", Eapi::Any),
            "invalid slot flag; all slots must be non empty"
        );
        assert_eq!(
            reason("cat/pkg:0,,1", Eapi::Any),
            "invalid slot dep; all slots must be non empty"
        );
        assert_eq!(
            reason("cat/pkg:[foo]", Eapi::Any),
            "empty slot restriction isn't allowed"
        );
        assert_eq!(
            reason("cat/pkg::-x", Eapi::Any),
            "invalid first char of repo_id: must not be '-'"
        );
        assert_eq!(
            reason("cat/pkg::a.b", Eapi::Any),
            "invalid char in repo_id: valid characters are [a-Z0-9_-/]"
        );
        assert_eq!(reason("cat/pkg::", Eapi::Any), "repo_id must not be empty");
        assert_eq!(
            reason("cat/pkg:0:x", Eapi::Any),
            "you can specify only one slot restriction"
        );
        assert_eq!(reason("cat/pkg:0::", Eapi::Any), "repo_id must not be empty");
        assert_eq!(reason("cat/pkg[foo]x", Eapi::Any), "trailing garbage detected");
        assert_eq!(
            reason("cat/pkg[foo]::gentoo", Eapi::Any),
            "trailing garbage detected"
        );
    }

    #[test]
    fn test_eapi_restrictions() {
        assert_eq!(
            reason("cat/pkg[foo]", Eapi::Numbered(0)),
            "use deps aren't allowed in EAPI 0"
        );
        assert_eq!(
            reason("cat/pkg:0", Eapi::Numbered(0)),
            "slot deps aren't allowed in eapi 0"
        );
        assert_eq!(
            reason("cat/pkg::gentoo", Eapi::Numbered(0)),
            "repository deps aren't allowed in eapi 0"
        );
        assert_eq!(
            reason("cat/pkg[foo]", Eapi::Numbered(1)),
            "use deps aren't allowed in eapi 1"
        );
        assert!(Atom::parse("cat/pkg[foo]").is_ok());
        assert!(Atom::parse_with("cat/pkg:0", false, 1u32).is_ok());
        assert_eq!(
            reason("cat/pkg::gentoo", Eapi::Numbered(8)),
            "repository deps aren't allowed in EAPI <=2"
        );
        assert_eq!(
            reason("cat/pkg:0,1", Eapi::Numbered(2)),
            "multiple slot deps aren't allowed in any supported EAPI"
        );
        assert_eq!(
            reason("cat/pkg:0=", Eapi::Numbered(4)),
            "slot operator deps aren't allowed in eapi 4"
        );
        assert!(Atom::parse_with("cat/pkg:0/1=", false, 5u32).is_ok());
    }

    #[test]
    fn test_error_carries_text() {
        let err = Atom::parse("cat/pkg[foo").unwrap_err();
        assert_eq!(
            err,
            Error::MalformedAtom {
                atom: "cat/pkg[foo".to_string(),
                reason: Malformed::UnclosedUseDep,
            }
        );
        assert_eq!(err.to_string(), "malformed atom 'cat/pkg[foo': unclosed use dep");
    }

    #[test]
    fn test_cpv_errors_are_wrapped() {
        for input in ["cat/pkg-1.0", ">=cat/pkg", "=cat/pkg-1.0_foo", "pkg", ""] {
            let err = Atom::parse(input).unwrap_err();
            assert!(
                matches!(err.reason(), Some(Malformed::Cpv(_))),
                "failed for: {input}"
            );
        }
    }

    #[test]
    fn test_fake_cpv_parser() {
        let fake = |text: &str, versioned: bool| -> Result<CpvFields> {
            assert_eq!(text, "anything-goes");
            assert!(versioned);
            Ok(CpvFields::versioned("c", "p", "9", None))
        };
        let atom = AtomParser::new()
            .cpv_parser(fake)
            .parse("=anything-goes*")
            .unwrap();
        assert_eq!(atom.op(), Some(Operator::EqualGlob));
        assert_eq!(atom.key(), "c/p");
        assert_eq!(atom.fullver(), Some("9"));

        let failing =
            |_: &str, _: bool| -> Result<CpvFields> { Err(Error::InvalidCpv("nope".to_string())) };
        let err = AtomParser::new().cpv_parser(failing).parse("x/y").unwrap_err();
        assert_eq!(err.reason(), Some(&Malformed::Cpv("invalid cpv: nope".to_string())));
    }

    #[test]
    fn test_negate_version_and_equality() {
        let plain = Atom::parse("<cat/pkg-2").unwrap();
        let negated = Atom::parse_with("<cat/pkg-2", true, Eapi::Any).unwrap();
        assert!(negated.negate_version());
        assert_ne!(plain, negated);
        assert_eq!(plain, "<cat/pkg-2".parse::<Atom>().unwrap());
        assert_eq!(plain.content_hash(), negated.content_hash());
    }

    #[test]
    fn test_restrictions_are_cached() {
        let atom = Atom::parse(">=cat/pkg-1.0:0[foo]").unwrap();
        let first = atom.restrictions().unwrap();
        let second = atom.restrictions().unwrap();
        assert!(std::ptr::eq(first, second));
        assert_eq!(first.len(), 5);
    }

    #[test]
    fn test_restrictions_shared_across_threads() {
        let atom = Atom::parse(">=cat/pkg-1.0:0[foo]").unwrap();
        let lists: Vec<&[Restriction]> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| atom.restrictions().unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        let cached = atom.restrictions().unwrap();
        for list in lists {
            assert!(std::ptr::eq(list, cached));
        }
    }

    #[test]
    fn test_evaluate_conditionals() {
        let atom = Atom::parse("cat/pkg:0[a?,!b?,c=,!d=,e]").unwrap();
        assert_eq!(atom.use_style(), UseStyle::Transitive);

        let resolved = atom.evaluate_conditionals(["a", "b", "c", "d"]).unwrap();
        assert_eq!(resolved.use_style(), UseStyle::Plain);
        assert_eq!(resolved.use_deps().unwrap(), ["-d", "a", "c", "e"]);
        assert_eq!(resolved.text(), "cat/pkg:0[-d,a,c,e]");
        assert!(resolved.restrictions().is_ok());

        let resolved = atom.evaluate_conditionals(Vec::<String>::new()).unwrap();
        assert_eq!(resolved.use_deps().unwrap(), ["-b", "-c", "d", "e"]);

        let atom = Atom::parse("cat/pkg[a?]").unwrap();
        let resolved = atom.evaluate_conditionals(["b"]).unwrap();
        assert_eq!(resolved.use_deps(), None);
        assert_eq!(resolved.text(), "cat/pkg");

        let plain = Atom::parse("cat/pkg[a]").unwrap();
        assert_eq!(plain.evaluate_conditionals(["a"]).unwrap(), plain);
    }

    #[test]
    fn test_atom_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Atom>();
        assert_send_sync::<AtomParser>();
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_slots_sorted(slots in prop::collection::vec("[a-z0-9_][a-z0-9_.+-]{0,6}", 2..6)) {
                let text = format!("cat/pkg:{}", slots.join(","));
                let atom = Atom::parse(&text)?;
                let mut expected = slots.clone();
                expected.sort();
                prop_assert_eq!(atom.slot().unwrap(), expected.as_slice());
                prop_assert_eq!(atom.text(), text.as_str());
            }

            #[test]
            fn test_use_sorted(flags in prop::collection::vec("-?[a-z0-9][a-z0-9_@+]{0,6}", 2..6)) {
                let text = format!("cat/pkg[{}]", flags.join(","));
                let atom = Atom::parse(&text)?;
                let mut expected = flags.clone();
                expected.sort();
                prop_assert_eq!(atom.use_deps().unwrap(), expected.as_slice());
            }

            #[test]
            fn test_display_reparses(
                op in prop::sample::select(vec!["", "<", "<=", "=", ">=", ">", "~"]),
                version in "[0-9]{1,3}(\\.[0-9]{1,3}){0,2}",
                slots in prop::collection::vec("[a-z0-9][a-z0-9.]{0,3}", 0..3),
                repo in prop::option::of("[a-z][a-z0-9_]{0,5}"),
                flags in prop::collection::vec("-?[a-z][a-z0-9]{0,4}", 0..3),
            ) {
                let mut text = if op.is_empty() {
                    "cat/pkg".to_string()
                } else {
                    format!("{op}cat/pkg-{version}")
                };
                if !slots.is_empty() {
                    text.push(':');
                    text.push_str(&slots.join(","));
                }
                if let Some(repo) = &repo {
                    text.push_str("::");
                    text.push_str(repo);
                }
                if !flags.is_empty() {
                    text.push_str(&format!("[{}]", flags.join(",")));
                }

                let atom = Atom::parse(&text)?;
                let reparsed = Atom::parse(&atom.to_string())?;
                prop_assert_eq!(atom.op(), reparsed.op());
                prop_assert_eq!(atom.key(), reparsed.key());
                prop_assert_eq!(atom.fullver(), reparsed.fullver());
                prop_assert_eq!(atom.slot(), reparsed.slot());
                prop_assert_eq!(atom.repo_id(), reparsed.repo_id());
                prop_assert_eq!(atom.use_deps(), reparsed.use_deps());
                prop_assert_eq!(atom.restrictions()?, reparsed.restrictions()?);
            }
        }
    }
}
