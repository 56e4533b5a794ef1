use std::fmt;
use std::str::FromStr;

use winnow::combinator::{cut_err, not, peek, separated, terminated};
use winnow::prelude::*;
use winnow::token::{any, one_of, take_till, take_while};

use crate::error::{reason_of, reject, ClauseResult, Error, Malformed, Result};

/// The kind of constraint a USE dependency expresses
///
/// See [PMS 8.3.4](https://projects.gentoo.org/pms/9/pms.html#style-and-style-use-dependencies).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UseDepKind {
    /// `[flag]`: the dependency's flag must be enabled.
    Enabled,
    /// `[-flag]`: the dependency's flag must be disabled.
    Disabled,
    /// `[flag?]`: if the *parent's* flag is enabled, the dependency's flag
    /// must also be enabled; otherwise unconstrained.
    Conditional,
    /// `[!flag?]`: if the *parent's* flag is disabled, the dependency's flag
    /// must be disabled; otherwise unconstrained.
    ConditionalInverse,
    /// `[flag=]`: the dependency's flag must match the parent's flag state.
    Equal,
    /// `[!flag=]`: the dependency's flag must be the opposite of the
    /// parent's flag state.
    EqualInverse,
}

impl UseDepKind {
    /// Whether the constraint depends on the parent's flags.
    pub fn is_conditional(self) -> bool {
        !matches!(self, UseDepKind::Enabled | UseDepKind::Disabled)
    }
}

/// Whether an atom's use deps refer to the depending package's flags
///
/// A `Transitive` atom has at least one `flag?`/`flag=` token. Its
/// restrictions require those tokens verbatim;
/// [`Atom::evaluate_conditionals`](crate::Atom::evaluate_conditionals)
/// resolves them into plain flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum UseStyle {
    #[default]
    Plain,
    Transitive,
}

/// A single USE flag constraint within a dependency atom
///
/// See [PMS 8.3.4](https://projects.gentoo.org/pms/9/pms.html#style-and-style-use-dependencies).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UseDep {
    /// The USE flag name (e.g. `ssl`, `python_targets_python3_12`).
    pub flag: String,
    pub kind: UseDepKind,
}

impl UseDep {
    pub fn new(flag: impl Into<String>, kind: UseDepKind) -> Self {
        UseDep {
            flag: flag.into(),
            kind,
        }
    }

    /// Parse single USE dependency (without brackets)
    pub fn parse(input: &str) -> Result<Self> {
        classify(input).map_err(|reason| Error::InvalidUseDep(format!("{}: {}", input, reason)))
    }

    /// Resolve against the state of the same flag on the depending package.
    ///
    /// Unconditional deps are returned unchanged; conditional ones become
    /// `Enabled`/`Disabled` or vanish when they impose nothing.
    pub fn evaluate(&self, parent_enabled: bool) -> Option<UseDep> {
        let kind = match (self.kind, parent_enabled) {
            (UseDepKind::Enabled | UseDepKind::Disabled, _) => self.kind,
            (UseDepKind::Conditional, true) => UseDepKind::Enabled,
            (UseDepKind::Conditional, false) => return None,
            (UseDepKind::ConditionalInverse, true) => return None,
            (UseDepKind::ConditionalInverse, false) => UseDepKind::Disabled,
            (UseDepKind::Equal, true) | (UseDepKind::EqualInverse, false) => UseDepKind::Enabled,
            (UseDepKind::Equal, false) | (UseDepKind::EqualInverse, true) => UseDepKind::Disabled,
        };
        Some(UseDep::new(self.flag.clone(), kind))
    }
}

impl fmt::Display for UseDep {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind {
            UseDepKind::Disabled => write!(f, "-")?,
            UseDepKind::ConditionalInverse | UseDepKind::EqualInverse => write!(f, "!")?,
            _ => {}
        }

        write!(f, "{}", self.flag)?;

        match self.kind {
            UseDepKind::Conditional | UseDepKind::ConditionalInverse => write!(f, "?"),
            UseDepKind::Equal | UseDepKind::EqualInverse => write!(f, "="),
            _ => Ok(()),
        }
    }
}

impl FromStr for UseDep {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn is_use_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '@' || c == '+'
}

/// Split the `-`, `!`, `?` and `=` markers off a use token.
///
/// Only tokens of two or more characters are split. A leading `-` wins
/// over a trailing `?`/`=`, and `!` is only a marker in front of one.
fn split_markers(token: &str) -> (&str, UseDepKind) {
    if token.len() < 2 {
        return (token, UseDepKind::Enabled);
    }
    if let Some(flag) = token.strip_prefix('-') {
        return (flag, UseDepKind::Disabled);
    }
    let (body, conditional) = match (token.strip_suffix('?'), token.strip_suffix('=')) {
        (Some(body), _) => (body, true),
        (_, Some(body)) => (body, false),
        _ => return (token, UseDepKind::Enabled),
    };
    match (body.strip_prefix('!').filter(|flag| !flag.is_empty()), conditional) {
        (Some(flag), true) => (flag, UseDepKind::ConditionalInverse),
        (Some(flag), false) => (flag, UseDepKind::EqualInverse),
        (None, true) => (body, UseDepKind::Conditional),
        (None, false) => (body, UseDepKind::Equal),
    }
}

// Winnow parsers

/// Parse a bare USE flag name, the whole of `input`
fn parse_use_flag<'s>(input: &mut &'s str) -> ClauseResult<&'s str> {
    let flag = (
        cut_err(peek(any)).context(Malformed::EmptyUseFlag),
        cut_err(one_of(|c: char| c.is_ascii_alphanumeric()))
            .context(Malformed::InvalidUseFirstChar),
        take_while(0.., is_use_char),
    )
        .take()
        .parse_next(input)?;
    cut_err(not(any))
        .context(Malformed::InvalidUseChar)
        .parse_next(input)?;
    Ok(flag)
}

/// Validate a use token and classify its markers.
pub(crate) fn classify(token: &str) -> std::result::Result<UseDep, Malformed> {
    let (flag, kind) = split_markers(token);
    let mut input = flag;
    parse_use_flag.parse_next(&mut input).map_err(reason_of)?;
    Ok(UseDep::new(flag, kind))
}

/// One token of a use clause, up to the next `,` or `]`
fn parse_use_token<'s>(input: &mut &'s str) -> ClauseResult<(&'s str, UseDep)> {
    let token = take_till(0.., [',', ']']).parse_next(input)?;
    cut_err(peek(one_of([',', ']'])))
        .context(Malformed::UnclosedUseDep)
        .parse_next(input)?;
    match classify(token) {
        Ok(dep) => Ok((token, dep)),
        Err(reason) => reject(input, reason),
    }
}

/// The use clause of an atom, the tokens between `[` and `]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct UseClause {
    /// Tokens as written, sorted when there are several.
    pub tokens: Vec<String>,
    pub style: UseStyle,
}

/// Parse a use clause. The cursor sits just past the `[` and is left
/// after the closing `]`.
///
/// Tokens already followed by a comma are checked before an unterminated
/// clause is reported.
pub(crate) fn parse_use_clause(input: &mut &str) -> ClauseResult<UseClause> {
    let deps: Vec<(&str, UseDep)> =
        terminated(separated(1.., parse_use_token, ','), ']').parse_next(input)?;

    let style = if deps.iter().any(|(_, dep)| dep.kind.is_conditional()) {
        UseStyle::Transitive
    } else {
        UseStyle::Plain
    };
    let mut tokens: Vec<String> = deps.into_iter().map(|(token, _)| token.to_string()).collect();
    tokens.sort();

    Ok(UseClause { tokens, style })
}
