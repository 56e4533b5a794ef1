use winnow::combinator::{cut_err, fail};
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;

use crate::eapi::Eapi;

/// Error type for atom parsing and restriction derivation
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    #[error("malformed atom '{atom}': {reason}")]
    MalformedAtom { atom: String, reason: Malformed },

    /// The restriction builder was handed an atom whose fields don't have
    /// the shape parsing guarantees.
    #[error("restriction contract violated: {0}")]
    ContractViolation(String),

    #[error("invalid category: {0}")]
    InvalidCategory(String),

    #[error("invalid package: {0}")]
    InvalidPackage(String),

    #[error("invalid version: {0}")]
    InvalidVersion(String),

    #[error("invalid cpv: {0}")]
    InvalidCpv(String),

    #[error("invalid cpn: {0}")]
    InvalidCpn(String),

    #[error("invalid use dep: {0}")]
    InvalidUseDep(String),

    #[error("invalid eapi: {0}")]
    InvalidEapi(String),
}

impl Error {
    pub(crate) fn malformed(atom: &str, reason: Malformed) -> Self {
        Error::MalformedAtom {
            atom: atom.to_string(),
            reason,
        }
    }

    /// The malformed-atom reason, if this is a parse failure.
    pub fn reason(&self) -> Option<&Malformed> {
        match self {
            Error::MalformedAtom { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

/// Why an atom was rejected
///
/// The `Display` strings are stable and meant to be shown to users.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum Malformed {
    #[error("unclosed use dep")]
    UnclosedUseDep,

    #[error("empty use flag detected")]
    EmptyUseFlag,

    #[error("first char of a use flag must be alphanumeric")]
    InvalidUseFirstChar,

    #[error("invalid char in use dep; each flag must be a-Z0-9_@-+")]
    InvalidUseChar,

    #[error("empty slot restriction isn't allowed")]
    EmptySlotRestriction,

    #[error("invalid first char of slot dep; must not be '-'")]
    InvalidSlotFirstChar,

    #[error("invalid char in slot dep; each flag must be a-Z0-9_.-+")]
    InvalidSlotChar,

    #[error("invalid slot dep; all slots must be non empty")]
    EmptySlot,

    /// The last slot of the clause is empty, as in `cat/pkg:` or `:0,`.
    #[error("invalid slot flag; all slots must be non empty")]
    EmptyLastSlot,

    #[error("slot operators aren't allowed with multiple slots")]
    SlotOperatorWithMultipleSlots,

    #[error("invalid first char of repo_id: must not be '-'")]
    InvalidRepoFirstChar,

    #[error("invalid char in repo_id: valid characters are [a-Z0-9_-/]")]
    InvalidRepoChar,

    #[error("repo_id must not be empty")]
    EmptyRepoId,

    #[error("you can specify only one slot restriction")]
    OnlyOneSlotRestriction,

    #[error("trailing garbage detected")]
    TrailingGarbage,

    #[error("revision isn't allowed with '~' operator")]
    RevisionWithApproximate,

    #[error("use deps aren't allowed in {}", use_deps_scope(.0))]
    UseDepsNotAllowed(Eapi),

    #[error("slot deps aren't allowed in eapi {0}")]
    SlotDepsNotAllowed(Eapi),

    #[error("repository deps aren't allowed in {}", repo_deps_scope(.0))]
    RepoDepsNotAllowed(Eapi),

    #[error("multiple slot deps aren't allowed in any supported EAPI")]
    MultipleSlotsNotAllowed(Eapi),

    #[error("slot operator deps aren't allowed in eapi {0}")]
    SlotOperatorNotAllowed(Eapi),

    /// The CPV collaborator rejected the category/package/version span.
    #[error("{0}")]
    Cpv(String),
}

fn use_deps_scope(eapi: &Eapi) -> String {
    match eapi {
        Eapi::Numbered(0) => "EAPI 0".to_string(),
        _ => format!("eapi {}", eapi),
    }
}

fn repo_deps_scope(eapi: &Eapi) -> String {
    match eapi {
        Eapi::Numbered(0) => "eapi 0".to_string(),
        _ => "EAPI <=2".to_string(),
    }
}

/// Result type for atom operations
pub type Result<T> = std::result::Result<T, Error>;

/// Result of the clause parsers; the rejection reason travels as context.
pub(crate) type ClauseResult<T> = ModalResult<T, ContextError<Malformed>>;

/// Fail the current clause with `reason`, without backtracking.
pub(crate) fn reject<T>(input: &mut &str, reason: Malformed) -> ClauseResult<T> {
    cut_err(fail::<_, T, _>).context(reason).parse_next(input)
}

/// The reason attached to a clause parser failure.
///
/// A failure without one stopped on input no clause accepts.
pub(crate) fn reason_of(err: ErrMode<ContextError<Malformed>>) -> Malformed {
    match err {
        ErrMode::Backtrack(e) | ErrMode::Cut(e) => e
            .context()
            .next()
            .cloned()
            .unwrap_or(Malformed::TrailingGarbage),
        ErrMode::Incomplete(_) => Malformed::TrailingGarbage,
    }
}
