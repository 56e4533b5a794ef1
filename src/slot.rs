use std::fmt;

use winnow::combinator::{alt, cut_err, not, opt, preceded, separated};
use winnow::prelude::*;
use winnow::token::{none_of, one_of, take_while};

use crate::error::{reject, ClauseResult, Malformed};

/// Slot operator for sub-slot rebuilds
///
/// See [PMS 8.3.3](https://projects.gentoo.org/pms/latest/pms.html#slot-dependencies).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotOperator {
    /// `:=`: the dependent package must be rebuilt when the dependency's
    /// slot or sub-slot changes.
    Equal,
    /// `:*`: accept any slot; no rebuild is triggered on slot changes.
    Star,
}

impl fmt::Display for SlotOperator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SlotOperator::Equal => write!(f, "="),
            SlotOperator::Star => write!(f, "*"),
        }
    }
}

/// The slot clause of an atom, everything between `:` and the next `:`,
/// `[` or the end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SlotClause {
    /// Slot tokens, sorted when there are several. Empty for a bare
    /// operator such as `:=`.
    pub slots: Vec<String>,
    pub op: Option<SlotOperator>,
}

impl SlotClause {
    /// Whether the clause needs EAPI 5 syntax.
    pub fn uses_slot_operators(&self) -> bool {
        self.op.is_some() || self.slots.iter().any(|s| s.contains('/'))
    }
}

fn is_slot_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' || c == '+'
}

// Winnow parsers

/// Slot or sub-slot name. Empty names are let through and reported once
/// the whole clause has been read.
fn parse_slot_name<'s>(input: &mut &'s str) -> ClauseResult<&'s str> {
    cut_err(not(one_of(['.', '-'])))
        .context(Malformed::InvalidSlotFirstChar)
        .parse_next(input)?;
    take_while(0.., is_slot_char).parse_next(input)
}

/// Slot with optional sub-slot, e.g. `0/2.1`
fn parse_slot_token<'s>(input: &mut &'s str) -> ClauseResult<&'s str> {
    (parse_slot_name, opt(preceded('/', parse_slot_name)))
        .take()
        .parse_next(input)
}

fn parse_slot_operator(input: &mut &str) -> ClauseResult<SlotOperator> {
    alt((
        '='.value(SlotOperator::Equal),
        '*'.value(SlotOperator::Star),
    ))
    .parse_next(input)
}

/// Empty slots in the middle of a clause and at its end are reported
/// differently.
fn empty_slot(tokens: &[&str]) -> Option<Malformed> {
    let last = tokens.len().saturating_sub(1);
    tokens.iter().enumerate().find_map(|(i, token)| match token.split_once('/') {
        Some((slot, subslot)) if slot.is_empty() || subslot.is_empty() => Some(Malformed::EmptySlot),
        None if token.is_empty() && i == last => Some(Malformed::EmptyLastSlot),
        None if token.is_empty() => Some(Malformed::EmptySlot),
        _ => None,
    })
}

/// Parse a slot clause. The cursor sits just past the `:` and is left on
/// the terminating `:`, `[` or at the end.
pub(crate) fn parse_slot_clause(input: &mut &str) -> ClauseResult<SlotClause> {
    cut_err(not('['))
        .context(Malformed::EmptySlotRestriction)
        .parse_next(input)?;
    let tokens: Vec<&str> = separated(1.., parse_slot_token, ',').parse_next(input)?;
    let op = opt(parse_slot_operator).parse_next(input)?;
    cut_err(not(none_of([':', '['])))
        .context(Malformed::InvalidSlotChar)
        .parse_next(input)?;

    let bare = tokens == [""];
    match op {
        // `*` is only an operator on its own
        Some(SlotOperator::Star) if !bare => return reject(input, Malformed::InvalidSlotChar),
        Some(op) if bare => {
            return Ok(SlotClause {
                slots: Vec::new(),
                op: Some(op),
            })
        }
        _ => {}
    }

    if let Some(reason) = empty_slot(&tokens) {
        return reject(input, reason);
    }
    if tokens.len() > 1 && op.is_some() {
        return reject(input, Malformed::SlotOperatorWithMultipleSlots);
    }

    let mut slots: Vec<String> = tokens.into_iter().map(str::to_string).collect();
    slots.sort();

    Ok(SlotClause { slots, op })
}
