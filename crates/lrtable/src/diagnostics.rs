//! Non-fatal diagnostics reported while building the tables.

use crate::{lr1::StateID, table::ActionKind};

/// A problem in the input grammar that was recovered from.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Warning {
    #[error(
        "{} production rule(s) are not reachable from the start symbol and were removed: {}",
        rules.len(),
        rules.join(", ")
    )]
    UnreachableRules { rules: Vec<String> },

    #[error("The nonterminal `{}' has no associated production rule", name)]
    NonterminalWithoutRules { name: String },

    #[error("unknown associativity `{}', defaulting to `none'", name)]
    UnknownAssoc { name: String },

    #[error("unknown precedence terminal `{}' referenced by `{}', using the default precedence", name, rule)]
    UnknownPrecedenceTerminal { name: String, rule: String },

    #[error("duplicate production rule ignored: `{}'", rule)]
    DuplicateRule { rule: String },

    #[error(
        "state {}: shift/reduce conflict on `{}' with unspecified associativity, resolved as shift",
        state,
        terminal
    )]
    UnspecifiedAssoc { state: StateID, terminal: String },

    #[error(
        "state {}: shift/reduce conflict on `{}' against `{}' decided by a precedence declared on one side only, resolved as {}",
        state,
        terminal,
        rule,
        resolved
    )]
    OneSidedPrecedence {
        state: StateID,
        terminal: String,
        rule: String,
        resolved: ActionKind,
    },

    #[error(
        "state {}: nonassociative `{}' used associatively, resolved as shift",
        state,
        terminal
    )]
    NonassocConflict { state: StateID, terminal: String },

    #[error(
        "state {}: goto on `{}' computed as both state {} and state {}, keeping {}",
        state,
        symbol,
        kept,
        discarded,
        kept
    )]
    GotoConflict {
        state: StateID,
        symbol: String,
        kept: StateID,
        discarded: StateID,
    },

    #[error(
        "{} shift/reduce conflict(s) and {} reduce/reduce conflict(s) were resolved",
        shift_reduce,
        reduce_reduce
    )]
    Conflicts {
        shift_reduce: usize,
        reduce_reduce: usize,
    },
}

/// Record `warning` and forward it to the diagnostic stream.
pub(crate) fn emit(warnings: &mut Vec<Warning>, warning: Warning) {
    tracing::warn!("{}", warning);
    warnings.push(warning);
}
