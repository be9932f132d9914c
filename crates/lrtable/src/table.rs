//! Calculation of the action/goto table with conflict resolution.

use crate::{
    diagnostics::{self, Warning},
    grammar::{Assoc, Grammar, NonterminalID, Precedence, RuleID, SymbolID, TerminalID},
    lr1::{Automaton, StateID},
    types::Map,
    util::display_fn,
};
use std::{cmp::Ordering, fmt};

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TableError {
    #[error(
        "state {}: multiple shift targets on `{}' (state {} and state {})",
        state,
        terminal,
        first,
        second
    )]
    MultipleShifts {
        state: StateID,
        terminal: String,
        first: StateID,
        second: StateID,
    },

    #[error("state {}: no transition is recorded for the shift on `{}'", state, terminal)]
    MissingTransition { state: StateID, terminal: String },

    #[error("state {}: there is no actions on `{}'", state, terminal)]
    EmptyActions { state: StateID, terminal: String },

    #[error("state {}: detected shift/accept conflict on `{}'", state, terminal)]
    ShiftAcceptConflict { state: StateID, terminal: String },
}

/// The action that the LR automaton in a state performs on a particular
/// lookahead symbol.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Action {
    /// Read a lookahead symbol and transition to the specified state.
    Shift(StateID),

    /// Reduce to the specified production rule.
    Reduce(RuleID),

    Accept,
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Shift(..) => ActionKind::Shift,
            Self::Reduce(..) => ActionKind::Reduce,
            Self::Accept => ActionKind::Accept,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Shift,
    Reduce,
    Accept,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shift => write!(f, "shift"),
            Self::Reduce => write!(f, "reduce"),
            Self::Accept => write!(f, "accept"),
        }
    }
}

/// The winning action for a pair of a state and a lookahead terminal.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ActionEntry {
    pub state: StateID,
    pub terminal: TerminalID,
    pub action: Action,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct GotoEntry {
    pub state: StateID,
    pub nonterminal: NonterminalID,
    pub target: StateID,
}

/// The number of conflicts resolved while building the table.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct ConflictCounts {
    pub shift_reduce: usize,
    pub reduce_reduce: usize,
}

#[derive(Debug)]
#[non_exhaustive]
pub struct ParseTableRow {
    /// Actions keyed by lookahead, in ascending terminal order.
    pub actions: Map<TerminalID, Action>,
    pub gotos: Map<NonterminalID, StateID>,
}

#[derive(Debug)]
pub struct ParseTable {
    pub states: Map<StateID, ParseTableRow>,
    conflicts: ConflictCounts,
    warnings: Vec<Warning>,
}

impl ParseTable {
    #[tracing::instrument(skip_all)]
    pub fn generate(g: &Grammar, automaton: &Automaton) -> Result<Self, TableError> {
        let mut gen = TableGenerator {
            grammar: g,
            conflicts: ConflictCounts::default(),
            warnings: vec![],
        };

        let mut states = Map::default();
        for (id, item_set) in automaton.states() {
            #[derive(Default)]
            struct PendingAction {
                shift: Option<StateID>,
                reduces: Vec<RuleID>,
            }
            let mut pending_actions = Map::<TerminalID, PendingAction>::default();
            for item in item_set.items() {
                match item.next_symbol(g) {
                    Some(SymbolID::T(t)) => {
                        let next = automaton.goto(id, SymbolID::T(t)).ok_or_else(|| {
                            TableError::MissingTransition {
                                state: id,
                                terminal: g.terminals[&t].to_string(),
                            }
                        })?;
                        let action = pending_actions.entry(t).or_default();
                        match action.shift {
                            Some(first) if first != next => {
                                return Err(TableError::MultipleShifts {
                                    state: id,
                                    terminal: g.terminals[&t].to_string(),
                                    first,
                                    second: next,
                                });
                            }
                            _ => action.shift = Some(next),
                        }
                    }
                    Some(SymbolID::N(..)) => (),
                    None => {
                        // The accept item only completes on the end of input.
                        if item.rule == RuleID::ACCEPT && item.lookahead != TerminalID::EOI {
                            continue;
                        }
                        let action = pending_actions.entry(item.lookahead).or_default();
                        if !action.reduces.contains(&item.rule) {
                            action.reduces.push(item.rule);
                        }
                    }
                }
            }
            pending_actions.sort_keys();

            let mut actions: Map<TerminalID, Action> = Map::default();
            for (symbol, action) in pending_actions {
                let resolved = gen.resolve_conflict(id, symbol, action.shift, action.reduces)?;
                actions.insert(symbol, resolved);
            }

            states.insert(
                id,
                ParseTableRow {
                    actions,
                    gotos: Map::default(),
                },
            );
        }

        for (from, symbol, to) in automaton.edges() {
            if let SymbolID::N(n) = symbol {
                if let Some(row) = states.get_mut(&from) {
                    row.gotos.insert(n, to);
                }
            }
        }

        let ConflictCounts {
            shift_reduce,
            reduce_reduce,
        } = gen.conflicts;
        if shift_reduce > 0 || reduce_reduce > 0 {
            diagnostics::emit(
                &mut gen.warnings,
                Warning::Conflicts {
                    shift_reduce,
                    reduce_reduce,
                },
            );
        }

        tracing::debug!("parse table: {} row(s)", states.len());

        Ok(Self {
            states,
            conflicts: gen.conflicts,
            warnings: gen.warnings,
        })
    }

    /// One entry per pair of a state and a terminal with an action.
    pub fn action_entries(&self) -> impl Iterator<Item = ActionEntry> + '_ {
        self.states.iter().flat_map(|(&state, row)| {
            row.actions.iter().map(move |(&terminal, &action)| ActionEntry {
                state,
                terminal,
                action,
            })
        })
    }

    /// One entry per pair of a state and a nonterminal with a transition.
    pub fn goto_entries(&self) -> impl Iterator<Item = GotoEntry> + '_ {
        self.states.iter().flat_map(|(&state, row)| {
            row.gotos.iter().map(move |(&nonterminal, &target)| GotoEntry {
                state,
                nonterminal,
                target,
            })
        })
    }

    pub fn action(&self, state: StateID, terminal: TerminalID) -> Option<Action> {
        self.states.get(&state)?.actions.get(&terminal).copied()
    }

    pub fn goto(&self, state: StateID, nonterminal: NonterminalID) -> Option<StateID> {
        self.states.get(&state)?.gotos.get(&nonterminal).copied()
    }

    pub fn conflicts(&self) -> ConflictCounts {
        self.conflicts
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(move |f| {
            for (i, (id, row)) in self.states.iter().enumerate() {
                if i > 0 {
                    writeln!(f)?;
                }

                writeln!(f, "#### State {}", id)?;
                writeln!(f, "## actions")?;
                for (token, action) in &row.actions {
                    let token = &g.terminals[token];
                    match action {
                        Action::Shift(n) => {
                            writeln!(f, "- {} => shift({})", token, n)?;
                        }
                        Action::Reduce(reduce) => {
                            let reduce = &g.rules[reduce];
                            writeln!(f, "- {} => reduce({})", token, reduce.display(g))?;
                        }
                        Action::Accept => {
                            writeln!(f, "- {} => accept", token)?;
                        }
                    }
                }

                writeln!(f, "## gotos")?;
                for (symbol, goto) in &row.gotos {
                    writeln!(f, "- {} => goto({})", g.nonterminals[symbol], goto)?;
                }
            }
            Ok(())
        })
    }
}

struct TableGenerator<'g> {
    grammar: &'g Grammar,
    conflicts: ConflictCounts,
    warnings: Vec<Warning>,
}

impl TableGenerator<'_> {
    /// Reduce the competing actions on `symbol` to a single winner.
    ///
    /// The accept action is treated as a reduction of `RuleID::ACCEPT`.
    fn resolve_conflict(
        &mut self,
        state: StateID,
        symbol: TerminalID,
        shift: Option<StateID>,
        mut reduces: Vec<RuleID>,
    ) -> Result<Action, TableError> {
        use Action::*;

        reduces.sort();
        let reduce = match reduces.split_first() {
            Some((&reduce, rest)) => {
                if !rest.is_empty() {
                    tracing::debug!(
                        "state {}: reduce/reduce conflict on `{}', keeping rule {}",
                        state,
                        self.grammar.terminals[&symbol],
                        reduce
                    );
                    self.conflicts.reduce_reduce += rest.len();
                }
                Some(reduce)
            }
            None => None,
        };

        match (shift, reduce) {
            (Some(next), None) => Ok(Shift(next)),
            (None, Some(RuleID::ACCEPT)) => Ok(Accept),
            (None, Some(reduce)) => Ok(Reduce(reduce)),
            (None, None) => Err(TableError::EmptyActions {
                state,
                terminal: self.grammar.terminals[&symbol].to_string(),
            }),
            (Some(..), Some(RuleID::ACCEPT)) => Err(TableError::ShiftAcceptConflict {
                state,
                terminal: self.grammar.terminals[&symbol].to_string(),
            }),
            (Some(next), Some(reduce)) => Ok(self.resolve_shift_reduce(state, symbol, next, reduce)),
        }
    }

    fn resolve_shift_reduce(
        &mut self,
        state: StateID,
        symbol: TerminalID,
        next: StateID,
        reduce: RuleID,
    ) -> Action {
        let g = self.grammar;
        let shift_prec = g.terminals[&symbol].precedence();
        let reduce_prec = g.rule(reduce).precedence(g);

        let shift_level = Precedence::level(shift_prec);
        let reduce_level = Precedence::level(reduce_prec);
        let resolved = match Ord::cmp(&shift_level, &reduce_level) {
            Ordering::Greater => Some(Action::Shift(next)),
            Ordering::Less => Some(Action::Reduce(reduce)),
            Ordering::Equal => None,
        };
        if let Some(action) = resolved {
            if shift_prec.is_none() || reduce_prec.is_none() {
                diagnostics::emit(
                    &mut self.warnings,
                    Warning::OneSidedPrecedence {
                        state,
                        terminal: g.terminals[&symbol].to_string(),
                        rule: g.rule(reduce).display(g).to_string(),
                        resolved: action.kind(),
                    },
                );
            }
            return action;
        }

        self.conflicts.shift_reduce += 1;
        tracing::debug!(
            "state {}: shift/reduce conflict on `{}' against `{}'",
            state,
            g.terminals[&symbol],
            g.rule(reduce).display(g)
        );

        let terminal = g.terminals[&symbol].to_string();
        match shift_prec.map_or(Assoc::None, |p| p.assoc) {
            Assoc::Left => Action::Reduce(reduce),
            Assoc::Right => Action::Shift(next),
            Assoc::Nonassoc => {
                diagnostics::emit(
                    &mut self.warnings,
                    Warning::NonassocConflict { state, terminal },
                );
                Action::Shift(next)
            }
            Assoc::None => {
                diagnostics::emit(
                    &mut self.warnings,
                    Warning::UnspecifiedAssoc { state, terminal },
                );
                Action::Shift(next)
            }
        }
    }
}
