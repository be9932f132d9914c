//! A shift-reduce driver over the generated tables.

use lrtable::{
    grammar::{Grammar, RuleID, TerminalID},
    lr1::StateID,
    table::{Action, ParseTable},
};

/// A trait for abstracting token symbols.
pub trait Token {
    fn as_terminal(&self) -> TerminalID;
}

impl Token for TerminalID {
    fn as_terminal(&self) -> TerminalID {
        *self
    }
}

impl<T> Token for (TerminalID, T) {
    fn as_terminal(&self) -> TerminalID {
        self.0
    }
}

/// One move performed by the driver.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Step {
    Shift(TerminalID),
    Reduce(RuleID),
    Accept,
}

#[derive(Debug, thiserror::Error)]
pub enum SimulateError {
    #[error("unexpected token `{}' in state {}", token, state)]
    UnexpectedToken { state: StateID, token: String },

    #[error("no goto from state {} on `{}'", state, nonterminal)]
    MissingGoto { state: StateID, nonterminal: String },

    #[error("empty state stack")]
    EmptyStateStack,
}

/// Run `tokens` through the tables and record every move up to the acceptance.
///
/// The end of input is appended automatically.
pub fn simulate<I>(g: &Grammar, table: &ParseTable, tokens: I) -> Result<Vec<Step>, SimulateError>
where
    I: IntoIterator,
    I::Item: Token,
{
    let mut tokens = tokens.into_iter().map(|t| t.as_terminal());
    let mut lookahead = tokens.next().unwrap_or(TerminalID::EOI);
    let mut state_stack = vec![StateID::START];
    let mut steps = vec![];

    loop {
        let current = *state_stack.last().ok_or(SimulateError::EmptyStateStack)?;
        match table.action(current, lookahead) {
            Some(Action::Shift(next)) => {
                tracing::trace!("state {}: shift `{}'", current, g.terminals[&lookahead]);
                steps.push(Step::Shift(lookahead));
                state_stack.push(next);
                lookahead = tokens.next().unwrap_or(TerminalID::EOI);
            }

            Some(Action::Reduce(reduce)) => {
                let rule = g.rule(reduce);
                tracing::trace!("state {}: reduce `{}'", current, rule.display(g));
                let n = rule.right().len();
                if n >= state_stack.len() {
                    return Err(SimulateError::EmptyStateStack);
                }
                state_stack.truncate(state_stack.len() - n);

                let top = *state_stack.last().ok_or(SimulateError::EmptyStateStack)?;
                let next = table.goto(top, rule.left()).ok_or_else(|| {
                    SimulateError::MissingGoto {
                        state: top,
                        nonterminal: g.nonterminals[&rule.left()].to_string(),
                    }
                })?;
                state_stack.push(next);
                steps.push(Step::Reduce(reduce));
            }

            Some(Action::Accept) => {
                steps.push(Step::Accept);
                return Ok(steps);
            }

            None => {
                return Err(SimulateError::UnexpectedToken {
                    state: current,
                    token: g.terminals[&lookahead].to_string(),
                })
            }
        }
    }
}

/// The productions reduced in `steps`, in textual form.
pub fn reductions(g: &Grammar, steps: &[Step]) -> Vec<String> {
    steps
        .iter()
        .filter_map(|step| match step {
            Step::Reduce(rule) => Some(g.rule(*rule).display(g).to_string()),
            _ => None,
        })
        .collect()
}
