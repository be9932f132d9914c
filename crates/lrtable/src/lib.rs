//! Canonical LR(1) parse table construction.

mod augment;

pub mod diagnostics;
pub mod first_sets;
pub mod grammar;
pub mod lr1;
pub mod table;
pub mod types;
pub mod util;

use self::{
    diagnostics::Warning,
    grammar::Grammar,
    lr1::Automaton,
    table::{ParseTable, TableError},
};

/// The artifacts derived from a grammar.
#[derive(Debug)]
#[non_exhaustive]
pub struct Output {
    pub automaton: Automaton,
    pub table: ParseTable,
    /// Every warning reported on the way, in the order it was raised.
    pub warnings: Vec<Warning>,
}

/// Compute the canonical LR(1) automaton and the parse table from the specified grammar.
pub fn compute(g: &Grammar) -> Result<Output, TableError> {
    let automaton = Automaton::generate(g);
    let table = ParseTable::generate(g, &automaton)?;

    let warnings = g
        .warnings()
        .iter()
        .chain(automaton.warnings())
        .chain(table.warnings())
        .cloned()
        .collect();

    Ok(Output {
        automaton,
        table,
        warnings,
    })
}
