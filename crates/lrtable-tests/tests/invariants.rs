use lrtable::{
    grammar::{Grammar, GrammarDef, GrammarDefError, SymbolID},
    lr1::StateID,
    types::Set,
    Output,
};
use lrtable_tests::grammars;
use std::collections::VecDeque;

type GrammarFn = fn(&mut GrammarDef) -> Result<(), GrammarDefError>;

const GRAMMARS: &[(&str, GrammarFn)] = &[
    ("g_simple1", grammars::g_simple1),
    ("g_simple2", grammars::g_simple2),
    ("g2", grammars::g2),
    ("balanced", grammars::balanced),
    ("dangling_else", grammars::dangling_else),
    ("arithmetic", grammars::arithmetic),
    ("with_unreachable", grammars::with_unreachable),
    ("reduce_reduce", grammars::reduce_reduce),
    ("with_nullable", grammars::with_nullable),
    ("min_caml", grammars::min_caml),
];

fn build(f: GrammarFn) -> (Grammar, Output) {
    let grammar = Grammar::define(f).unwrap();
    let output = lrtable::compute(&grammar).unwrap();
    (grammar, output)
}

#[test]
fn one_entry_per_cell() {
    for &(name, f) in GRAMMARS {
        let (_, output) = build(f);

        let actions: Set<_> = output
            .table
            .action_entries()
            .map(|entry| (entry.state, entry.terminal))
            .collect();
        assert_eq!(actions.len(), output.table.action_entries().count(), "{}", name);

        let gotos: Set<_> = output
            .table
            .goto_entries()
            .map(|entry| (entry.state, entry.nonterminal))
            .collect();
        assert_eq!(gotos.len(), output.table.goto_entries().count(), "{}", name);

        for entry in output.table.goto_entries() {
            assert_eq!(
                output
                    .automaton
                    .goto(entry.state, SymbolID::N(entry.nonterminal)),
                Some(entry.target),
                "{}",
                name
            );
        }
    }
}

#[test]
fn kernels_are_unique() {
    for &(name, f) in GRAMMARS {
        let (_, output) = build(f);
        let kernels: Set<_> = output
            .automaton
            .states()
            .map(|(_, state)| state.kernel())
            .collect();
        assert_eq!(kernels.len(), output.automaton.len(), "{}", name);
        assert!(output.automaton.warnings().is_empty(), "{}", name);
    }
}

#[test]
fn every_state_is_reachable() {
    for &(name, f) in GRAMMARS {
        let (_, output) = build(f);

        let mut visited = Set::default();
        visited.insert(StateID::START);
        let mut queue = VecDeque::from([StateID::START]);
        while let Some(current) = queue.pop_front() {
            for (from, _, to) in output.automaton.edges() {
                if from == current && visited.insert(to) {
                    queue.push_back(to);
                }
            }
        }
        assert_eq!(visited.len(), output.automaton.len(), "{}", name);

        // States are numbered in discovery order.
        let mut order: Vec<_> = visited.into_iter().collect();
        order.sort();
        for (i, id) in order.into_iter().enumerate() {
            assert_eq!(id.index(), i, "{}", name);
        }
    }
}

#[test]
fn construction_is_deterministic() {
    for &(name, f) in GRAMMARS {
        let (g1, first) = build(f);
        let (g2, second) = build(f);

        assert_eq!(
            first.automaton.display(&g1).to_string(),
            second.automaton.display(&g2).to_string(),
            "{}",
            name
        );
        assert!(
            first
                .table
                .action_entries()
                .eq(second.table.action_entries()),
            "{}",
            name
        );
        assert!(
            first.table.goto_entries().eq(second.table.goto_entries()),
            "{}",
            name
        );
        assert_eq!(first.warnings, second.warnings, "{}", name);
    }
}

#[test]
fn items_only_refer_to_kept_rules() {
    for &(name, f) in GRAMMARS {
        let (grammar, output) = build(f);
        for (_, state) in output.automaton.states() {
            for item in state.items() {
                let rule = grammar.rules.get(&item.rule).unwrap_or_else(|| {
                    panic!("{}: item refers to a pruned rule {}", name, item.rule)
                });
                assert!(item.marker as usize <= rule.right().len(), "{}", name);
                assert_ne!(
                    item.lookahead,
                    lrtable::grammar::TerminalID::EPSILON,
                    "{}",
                    name
                );
            }
        }
    }
}
