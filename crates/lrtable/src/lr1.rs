//! The implementation of canonical LR(1) automaton.

use crate::{
    diagnostics::{self, Warning},
    first_sets::FirstSets,
    grammar::{Grammar, NonterminalID, RuleID, SymbolID, TerminalID},
    types::{Map, Set},
    util::display_fn,
};
use std::{
    collections::{BTreeSet, VecDeque},
    fmt,
};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct StateID {
    raw: u32,
}

impl StateID {
    /// The state containing `[$start := . S, $eoi]`.
    pub const START: Self = Self::from_raw(0);

    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self { raw }
    }

    /// The row index of this state in the generated tables.
    #[inline]
    pub const fn index(self) -> usize {
        self.raw as usize
    }
}

impl fmt::Display for StateID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}", self.raw)
    }
}

// LR(1) item
// X: Y1 Y2 ... Yn という構文規則があったとき、それにマーカ位置と先読み記号を付与したもの
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LR1Item {
    pub rule: RuleID,
    pub marker: u16,
    pub lookahead: TerminalID,
}

impl LR1Item {
    /// Whether this item takes part in the identity of its item set.
    pub fn is_kernel(&self) -> bool {
        self.marker > 0 || self.rule == RuleID::ACCEPT
    }

    /// The symbol right after the marker, if any.
    pub fn next_symbol(&self, g: &Grammar) -> Option<SymbolID> {
        g.rule(self.rule).right().get(self.marker as usize).copied()
    }

    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(move |f| {
            let rule = g.rule(self.rule);
            write!(f, "[{} :=", g.nonterminals[&rule.left()])?;
            for (i, symbol) in rule.right().iter().enumerate() {
                if i == self.marker as usize {
                    f.write_str(" .")?;
                }
                write!(f, " {}", g.symbol_name(*symbol))?;
            }
            if self.marker as usize == rule.right().len() {
                f.write_str(" .")?;
            }
            write!(f, ", {}]", g.terminals[&self.lookahead])
        })
    }
}

/// The kernel items identifying an item set.
pub type Kernel = BTreeSet<LR1Item>;

/// A closed set of LR(1) items, i.e. one state of the automaton.
///
/// Equality only looks at the kernel items, so two item sets reached along
/// different paths compare equal exactly when they denote the same state.
#[derive(Debug, Clone)]
pub struct ItemSet {
    items: BTreeSet<LR1Item>,
}

impl ItemSet {
    pub fn items(&self) -> impl Iterator<Item = &LR1Item> + '_ {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn kernel(&self) -> Kernel {
        self.items
            .iter()
            .filter(|item| item.is_kernel())
            .copied()
            .collect()
    }
}

impl PartialEq for ItemSet {
    fn eq(&self, other: &Self) -> bool {
        self.items
            .iter()
            .filter(|item| item.is_kernel())
            .eq(other.items.iter().filter(|item| item.is_kernel()))
    }
}
impl Eq for ItemSet {}

/// The canonical collection of LR(1) item sets and the goto function between them.
#[derive(Debug)]
pub struct Automaton {
    states: Vec<ItemSet>,
    edges: Map<(StateID, SymbolID), StateID>,
    warnings: Vec<Warning>,
}

impl Automaton {
    #[tracing::instrument(skip_all)]
    pub fn generate(g: &Grammar) -> Self {
        let mut gen = AutomatonGenerator::new(g);
        gen.populate_states();
        tracing::debug!(
            "canonical LR(1) collection: {} state(s), {} edge(s)",
            gen.states.len(),
            gen.edges.len()
        );
        Self {
            states: gen.states,
            edges: gen.edges,
            warnings: gen.warnings,
        }
    }

    pub fn states(&self) -> impl Iterator<Item = (StateID, &ItemSet)> + '_ {
        self.states
            .iter()
            .enumerate()
            .map(|(i, state)| (StateID::from_raw(i as u32), state))
    }

    pub fn state(&self, id: StateID) -> &ItemSet {
        &self.states[id.index()]
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Iterate over the transitions in the order they were discovered.
    pub fn edges(&self) -> impl Iterator<Item = (StateID, SymbolID, StateID)> + '_ {
        self.edges
            .iter()
            .map(|(&(from, symbol), &to)| (from, symbol, to))
    }

    pub fn goto(&self, state: StateID, symbol: SymbolID) -> Option<StateID> {
        self.edges.get(&(state, symbol)).copied()
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(move |f| {
            let mut edges = self.edges().peekable();
            for (i, (id, state)) in self.states().enumerate() {
                if i > 0 {
                    writeln!(f)?;
                }
                writeln!(f, "#### State {}", id)?;
                writeln!(f, "## items")?;
                for item in state.items() {
                    let mark = if item.is_kernel() { "*" } else { "-" };
                    writeln!(f, "{} {}", mark, item.display(g))?;
                }
                writeln!(f, "## edges")?;
                while let Some((_, symbol, to)) = edges.next_if(|(from, _, _)| *from == id) {
                    writeln!(f, "- {} => {}", g.symbol_name(symbol), to)?;
                }
            }
            Ok(())
        })
    }
}

// === AutomatonGenerator ===

#[derive(Debug)]
struct AutomatonGenerator<'g> {
    grammar: &'g Grammar,
    first_sets: FirstSets,
    rules_by_left: Map<NonterminalID, Vec<RuleID>>,
    symbols: Vec<SymbolID>,
    states: Vec<ItemSet>,
    kernels: Map<Kernel, StateID>,
    edges: Map<(StateID, SymbolID), StateID>,
    pending_states: VecDeque<StateID>,
    warnings: Vec<Warning>,
}

impl<'g> AutomatonGenerator<'g> {
    fn new(grammar: &'g Grammar) -> Self {
        let mut rules_by_left: Map<NonterminalID, Vec<RuleID>> = Map::default();
        for rule in grammar.rules.values() {
            rules_by_left.entry(rule.left()).or_default().push(rule.id());
        }

        // Transition labels, in order of first appearance in the production list.
        let symbols: Set<SymbolID> = grammar
            .rules
            .values()
            .flat_map(|rule| rule.right().iter().copied())
            .collect();

        let mut gen = Self {
            grammar,
            first_sets: FirstSets::new(grammar),
            rules_by_left,
            symbols: symbols.into_iter().collect(),
            states: vec![],
            kernels: Map::default(),
            edges: Map::default(),
            pending_states: VecDeque::new(),
            warnings: vec![],
        };

        // [$start -> @ S] {$eoi}
        let initial: Kernel = Some(LR1Item {
            rule: RuleID::ACCEPT,
            marker: 0,
            lookahead: TerminalID::EOI,
        })
        .into_iter()
        .collect();
        gen.add_state(initial);

        gen
    }

    fn add_state(&mut self, kernel: Kernel) -> StateID {
        let id = StateID::from_raw(self.states.len() as u32);
        let item_set = self.closure(kernel.iter().copied());
        tracing::trace!("new state {}: {} item(s)", id, item_set.len());
        self.states.push(item_set);
        self.kernels.insert(kernel, id);
        self.pending_states.push_back(id);
        id
    }

    fn populate_states(&mut self) {
        // 新規に状態が生成されなくなるまで繰り返す
        while let Some(current) = self.pending_states.pop_front() {
            let mut transitions = self.extract_transitions(current);
            for i in 0..self.symbols.len() {
                let symbol = self.symbols[i];
                let Some(kernel) = transitions.swap_remove(&symbol) else {
                    continue;
                };
                let target = match self.kernels.get(&kernel) {
                    Some(&id) => id,
                    None => self.add_state(kernel),
                };
                self.add_edge(current, symbol, target);
            }
        }
    }

    /// Record the transition `from --symbol--> to`.
    ///
    /// `populate_states` visits each (state, symbol) pair once and targets are
    /// deduplicated by kernel, so a second, different target for the same pair
    /// is unreachable from `Automaton::generate`. If it ever happens, the first
    /// edge is kept and the other is reported.
    fn add_edge(&mut self, from: StateID, symbol: SymbolID, to: StateID) {
        match self.edges.get(&(from, symbol)) {
            Some(&kept) if kept != to => {
                let symbol = self.grammar.symbol_name(symbol).to_owned();
                diagnostics::emit(
                    &mut self.warnings,
                    Warning::GotoConflict {
                        state: from,
                        symbol,
                        kept,
                        discarded: to,
                    },
                );
            }
            Some(..) => (),
            None => {
                self.edges.insert((from, symbol), to);
            }
        }
    }

    /// クロージャ展開
    fn closure(&self, kernel: impl IntoIterator<Item = LR1Item>) -> ItemSet {
        let mut items = BTreeSet::new();
        let mut pending = VecDeque::new();
        for item in kernel {
            if items.insert(item) {
                pending.push_back(item);
            }
        }

        while let Some(item) = pending.pop_front() {
            let rule = self.grammar.rule(item.rule);

            // [X -> ... @ Y beta, a]
            //  Y: one nonterminal symbol
            let (y_symbol, beta) = match &rule.right()[item.marker as usize..] {
                [SymbolID::N(y_symbol), beta @ ..] => (y_symbol, beta),
                _ => continue,
            };
            let Some(y_rules) = self.rules_by_left.get(y_symbol) else {
                continue;
            };

            // x \in First(beta a) を満たすすべての終端記号について [Y -> @ gamma, x] を追加する
            let lookaheads = self.first_sets.lookaheads(beta, item.lookahead);
            for &y_rule in y_rules {
                for lookahead in lookaheads.iter() {
                    let new_item = LR1Item {
                        rule: y_rule,
                        marker: 0,
                        lookahead,
                    };
                    if items.insert(new_item) {
                        pending.push_back(new_item);
                    }
                }
            }
        }

        ItemSet { items }
    }

    /// Group the items of `state` by the symbol after the marker, advancing the marker.
    ///
    /// Each group is the kernel of `Goto(state, symbol)`.
    fn extract_transitions(&self, state: StateID) -> Map<SymbolID, Kernel> {
        let mut transitions: Map<SymbolID, Kernel> = Map::default();
        for item in self.states[state.index()].items() {
            if let Some(symbol) = item.next_symbol(self.grammar) {
                transitions.entry(symbol).or_default().insert(LR1Item {
                    marker: item.marker + 1,
                    ..*item
                });
            }
        }
        transitions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::SymbolID::*;

    fn g_simple() -> Grammar {
        Grammar::define(|def| {
            let equal = def.terminal("EQUAL", None)?;
            let plus = def.terminal("PLUS", None)?;
            let ident = def.terminal("ID", None)?;
            let num = def.terminal("NUM", None)?;

            let a = def.nonterminal("A")?;
            let e = def.nonterminal("E")?;
            let t = def.nonterminal("T")?;

            def.rule(a, [N(e), T(equal), N(e)], None)?;
            def.rule(a, [T(ident)], None)?;
            def.rule(e, [N(e), T(plus), N(t)], None)?;
            def.rule(e, [N(t)], None)?;
            def.rule(t, [T(num)], None)?;
            def.rule(t, [T(ident)], None)?;

            Ok(())
        })
        .unwrap()
    }

    #[test]
    fn smoketest1() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let grammar = g_simple();
        eprintln!("{}", grammar);

        let automaton = Automaton::generate(&grammar);
        eprintln!("states:\n---\n{}", automaton.display(&grammar));

        assert!(automaton.warnings().is_empty());
        let kernels: Set<Kernel> = automaton.states().map(|(_, s)| s.kernel()).collect();
        assert_eq!(kernels.len(), automaton.len());
    }

    #[test]
    fn initial_state_is_closure_of_start_item() {
        let grammar = g_simple();
        let automaton = Automaton::generate(&grammar);
        let start = automaton.state(StateID::START);

        let kernel: Vec<_> = start.kernel().into_iter().collect();
        assert_eq!(
            kernel,
            [LR1Item {
                rule: RuleID::ACCEPT,
                marker: 0,
                lookahead: TerminalID::EOI,
            }]
        );

        // [E -> . T, x] for x in { =, + }
        let equal = grammar.terminal_by_name("EQUAL").unwrap();
        let plus = grammar.terminal_by_name("PLUS").unwrap();
        let lookaheads: Vec<_> = start
            .items()
            .filter(|item| item.rule == RuleID::new(4))
            .map(|item| item.lookahead)
            .collect();
        assert_eq!(lookaheads, [equal, plus]);
    }

    #[test]
    fn conflicting_edge_keeps_the_first_target() {
        let grammar = g_simple();
        let mut gen = AutomatonGenerator::new(&grammar);
        let ident = T(grammar.terminal_by_name("ID").unwrap());
        let first = StateID::from_raw(1);
        let second = StateID::from_raw(2);

        gen.add_edge(StateID::START, ident, first);
        gen.add_edge(StateID::START, ident, first);
        assert!(gen.warnings.is_empty());

        gen.add_edge(StateID::START, ident, second);
        assert_eq!(gen.edges.get(&(StateID::START, ident)), Some(&first));
        assert_eq!(gen.edges.len(), 1);
        assert_eq!(
            gen.warnings,
            [Warning::GotoConflict {
                state: StateID::START,
                symbol: "ID".to_owned(),
                kept: first,
                discarded: second,
            }]
        );
    }

    #[test]
    fn item_sets_compare_by_kernel() {
        let item = |rule: u16, marker, lookahead| LR1Item {
            rule: RuleID::new(rule),
            marker,
            lookahead: TerminalID::from_raw(lookahead),
        };
        let left = ItemSet {
            items: [item(1, 1, 0), item(2, 0, 0)].into_iter().collect(),
        };
        let right = ItemSet {
            items: [item(1, 1, 0), item(3, 0, 4)].into_iter().collect(),
        };
        let other = ItemSet {
            items: [item(1, 1, 3)].into_iter().collect(),
        };
        assert_eq!(left, right);
        assert_ne!(left, other);
    }

    #[test]
    fn canonical_states_are_not_merged() {
        // S -> a A a | b A b ; A -> c
        // The states after `a c` and `b c` share their LR(0) core but differ in lookaheads.
        let grammar = Grammar::define(|g| {
            let a = g.terminal("a", None)?;
            let b = g.terminal("b", None)?;
            let c = g.terminal("c", None)?;
            let s = g.nonterminal("S")?;
            let aa = g.nonterminal("A")?;
            g.rule(s, [T(a), N(aa), T(a)], None)?;
            g.rule(s, [T(b), N(aa), T(b)], None)?;
            g.rule(aa, [T(c)], None)?;
            Ok(())
        })
        .unwrap();
        let automaton = Automaton::generate(&grammar);
        eprintln!("{}", automaton.display(&grammar));

        let a = SymbolID::T(grammar.terminal_by_name("a").unwrap());
        let b = SymbolID::T(grammar.terminal_by_name("b").unwrap());
        let c = SymbolID::T(grammar.terminal_by_name("c").unwrap());
        let after_ac = automaton
            .goto(StateID::START, a)
            .and_then(|s| automaton.goto(s, c))
            .unwrap();
        let after_bc = automaton
            .goto(StateID::START, b)
            .and_then(|s| automaton.goto(s, c))
            .unwrap();
        assert_ne!(after_ac, after_bc);
    }
}
