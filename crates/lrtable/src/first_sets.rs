//! Calculation of first set function.

use crate::{
    grammar::{Grammar, NonterminalID, SymbolID, TerminalID},
    types::{Map, Set, TerminalSet},
};

#[derive(Debug)]
pub struct FirstSets {
    nullables: Set<NonterminalID>,
    map: Map<NonterminalID, TerminalSet>,
}

impl FirstSets {
    #[tracing::instrument(skip_all)]
    pub fn new(g: &Grammar) -> Self {
        let (expanded, nullables) = expand_productions(g);
        tracing::trace!("expanded productions: {}", expanded.len());

        let mut map: Map<NonterminalID, TerminalSet> = g
            .nonterminals
            .keys()
            .map(|n| (*n, TerminalSet::default()))
            .collect();

        // 制約条件の抽出
        // 展開後の構文規則 X -> Y ... に対し、
        //  - Y が終端記号なら Y \in First(X)
        //  - Y が非終端記号なら First(X) \supseteq First(Y)
        #[derive(Debug)]
        struct Constraint {
            sup: NonterminalID,
            sub: NonterminalID,
        }
        let mut constraints = vec![];
        for (left, right) in &expanded {
            match right.first() {
                Some(SymbolID::T(t)) => {
                    map[left].insert(*t);
                }
                Some(SymbolID::N(n)) if n != left => {
                    constraints.push(Constraint {
                        sup: *left,
                        sub: *n,
                    });
                }
                _ => (),
            }
        }

        // 制約条件の解消
        let mut changed = true;
        while changed {
            changed = false;
            for Constraint { sup, sub } in &constraints {
                let subset = map[sub].clone();
                changed |= map[sup].union_with(&subset);
            }
        }

        Self { nullables, map }
    }

    pub fn is_nullable(&self, n: NonterminalID) -> bool {
        self.nullables.contains(&n)
    }

    /// `First(symbol)`, containing `TerminalID::EPSILON` if the symbol derives the empty string.
    pub fn first(&self, symbol: SymbolID) -> TerminalSet {
        match symbol {
            SymbolID::T(t) => Some(t).into_iter().collect(),
            SymbolID::N(n) => {
                let mut set = self.map[&n].clone();
                if self.is_nullable(n) {
                    set.insert(TerminalID::EPSILON);
                }
                set
            }
        }
    }

    /// `First(symbols)`, containing `TerminalID::EPSILON` only if every symbol is nullable.
    pub fn first_of(&self, symbols: &[SymbolID]) -> TerminalSet {
        let mut res = TerminalSet::default();
        for symbol in symbols {
            let mut first = self.first(*symbol);
            if !first.remove(TerminalID::EPSILON) {
                res.union_with(&first);
                return res;
            }
            res.union_with(&first);
        }
        res.insert(TerminalID::EPSILON);
        res
    }

    /// `First(prefix lookahead)`; never contains the epsilon marker.
    pub fn lookaheads(&self, prefix: &[SymbolID], lookahead: TerminalID) -> TerminalSet {
        let mut res = self.first_of(prefix);
        if res.remove(TerminalID::EPSILON) {
            res.insert(lookahead);
        }
        res
    }
}

/// Repeatedly strip leading nullable nonterminals from the productions until
/// no new production appears, returning the expanded productions together with
/// the nullable nonterminals found on the way.
fn expand_productions(
    g: &Grammar,
) -> (Set<(NonterminalID, Vec<SymbolID>)>, Set<NonterminalID>) {
    let mut expanded: Set<(NonterminalID, Vec<SymbolID>)> = g
        .rules
        .values()
        .map(|rule| (rule.left(), rule.right().to_vec()))
        .collect();
    let mut nullables: Set<NonterminalID> = expanded
        .iter()
        .filter_map(|(left, right)| right.is_empty().then_some(*left))
        .collect();

    // 値が更新されなくなるまで繰り返す
    let mut changed = true;
    while changed {
        changed = false;
        let mut i = 0;
        while let Some((left, right)) = expanded.get_index(i) {
            i += 1;
            let stripped = match &right[..] {
                [SymbolID::N(n), rest @ ..] if nullables.contains(n) => (*left, rest.to_vec()),
                _ => continue,
            };
            if stripped.1.is_empty() {
                nullables.insert(stripped.0);
            }
            changed |= expanded.insert(stripped);
        }
    }

    (expanded, nullables)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::SymbolID::*;

    fn names(g: &Grammar, set: &TerminalSet) -> Vec<String> {
        set.iter().map(|t| g.terminals[&t].to_string()).collect()
    }

    #[test]
    fn first_sets_with_nullable() {
        // E → E + T n | T
        // T → a | ( E n ) | n a
        // n → ϵ | num
        let grammar = Grammar::define(|g| {
            let lparen = g.terminal("LPAREN", None)?;
            let rparen = g.terminal("RPAREN", None)?;
            let plus = g.terminal("PLUS", None)?;
            let a = g.terminal("A", None)?;
            let num = g.terminal("NUM", None)?;

            let expr = g.nonterminal("expr")?;
            let term = g.nonterminal("term")?;
            let nullable = g.nonterminal("nullable")?;

            g.rule(expr, [N(expr), T(plus), N(term), N(nullable)], None)?;
            g.rule(expr, [N(term)], None)?;
            g.rule(term, [T(a)], None)?;
            g.rule(term, [T(lparen), N(expr), N(nullable), T(rparen)], None)?;
            g.rule(term, [N(nullable), T(a)], None)?;
            g.rule(nullable, [], None)?;
            g.rule(nullable, [T(num)], None)?;
            Ok(())
        })
        .unwrap();
        let first_sets = FirstSets::new(&grammar);

        let expr = grammar.nonterminal_by_name("expr").unwrap();
        let nullable = grammar.nonterminal_by_name("nullable").unwrap();

        assert!(first_sets.is_nullable(nullable));
        assert!(!first_sets.is_nullable(expr));
        assert_eq!(
            names(&grammar, &first_sets.first(N(expr))),
            ["LPAREN", "A", "NUM"]
        );
        assert_eq!(
            names(&grammar, &first_sets.first(N(nullable))),
            ["$epsilon", "NUM"]
        );
        let rparen = grammar.terminal_by_name("RPAREN").unwrap();
        assert_eq!(
            names(&grammar, &first_sets.lookaheads(&[N(nullable)], rparen)),
            ["RPAREN", "NUM"]
        );
    }

    #[test]
    fn epsilon_propagates_through_chains() {
        // S → A B c ; A → B ; B → ϵ | b
        let grammar = Grammar::define(|g| {
            let b = g.terminal("b", None)?;
            let c = g.terminal("c", None)?;
            let s = g.nonterminal("S")?;
            let a = g.nonterminal("A")?;
            let bb = g.nonterminal("B")?;
            g.rule(s, [N(a), N(bb), T(c)], None)?;
            g.rule(a, [N(bb)], None)?;
            g.rule(bb, [], None)?;
            g.rule(bb, [T(b)], None)?;
            Ok(())
        })
        .unwrap();
        let first_sets = FirstSets::new(&grammar);

        let s = grammar.nonterminal_by_name("S").unwrap();
        let a = grammar.nonterminal_by_name("A").unwrap();
        assert!(first_sets.is_nullable(a));
        assert!(!first_sets.is_nullable(s));
        assert_eq!(names(&grammar, &first_sets.first(N(s))), ["b", "c"]);
        assert_eq!(
            names(&grammar, &first_sets.first_of(&[N(a), N(a)])),
            ["$epsilon", "b"]
        );
        assert!(first_sets.first_of(&[]).contains(TerminalID::EPSILON));
        assert_eq!(
            names(&grammar, &first_sets.lookaheads(&[], TerminalID::EOI)),
            ["$eoi"]
        );
    }
}
