//! Augmentation of the declared grammar.
//!
//! Adds the synthetic `$start := S` production, drops the productions that
//! cannot take part in any derivation from the start symbol and numbers the
//! survivors by position.

use crate::{
    diagnostics::{self, Warning},
    grammar::{DeclaredRule, Grammar, NonterminalID, Rule, RuleID, SymbolID},
    types::Set,
};

#[tracing::instrument(skip_all)]
pub(crate) fn augment(g: &mut Grammar, declared: Vec<DeclaredRule>) {
    let reachable = reachable_nonterminals(g.start_symbol, &declared);

    g.rules.insert(
        RuleID::ACCEPT,
        Rule {
            id: RuleID::ACCEPT,
            left: NonterminalID::START,
            right: vec![SymbolID::N(g.start_symbol)],
            precedence: None,
            action: None,
        },
    );

    let mut pruned = vec![];
    for rule in declared {
        if !reachable.contains(&rule.left) {
            pruned.push(rule);
            continue;
        }
        let id = RuleID::new(g.rules.len() as u16);
        g.rules.insert(
            id,
            Rule {
                id,
                left: rule.left,
                right: rule.right,
                precedence: rule.precedence,
                action: rule.action,
            },
        );
    }

    if !pruned.is_empty() {
        let rules = pruned
            .iter()
            .map(|rule| {
                let mut s = format!("{} :=", g.nonterminals[&rule.left]);
                if rule.right.is_empty() {
                    s.push_str(" ε");
                }
                for symbol in &rule.right {
                    s.push(' ');
                    s.push_str(g.symbol_name(*symbol));
                }
                s
            })
            .collect();
        diagnostics::emit(&mut g.warnings, Warning::UnreachableRules { rules });
    }

    for &n in &reachable {
        if g.rules_of(n).next().is_none() {
            let name = g.nonterminals[&n].name().to_owned();
            diagnostics::emit(&mut g.warnings, Warning::NonterminalWithoutRules { name });
        }
    }

    tracing::debug!(
        "augmented grammar: {} rule(s) kept, {} pruned",
        g.rules.len() - 1,
        pruned.len()
    );
}

/// Collect the nonterminals derivable from `start`, in discovery order.
fn reachable_nonterminals(start: NonterminalID, rules: &[DeclaredRule]) -> Set<NonterminalID> {
    let mut reachable = Set::default();
    reachable.insert(start);

    // 値が更新されなくなるまで繰り返す
    let mut changed = true;
    while changed {
        changed = false;
        for rule in rules {
            if !reachable.contains(&rule.left) {
                continue;
            }
            for symbol in &rule.right {
                if let SymbolID::N(n) = symbol {
                    changed |= reachable.insert(*n);
                }
            }
        }
    }

    reachable
}
