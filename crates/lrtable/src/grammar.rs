//! Grammar types.

use crate::{
    augment,
    diagnostics::{self, Warning},
    types::Map,
    util::display_fn,
};
use std::{borrow::Cow, fmt};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TerminalID {
    raw: u16,
}

impl TerminalID {
    /// Reserved symbol used as a terminal symbol that means the end of input.
    pub const EOI: Self = Self::from_raw(0);

    /// Reserved marker for "derives nothing" in FIRST sets.
    ///
    /// It never appears in a production or an action table.
    pub const EPSILON: Self = Self::from_raw(1);

    /// Reserved symbol used as an error token.
    pub const ERROR: Self = Self::from_raw(2);

    const OFFSET: u16 = 3;

    #[inline]
    pub const fn from_raw(raw: u16) -> Self {
        Self { raw }
    }

    /// The integer encoding used for table lookups.
    #[inline]
    pub const fn into_raw(self) -> u16 {
        self.raw
    }
}

#[derive(Debug)]
pub struct Terminal {
    id: TerminalID,
    name: Cow<'static, str>,
    type_tag: Option<String>,
    precedence: Option<Precedence>,
}

impl Terminal {
    pub fn id(&self) -> TerminalID {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The semantic type attached to this symbol, consumed by code emitters.
    pub fn type_tag(&self) -> Option<&str> {
        self.type_tag.as_deref()
    }

    pub fn precedence(&self) -> Option<Precedence> {
        self.precedence
    }
}

impl fmt::Display for Terminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct NonterminalID {
    raw: u16,
}

impl NonterminalID {
    /// The synthetic start symbol of the augmented grammar.
    pub const START: Self = Self::new(0);

    const OFFSET: u16 = 1;

    #[inline]
    const fn new(raw: u16) -> Self {
        Self { raw }
    }

    #[inline]
    pub const fn into_raw(self) -> u16 {
        self.raw
    }
}

#[derive(Debug)]
pub struct Nonterminal {
    id: NonterminalID,
    name: Cow<'static, str>,
    type_tag: Option<String>,
}

impl Nonterminal {
    pub fn id(&self) -> NonterminalID {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_tag(&self) -> Option<&str> {
        self.type_tag.as_deref()
    }
}

impl fmt::Display for Nonterminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SymbolID {
    T(TerminalID),
    N(NonterminalID),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct RuleID {
    raw: u16,
}

impl RuleID {
    /// The augmented start production, `$start := S`.
    pub const ACCEPT: Self = Self::new(0);

    #[inline]
    pub(crate) const fn new(raw: u16) -> Self {
        Self { raw }
    }

    #[inline]
    pub const fn into_raw(self) -> u16 {
        self.raw
    }
}

impl fmt::Display for RuleID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.raw, f)
    }
}

/// The type that represents a production rule in grammar.
#[derive(Debug)]
pub struct Rule {
    pub(crate) id: RuleID,
    pub(crate) left: NonterminalID,
    pub(crate) right: Vec<SymbolID>,
    pub(crate) precedence: Option<Precedence>,
    pub(crate) action: Option<String>,
}

impl Rule {
    pub fn id(&self) -> RuleID {
        self.id
    }

    /// Return the left-hand side of this production.
    pub fn left(&self) -> NonterminalID {
        self.left
    }

    /// Return the right-hand side of this production.
    pub fn right(&self) -> &[SymbolID] {
        &self.right[..]
    }

    /// The user action attached to this production, opaque to the table construction.
    pub fn action(&self) -> Option<&str> {
        self.action.as_deref()
    }

    /// The precedence used when this production competes with a shift.
    ///
    /// An explicit override wins, otherwise the precedence of the rightmost
    /// terminal symbol is inherited.
    pub fn precedence(&self, g: &Grammar) -> Option<Precedence> {
        match self.precedence {
            Some(prec) => Some(prec),
            None => {
                for symbol in self.right.iter().rev() {
                    if let SymbolID::T(t) = symbol {
                        return g.terminals[t].precedence();
                    }
                }
                None
            }
        }
    }

    // `"LHS := R1 R2 R3"`
    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(move |f| {
            write!(f, "{} :=", g.nonterminals[&self.left])?;
            if self.right.is_empty() {
                return f.write_str(" ε");
            }
            for symbol in &self.right {
                write!(f, " {}", g.symbol_name(*symbol))?;
            }
            Ok(())
        })
    }
}

/// Precedence of a terminal symbol or production.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub struct Precedence {
    /// Binding strength; declared levels start at 1 and higher binds tighter.
    pub priority: u16,
    pub assoc: Assoc,
}

impl Precedence {
    pub const fn new(priority: u16, assoc: Assoc) -> Self {
        Self { priority, assoc }
    }

    /// The level compared during conflict resolution.
    ///
    /// Symbols without a declared precedence sit below every declared level.
    pub fn level(prec: Option<Self>) -> u16 {
        prec.map_or(0, |p| p.priority)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Assoc {
    None,
    Left,
    Right,
    Nonassoc,
}

impl Assoc {
    /// Parse an associativity name as written in grammar declarations.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            "nonassoc" => Some(Self::Nonassoc),
            "none" => Some(Self::None),
            _ => None,
        }
    }
}

impl fmt::Display for Assoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Left => write!(f, "left"),
            Self::Right => write!(f, "right"),
            Self::Nonassoc => write!(f, "nonassoc"),
        }
    }
}

/// The augmented grammar used to derive the parser tables.
///
/// Rules are numbered by position after unreachable ones have been pruned;
/// `RuleID::ACCEPT` is always the synthetic start production.
#[derive(Debug)]
#[non_exhaustive]
pub struct Grammar {
    pub terminals: Map<TerminalID, Terminal>,
    pub nonterminals: Map<NonterminalID, Nonterminal>,
    pub rules: Map<RuleID, Rule>,
    pub start_symbol: NonterminalID,
    pub(crate) warnings: Vec<Warning>,
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "## terminals:")?;
        for terminal in self.terminals.values() {
            write!(f, "{}", terminal)?;
            if let Some(prec) = terminal.precedence() {
                write!(f, " (priority={}, assoc={})", prec.priority, prec.assoc)?;
            }
            writeln!(f)?;
        }

        writeln!(f, "\n## nonterminals:")?;
        for nonterminal in self.nonterminals.values() {
            write!(f, "{}", nonterminal)?;
            if nonterminal.id() == self.start_symbol {
                write!(f, " (start)")?;
            }
            writeln!(f)?;
        }

        writeln!(f, "\n## rules:")?;
        for rule in self.rules.values() {
            write!(f, "{:03}: {}", rule.id(), rule.display(self))?;
            if let Some(prec) = &rule.precedence {
                write!(f, " (priority={}, assoc={})", prec.priority, prec.assoc)?;
            }
            writeln!(f)?;
        }

        Ok(())
    }
}

impl Grammar {
    /// Define a grammar using the specified function.
    pub fn define<F>(f: F) -> Result<Self, GrammarDefError>
    where
        F: FnOnce(&mut GrammarDef) -> Result<(), GrammarDefError>,
    {
        let mut def = GrammarDef::default();
        f(&mut def)?;
        def.end()
    }

    pub fn rule(&self, id: RuleID) -> &Rule {
        &self.rules[&id]
    }

    /// Iterate over the productions of `left`, in rule index order.
    pub fn rules_of(&self, left: NonterminalID) -> impl Iterator<Item = &Rule> + '_ {
        self.rules.values().filter(move |rule| rule.left == left)
    }

    pub fn terminal_by_name(&self, name: &str) -> Option<TerminalID> {
        self.terminals
            .values()
            .find(|t| t.name() == name)
            .map(|t| t.id())
    }

    pub fn nonterminal_by_name(&self, name: &str) -> Option<NonterminalID> {
        self.nonterminals
            .values()
            .find(|n| n.name() == name)
            .map(|n| n.id())
    }

    pub fn symbol_name(&self, symbol: SymbolID) -> &str {
        match symbol {
            SymbolID::T(t) => self.terminals[&t].name(),
            SymbolID::N(n) => self.nonterminals[&n].name(),
        }
    }

    /// Warnings reported while the grammar was defined and augmented.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }
}

/// A production as written by the grammar author, before augmentation.
#[derive(Debug)]
pub(crate) struct DeclaredRule {
    pub(crate) left: NonterminalID,
    pub(crate) right: Vec<SymbolID>,
    pub(crate) precedence: Option<Precedence>,
    pub(crate) action: Option<String>,
}

/// A handle to a production declared through [`GrammarDef::rule`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DeclaredRuleRef(usize);

/// The contextural values for building a `Grammar`.
#[derive(Debug)]
pub struct GrammarDef {
    terminals: Map<TerminalID, Terminal>,
    nonterminals: Map<NonterminalID, Nonterminal>,
    rules: Vec<DeclaredRule>,
    start: Option<NonterminalID>,
    next_terminal_id: u16,
    next_nonterminal_id: u16,
    next_priority: u16,
    warnings: Vec<Warning>,
}

impl Default for GrammarDef {
    fn default() -> Self {
        let mut def = GrammarDef {
            terminals: Map::default(),
            nonterminals: Map::default(),
            rules: vec![],
            start: None,
            next_terminal_id: TerminalID::OFFSET,
            next_nonterminal_id: NonterminalID::OFFSET,
            next_priority: 1,
            warnings: vec![],
        };

        for (id, name) in [
            (TerminalID::EOI, "$eoi"),
            (TerminalID::EPSILON, "$epsilon"),
            (TerminalID::ERROR, "$error"),
        ] {
            def.terminals.insert(
                id,
                Terminal {
                    id,
                    name: name.into(),
                    type_tag: None,
                    precedence: None,
                },
            );
        }

        def.nonterminals.insert(
            NonterminalID::START,
            Nonterminal {
                id: NonterminalID::START,
                name: "$start".into(),
                type_tag: None,
            },
        );

        def
    }
}

impl GrammarDef {
    /// Declare a terminal symbol used in this grammar.
    pub fn terminal(
        &mut self,
        name: &str,
        precedence: Option<Precedence>,
    ) -> Result<TerminalID, GrammarDefError> {
        if !verify_ident(name) {
            return Err(format!("incorrect token name: `{}'", name).into());
        }
        if self.terminals.values().any(|t| t.name() == name) {
            return Err(format!("The terminal `{}' has already been declared", name).into());
        }

        let id = TerminalID::from_raw(self.next_terminal_id);
        self.next_terminal_id += 1;
        self.terminals.insert(
            id,
            Terminal {
                id,
                name: name.to_owned().into(),
                type_tag: None,
                precedence,
            },
        );

        Ok(id)
    }

    /// Declare a nonterminal symbol used in this grammar.
    pub fn nonterminal(&mut self, name: &str) -> Result<NonterminalID, GrammarDefError> {
        if !verify_ident(name) {
            return Err(format!("incorrect symbol name: `{}'", name).into());
        }
        if self.nonterminals.values().any(|n| n.name() == name) {
            return Err(format!("The nonterminal `{}' has already been declared", name).into());
        }

        let id = NonterminalID::new(self.next_nonterminal_id);
        self.next_nonterminal_id += 1;
        self.nonterminals.insert(
            id,
            Nonterminal {
                id,
                name: name.to_owned().into(),
                type_tag: None,
            },
        );

        Ok(id)
    }

    /// Open a new precedence level, binding tighter than every level declared before it.
    ///
    /// An unrecognized associativity name is reported and treated as `none`.
    pub fn precedence(&mut self, assoc: &str) -> Precedence {
        let assoc = Assoc::from_name(assoc).unwrap_or_else(|| {
            diagnostics::emit(
                &mut self.warnings,
                Warning::UnknownAssoc {
                    name: assoc.to_owned(),
                },
            );
            Assoc::None
        });
        let prec = Precedence::new(self.next_priority, assoc);
        self.next_priority += 1;
        prec
    }

    /// Attach a semantic type to a declared symbol.
    pub fn symbol_type(&mut self, symbol: SymbolID, tag: &str) {
        match symbol {
            SymbolID::T(t) => {
                if let Some(t) = self.terminals.get_mut(&t) {
                    t.type_tag = Some(tag.to_owned());
                }
            }
            SymbolID::N(n) => {
                if let Some(n) = self.nonterminals.get_mut(&n) {
                    n.type_tag = Some(tag.to_owned());
                }
            }
        }
    }

    /// Specify a production rule into this grammer.
    ///
    /// A production identical to an earlier one is reported and ignored.
    pub fn rule<I>(
        &mut self,
        left: NonterminalID,
        right: I,
        precedence: Option<Precedence>,
    ) -> Result<DeclaredRuleRef, GrammarDefError>
    where
        I: IntoIterator<Item = SymbolID>,
    {
        if left == NonterminalID::START || !self.nonterminals.contains_key(&left) {
            return Err("undeclared left-hand side of production rule".into());
        }
        let right: Vec<SymbolID> = right.into_iter().collect();
        for symbol in &right {
            let known = match symbol {
                SymbolID::T(t) => {
                    *t != TerminalID::EOI
                        && *t != TerminalID::EPSILON
                        && self.terminals.contains_key(t)
                }
                SymbolID::N(n) => {
                    *n != NonterminalID::START && self.nonterminals.contains_key(n)
                }
            };
            if !known {
                return Err("undeclared or reserved symbol in production rule".into());
            }
        }

        if let Some(pos) = self
            .rules
            .iter()
            .position(|rule| rule.left == left && rule.right == right)
        {
            let rule = self.display_declared(&left, &right).to_string();
            diagnostics::emit(&mut self.warnings, Warning::DuplicateRule { rule });
            return Ok(DeclaredRuleRef(pos));
        }

        self.rules.push(DeclaredRule {
            left,
            right,
            precedence,
            action: None,
        });
        Ok(DeclaredRuleRef(self.rules.len() - 1))
    }

    /// Attach a user action to a declared production.
    pub fn rule_action(&mut self, rule: DeclaredRuleRef, action: &str) {
        if let Some(rule) = self.rules.get_mut(rule.0) {
            rule.action = Some(action.to_owned());
        }
    }

    /// Let a declared production borrow the precedence of the terminal named `name`.
    ///
    /// An unknown terminal is reported and the production keeps its default precedence.
    pub fn rule_prec_of(&mut self, rule: DeclaredRuleRef, name: &str) {
        let prec = self
            .terminals
            .values()
            .find(|t| t.name() == name)
            .map(|t| t.precedence());
        match prec {
            Some(prec) => {
                if let Some(rule) = self.rules.get_mut(rule.0) {
                    rule.precedence = prec;
                }
            }
            None => {
                let rule = match self.rules.get(rule.0) {
                    Some(r) => self.display_declared(&r.left, &r.right).to_string(),
                    None => String::new(),
                };
                diagnostics::emit(
                    &mut self.warnings,
                    Warning::UnknownPrecedenceTerminal {
                        name: name.to_owned(),
                        rule,
                    },
                );
            }
        }
    }

    /// Specify the start symbol for this grammar.
    ///
    /// Without it, the left-hand side of the first production is used.
    pub fn start_symbol(&mut self, symbol: NonterminalID) {
        self.start.replace(symbol);
    }

    fn display_declared<'a>(
        &'a self,
        left: &'a NonterminalID,
        right: &'a [SymbolID],
    ) -> impl fmt::Display + 'a {
        display_fn(move |f| {
            write!(f, "{} :=", self.nonterminals[left])?;
            if right.is_empty() {
                return f.write_str(" ε");
            }
            for symbol in right {
                match symbol {
                    SymbolID::T(t) => write!(f, " {}", self.terminals[t])?,
                    SymbolID::N(n) => write!(f, " {}", self.nonterminals[n])?,
                }
            }
            Ok(())
        })
    }

    fn end(mut self) -> Result<Grammar, GrammarDefError> {
        let start = match self.start.take() {
            Some(start) => start,
            None => self
                .rules
                .first()
                .map(|rule| rule.left)
                .ok_or_else(|| GrammarDefError::from("empty production rules"))?,
        };

        let mut grammar = Grammar {
            terminals: self.terminals,
            nonterminals: self.nonterminals,
            rules: Map::default(),
            start_symbol: start,
            warnings: self.warnings,
        };
        augment::augment(&mut grammar, self.rules);

        Ok(grammar)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GrammarDefError {
    #[error("Other error: {}", msg)]
    Other { msg: String },
}
impl From<&str> for GrammarDefError {
    fn from(msg: &str) -> Self {
        Self::Other { msg: msg.into() }
    }
}
impl From<String> for GrammarDefError {
    fn from(msg: String) -> Self {
        Self::Other { msg }
    }
}

fn verify_ident(s: &str) -> bool {
    let mut chars = s.chars();
    let Some(first) = chars.next() else {
        // The identifier must not be empty.
        return false;
    };
    if !(first == '_' || unicode_ident::is_xid_start(first)) {
        return false;
    }
    chars.all(unicode_ident::is_xid_continue)
}

#[cfg(test)]
mod tests {
    use super::*;
    use SymbolID::*;

    #[test]
    fn first_rule_defines_start_symbol() {
        let grammar = Grammar::define(|g| {
            let a = g.terminal("a", None)?;
            let s = g.nonterminal("S")?;
            let t = g.nonterminal("T")?;
            g.rule(t, [T(a)], None)?;
            g.rule(s, [N(t)], None)?;
            Ok(())
        })
        .unwrap();
        eprintln!("{}", grammar);

        assert_eq!(grammar.start_symbol, grammar.nonterminal_by_name("T").unwrap());
        let accept = grammar.rule(RuleID::ACCEPT);
        assert_eq!(accept.left(), NonterminalID::START);
        assert_eq!(accept.right(), [N(grammar.start_symbol)]);
    }

    #[test]
    fn rule_precedence_is_inherited_from_rightmost_terminal() {
        let grammar = Grammar::define(|g| {
            let add = g.precedence("left");
            let mul = g.precedence("left");
            let plus = g.terminal("PLUS", Some(add))?;
            let star = g.terminal("STAR", Some(mul))?;
            let num = g.terminal("NUM", None)?;
            let e = g.nonterminal("E")?;
            g.rule(e, [N(e), T(plus), N(e)], None)?;
            g.rule(e, [N(e), T(star), N(e)], None)?;
            let neg = g.rule(e, [T(plus), N(e), T(num)], None)?;
            g.rule_prec_of(neg, "STAR");
            g.rule(e, [T(num)], None)?;
            Ok(())
        })
        .unwrap();

        let precs: Vec<_> = grammar
            .rules
            .values()
            .skip(1)
            .map(|rule| Precedence::level(rule.precedence(&grammar)))
            .collect();
        assert_eq!(precs, [1, 2, 2, 0]);
    }

    #[test]
    fn unknown_assoc_and_precedence_are_warnings() {
        let grammar = Grammar::define(|g| {
            let prec = g.precedence("sideways");
            assert_eq!(prec.assoc, Assoc::None);
            let a = g.terminal("a", Some(prec))?;
            let s = g.nonterminal("S")?;
            let r = g.rule(s, [T(a)], None)?;
            g.rule_prec_of(r, "MISSING");
            Ok(())
        })
        .unwrap();

        assert!(matches!(
            grammar.warnings(),
            [
                Warning::UnknownAssoc { .. },
                Warning::UnknownPrecedenceTerminal { .. }
            ]
        ));
        assert_eq!(grammar.rule(RuleID::new(1)).precedence, None);
    }

    #[test]
    fn duplicate_rule_is_ignored() {
        let grammar = Grammar::define(|g| {
            let a = g.terminal("a", None)?;
            let s = g.nonterminal("S")?;
            let first = g.rule(s, [T(a)], None)?;
            let second = g.rule(s, [T(a)], None)?;
            assert_eq!(first, second);
            Ok(())
        })
        .unwrap();

        assert_eq!(grammar.rules.len(), 2);
        assert!(matches!(grammar.warnings(), [Warning::DuplicateRule { .. }]));
    }

    #[test]
    fn invalid_declarations_are_errors() {
        let err = Grammar::define(|g| {
            g.terminal("a", None)?;
            g.terminal("a", None)?;
            Ok(())
        });
        assert!(err.is_err());

        let err = Grammar::define(|g| {
            g.nonterminal("1abc")?;
            Ok(())
        });
        assert!(err.is_err());

        let err = Grammar::define(|g| {
            g.nonterminal("S")?;
            Ok(())
        });
        assert!(err.is_err());

        // reserved terminals never appear on a right-hand side
        for reserved in [TerminalID::EOI, TerminalID::EPSILON] {
            let err = Grammar::define(|g| {
                let a = g.terminal("a", None)?;
                let s = g.nonterminal("S")?;
                g.rule(s, [N(s), T(reserved)], None)?;
                g.rule(s, [T(a)], None)?;
                Ok(())
            });
            assert!(err.is_err());
        }
    }
}
