//! Resolved grammar trees and their compilation into expressions
//!
//! The compiler front end (out of scope here) hands over a [`Grammar`]:
//! a tree whose symbol references are known to resolve and whose tapes are
//! explicit. This module collects its tape set and per-tape vocabularies,
//! lowers it through the smart constructors, and wraps the result in the
//! scheduling layers the engine needs. [`Interpreter`] is the facade the
//! CLI and UI layers drive.

use crate::config::GenConfig;
use crate::engine::Gen;
use crate::env::Env;
use crate::error::GenError;
use crate::expr::{
    self, count, cursor, embed, greedy_cursor, hide, join, lit, matches, not, pre_tape,
    rename, repeat, seq_all, short, union, Expr, ReplaceShape,
};
use crate::tape::Record;
use crate::vocab::{Vocab, VocabMap};
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

/// A rewrite rule as the front end describes it.
#[derive(Debug, Clone)]
pub struct ReplaceRule {
    pub from: String,
    pub to: String,
    pub pairs: Vec<(Grammar, Grammar)>,
    pub pre: Option<Grammar>,
    pub post: Option<Grammar>,
    pub begins: bool,
    pub ends: bool,
    pub optional: bool,
}

/// Fully resolved grammar tree.
#[derive(Debug, Clone)]
pub enum Grammar {
    Epsilon,
    Null,
    Lit { tape: String, text: String },
    Dot { tape: String },
    Seq(Vec<Grammar>),
    Alt(Vec<Grammar>),
    Join(Box<Grammar>, Box<Grammar>),
    Match { inner: Box<Grammar>, from: String, to: String },
    Not(Box<Grammar>),
    Short(Box<Grammar>),
    Repeat { inner: Box<Grammar>, min: usize, max: Option<usize> },
    Rename { inner: Box<Grammar>, ext: String, int: String },
    Hide { inner: Box<Grammar>, tape: String },
    Embed { name: String },
    Replace(Box<ReplaceRule>),
}

impl Grammar {
    /// The set of externally visible tapes, following references through
    /// `defs` (each name is visited once, so cycles terminate).
    pub fn tapes(&self, defs: &BTreeMap<String, Grammar>) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        let mut seen = BTreeSet::new();
        self.tapes_into(defs, &mut seen, &mut out);
        out
    }

    fn tapes_into(
        &self,
        defs: &BTreeMap<String, Grammar>,
        seen: &mut BTreeSet<String>,
        out: &mut BTreeSet<String>,
    ) {
        match self {
            Grammar::Epsilon | Grammar::Null => {}
            Grammar::Lit { tape, .. } | Grammar::Dot { tape } => {
                out.insert(tape.clone());
            }
            Grammar::Seq(children) | Grammar::Alt(children) => {
                for child in children {
                    child.tapes_into(defs, seen, out);
                }
            }
            Grammar::Join(left, right) => {
                left.tapes_into(defs, seen, out);
                right.tapes_into(defs, seen, out);
            }
            Grammar::Match { inner, from, to } => {
                inner.tapes_into(defs, seen, out);
                out.insert(from.clone());
                out.insert(to.clone());
            }
            Grammar::Not(inner)
            | Grammar::Short(inner)
            | Grammar::Repeat { inner, .. } => inner.tapes_into(defs, seen, out),
            Grammar::Rename { inner, ext, int } => {
                let mut inner_tapes = BTreeSet::new();
                inner.tapes_into(defs, seen, &mut inner_tapes);
                inner_tapes.remove(int);
                inner_tapes.insert(ext.clone());
                out.extend(inner_tapes);
            }
            Grammar::Hide { inner, tape } => {
                let mut inner_tapes = BTreeSet::new();
                inner.tapes_into(defs, seen, &mut inner_tapes);
                // The generated alias is accounted for by the compiler
                inner_tapes.remove(tape);
                out.extend(inner_tapes);
            }
            Grammar::Embed { name } => {
                if seen.insert(name.clone()) {
                    if let Some(def) = defs.get(name) {
                        def.tapes_into(defs, seen, out);
                    }
                }
            }
            Grammar::Replace(rule) => {
                out.insert(rule.from.clone());
                out.insert(rule.to.clone());
                for (input, output) in &rule.pairs {
                    input.tapes_into(defs, seen, out);
                    output.tapes_into(defs, seen, out);
                }
                for context in rule.pre.iter().chain(rule.post.iter()) {
                    context.tapes_into(defs, seen, out);
                }
            }
        }
    }
}

/// Vocabulary facts gathered in one walk over the grammar.
#[derive(Default)]
struct VocabFacts {
    /// Literal texts per tape, in the order encountered.
    literals: Vec<(String, String)>,
    /// Tapes whose units must stay grapheme-granular (wildcards,
    /// complements, and pairings compare at unit level).
    needs_units: BTreeSet<String>,
    /// Tape pairs whose vocabularies must agree.
    linked: Vec<(String, String)>,
}

fn gather_vocab(
    grammar: &Grammar,
    defs: &BTreeMap<String, Grammar>,
    seen: &mut BTreeSet<String>,
    facts: &mut VocabFacts,
) {
    match grammar {
        Grammar::Epsilon | Grammar::Null => {}
        Grammar::Lit { tape, text } => {
            facts.literals.push((tape.clone(), text.clone()));
        }
        Grammar::Dot { tape } => {
            facts.needs_units.insert(tape.clone());
        }
        Grammar::Seq(children) | Grammar::Alt(children) => {
            for child in children {
                gather_vocab(child, defs, seen, facts);
            }
        }
        Grammar::Join(left, right) => {
            // Tapes shared across a join are compared unit by unit
            for tape in left.tapes(defs).intersection(&right.tapes(defs)) {
                facts.needs_units.insert(tape.clone());
            }
            gather_vocab(left, defs, seen, facts);
            gather_vocab(right, defs, seen, facts);
        }
        Grammar::Match { inner, from, to } => {
            facts.needs_units.insert(from.clone());
            facts.needs_units.insert(to.clone());
            facts.linked.push((from.clone(), to.clone()));
            gather_vocab(inner, defs, seen, facts);
        }
        Grammar::Not(inner) | Grammar::Short(inner) => {
            for tape in inner.tapes(defs) {
                facts.needs_units.insert(tape);
            }
            gather_vocab(inner, defs, seen, facts);
        }
        Grammar::Repeat { inner, .. } => gather_vocab(inner, defs, seen, facts),
        Grammar::Rename { inner, ext, int } => {
            gather_vocab(inner, defs, seen, facts);
            // Approximation: fold the internal name's facts into the
            // external one rather than tracking scopes
            facts.linked.push((int.clone(), ext.clone()));
        }
        Grammar::Hide { inner, .. } => gather_vocab(inner, defs, seen, facts),
        Grammar::Embed { name } => {
            if seen.insert(name.clone()) {
                if let Some(def) = defs.get(name) {
                    gather_vocab(def, defs, seen, facts);
                }
            }
        }
        Grammar::Replace(rule) => {
            facts.needs_units.insert(rule.from.clone());
            facts.needs_units.insert(rule.to.clone());
            facts.linked.push((rule.from.clone(), rule.to.clone()));
            for (input, output) in &rule.pairs {
                gather_vocab(input, defs, seen, facts);
                gather_vocab(output, defs, seen, facts);
            }
            for context in rule.pre.iter().chain(rule.post.iter()) {
                gather_vocab(context, defs, seen, facts);
            }
        }
    }
}

/// Build the per-tape vocabulary map from gathered facts.
fn build_vocab(facts: &VocabFacts, optimize_atomicity: bool) -> VocabMap {
    let mut map = VocabMap::new();
    for (tape, text) in &facts.literals {
        let atomic = optimize_atomicity && !facts.needs_units.contains(tape);
        let vocab = map.entry(tape);
        if atomic && vocab.units.is_empty() {
            vocab.atomic = true;
        }
        vocab.absorb(text);
    }
    // Linked tapes see each other's units; atomicity downgrades to
    // tokenized when the two sides disagree
    let mut changed = true;
    while changed {
        changed = false;
        for (a, b) in &facts.linked {
            let va = map.entry(a).clone();
            let vb = map.entry(b).clone();
            let tokenized = !va.atomic || !vb.atomic;
            let mut merged = if tokenized { Vocab::tokenized() } else { Vocab::atomic() };
            merged.merge(&va);
            merged.merge(&vb);
            if merged != va {
                *map.entry(a) = merged.clone();
                changed = true;
            }
            if merged != vb {
                *map.entry(b) = merged;
                changed = true;
            }
        }
    }
    map
}

/// Grammar-to-expression lowering.
///
/// Also records what the lowering invents along the way: hidden-tape
/// aliases (which must still be scheduled) and replace tape pairs (which
/// may need a `PreTape` buffer at scheduling time).
struct Compiler<'d> {
    defs: &'d BTreeMap<String, Grammar>,
    vocab: VocabMap,
    hidden: Vec<(String, String)>,
    replace_pairs: Vec<(String, String)>,
}

impl<'d> Compiler<'d> {
    fn units(&self, tape: &str, text: &str) -> Vec<String> {
        match self.vocab.get(tape) {
            Some(vocab) => vocab.tokenize(text),
            None => crate::vocab::graphemes(text),
        }
    }

    fn compile(&mut self, grammar: &Grammar) -> Expr {
        match grammar {
            Grammar::Epsilon => expr::epsilon(),
            Grammar::Null => expr::null(),
            Grammar::Lit { tape, text } => lit(tape.clone(), self.units(tape, text)),
            Grammar::Dot { tape } => expr::dot(tape.clone()),
            Grammar::Seq(children) => {
                seq_all(children.iter().map(|c| self.compile(c)).collect())
            }
            Grammar::Alt(children) => {
                union(children.iter().map(|c| self.compile(c)).collect())
            }
            Grammar::Join(left, right) => {
                let left_tapes = left.tapes(self.defs);
                let right_tapes = right.tapes(self.defs);
                join(
                    self.compile(left),
                    self.compile(right),
                    left_tapes,
                    right_tapes,
                )
            }
            Grammar::Match { inner, from, to } => {
                matches(self.compile(inner), from.clone(), to.clone())
            }
            Grammar::Not(inner) => {
                let tapes = inner.tapes(self.defs);
                not(self.compile(inner), tapes)
            }
            Grammar::Short(inner) => short(self.compile(inner)),
            Grammar::Repeat { inner, min, max } => {
                repeat(self.compile(inner), *min, *max)
            }
            Grammar::Rename { inner, ext, int } => {
                rename(self.compile(inner), ext.clone(), int.clone())
            }
            Grammar::Hide { inner, tape } => {
                let (hidden, alias) = hide(self.compile(inner), tape.clone());
                self.hidden.push((alias, tape.clone()));
                hidden
            }
            Grammar::Embed { name } => embed(name),
            Grammar::Replace(rule) => {
                self.replace_pairs
                    .push((rule.from.clone(), rule.to.clone()));
                let mut shape = ReplaceShape::new(rule.from.clone(), rule.to.clone())
                    .begins(rule.begins)
                    .ends(rule.ends)
                    .optional(rule.optional);
                for (input, output) in &rule.pairs {
                    shape = shape.rule(self.compile(input), self.compile(output));
                }
                if let Some(pre) = &rule.pre {
                    shape = shape.pre(self.compile(pre));
                }
                if let Some(post) = &rule.post {
                    shape = shape.post(self.compile(post));
                }
                shape.build()
            }
        }
    }
}

/// Compiled grammar plus everything needed to run generation queries.
pub struct Interpreter {
    config: GenConfig,
    symbols: BTreeMap<String, Expr>,
    root: Expr,
    tapes: Vec<String>,
    vocab: VocabMap,
    linked: Vec<(String, String)>,
    replace_pairs: Vec<(String, String)>,
}

impl Interpreter {
    pub fn new(defs: BTreeMap<String, Grammar>, root: Grammar, config: GenConfig) -> Self {
        let mut facts = VocabFacts::default();
        let mut seen = BTreeSet::new();
        gather_vocab(&root, &defs, &mut seen, &mut facts);
        for def in defs.values() {
            gather_vocab(def, &defs, &mut seen, &mut facts);
        }
        let vocab = build_vocab(&facts, config.optimize_atomicity);
        let linked = facts.linked.clone();

        let mut visible: Vec<String> = root.tapes(&defs).into_iter().collect();

        let mut compiler = Compiler {
            defs: &defs,
            vocab,
            hidden: Vec::new(),
            replace_pairs: Vec::new(),
        };
        let mut symbols = BTreeMap::new();
        for (name, def) in &defs {
            let compiled = compiler.compile(def);
            symbols.insert(name.clone(), compiled);
        }
        let root = compiler.compile(&root);

        // Hidden aliases still need scheduling, and they inherit the
        // vocabulary of the name they replaced
        let mut vocab = compiler.vocab.clone();
        for (alias, original) in &compiler.hidden {
            let inherited = vocab.entry(original).clone();
            vocab.entry(alias).merge(&inherited);
            vocab.entry(alias).atomic = inherited.atomic;
            visible.push(alias.clone());
        }

        Interpreter {
            config,
            symbols,
            root,
            tapes: visible,
            vocab,
            linked,
            replace_pairs: compiler.replace_pairs,
        }
    }

    /// Every schedulable tape, queried-priority aside.
    pub fn tapes(&self) -> &[String] {
        &self.tapes
    }

    /// Declared vocabulary for `tape`, if any literal mentioned it.
    pub fn vocab(&self, tape: &str) -> Option<&Vocab> {
        self.vocab.get(tape)
    }

    /// Scheduling order: queried tapes first, then the configured
    /// priority override, then whatever remains.
    fn order(&self, query: &Record) -> Vec<String> {
        let mut order = Vec::new();
        let push = |order: &mut Vec<String>, tape: &String| {
            if !order.contains(tape) && self.tapes.contains(tape) {
                order.push(tape.clone());
            }
        };
        for tape in query.0.keys() {
            push(&mut order, tape);
        }
        for tape in &self.config.priority {
            push(&mut order, tape);
        }
        for tape in &self.tapes {
            push(&mut order, tape);
        }
        order
    }

    fn schedule(&self, query: &Record) -> Expr {
        // A constraint on a tape the grammar does not define can never be
        // satisfied; the run yields no records rather than an error
        if query.0.keys().any(|tape| !self.tapes.contains(tape)) {
            return expr::null();
        }

        // Query units extend the tape vocabulary for this request, and
        // propagate across matched tape pairs, so out-of-lexicon input
        // still reaches the copy-through branches
        let mut vocab = self.vocab.clone();
        for (tape, text) in &query.0 {
            vocab.entry(tape).absorb(text);
        }
        let mut changed = !query.0.is_empty();
        while changed {
            changed = false;
            for (a, b) in &self.linked {
                let ua = vocab.entry(a).clone();
                let ub = vocab.entry(b).clone();
                if !ub.units.is_subset(&ua.units) || !ua.units.is_subset(&ub.units) {
                    vocab.entry(a).merge(&ub);
                    vocab.entry(b).merge(&ua);
                    changed = true;
                }
            }
        }

        let mut constrained = self.root.clone();
        let grammar_tapes: BTreeSet<String> = self.tapes.iter().cloned().collect();
        for (tape, text) in &query.0 {
            let units = vocab.entry(tape).tokenize(text);
            let constraint_tapes: BTreeSet<String> = std::iter::once(tape.clone()).collect();
            constrained = join(
                constrained,
                lit(tape.clone(), units),
                grammar_tapes.clone(),
                constraint_tapes,
            );
        }

        let order = self.order(query);

        // A replace rule whose output tape is scheduled before its input
        // tape has its input buffered rather than cursored
        let mut buffered: Vec<(String, String)> = Vec::new();
        for (from, to) in &self.replace_pairs {
            let from_pos = order.iter().position(|t| t == from);
            let to_pos = order.iter().position(|t| t == to);
            if let (Some(f), Some(t)) = (from_pos, to_pos) {
                if t < f && !query.0.contains_key(from.as_str()) {
                    buffered.push((from.clone(), to.clone()));
                }
            }
        }

        let mut expr = constrained;
        for (from, to) in &buffered {
            expr = pre_tape(expr, from.clone(), to.clone());
        }

        for tape in order.iter().rev() {
            if buffered.iter().any(|(from, _)| from == tape) {
                continue;
            }
            let tape_vocab = vocab.get(tape).cloned().unwrap_or_else(Vocab::tokenized);
            let guarded = count(expr, tape.clone(), self.config.max_chars.for_tape(tape));
            // A fully constrained tape is finite; committing greedily to
            // its single candidate skips the backtracking
            expr = if query.0.contains_key(tape.as_str()) {
                greedy_cursor(tape.clone(), guarded, Rc::new(tape_vocab))
            } else {
                cursor(tape.clone(), guarded, Rc::new(tape_vocab))
            };
        }
        expr
    }

    /// Lazy generation under `query`'s per-tape constraints.
    pub fn generate(&self, query: &Record) -> Gen {
        let env = Env::new(&self.config).with_symbols(self.symbols.clone());
        let root = self.schedule(query);
        Gen::new(root, env)
    }

    /// Collect up to `limit` records (all of them when `None`).
    pub fn generate_all(
        &self,
        query: &Record,
        limit: Option<usize>,
    ) -> Result<Vec<Record>, GenError> {
        let mut records = Vec::new();
        for record in self.generate(query) {
            records.push(record?);
            if limit.is_some_and(|n| records.len() >= n) {
                break;
            }
        }
        Ok(records)
    }

    /// Draw up to `n` records under randomized branch rotation. With a
    /// configured seed the draw is reproducible.
    pub fn sample(&self, query: &Record, n: usize) -> Result<Vec<Record>, GenError> {
        let env = Env::new(&self.config)
            .with_symbols(self.symbols.clone())
            .with_random(true);
        let root = self.schedule(query);
        let mut records = Vec::new();
        for record in Gen::new(root, env) {
            records.push(record?);
            if records.len() >= n {
                break;
            }
        }
        Ok(records)
    }
}
