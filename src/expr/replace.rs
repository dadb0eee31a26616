//! Rewrite rules (`input -> output || pre _ post`)
//!
//! Built entirely out of the core combinators, not as a node of its own.
//! Each rule instance pairs its input and output literals through
//! [`correspond`] and sandwiches them between Match-wrapped context, so the
//! context material is copied to the output tape unchanged. A negated
//! copy-through branch covers the strings the pattern does not reach.
//!
//! This construction is calibrated against the rewrite regression fixtures;
//! zero-width (pure insertion) rules are supported only with both anchors
//! set.

use super::build::*;
use super::Expr;
use std::collections::BTreeSet;

/// Declarative description of one rewrite rule.
///
/// `rules` holds the `(input, output)` expression pairs; `pre` and `post`
/// are context expressions over the input tape. `begins`/`ends` anchor the
/// pattern at the start/end of the tape; `optional` adds the unchanged
/// copy-through alternative even where the pattern applies.
pub struct ReplaceShape {
    pub from: String,
    pub to: String,
    pub rules: Vec<(Expr, Expr)>,
    pub pre: Option<Expr>,
    pub post: Option<Expr>,
    pub begins: bool,
    pub ends: bool,
    pub optional: bool,
}

impl ReplaceShape {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        ReplaceShape {
            from: from.into(),
            to: to.into(),
            rules: Vec::new(),
            pre: None,
            post: None,
            begins: false,
            ends: false,
            optional: false,
        }
    }

    pub fn rule(mut self, input: Expr, output: Expr) -> Self {
        self.rules.push((input, output));
        self
    }

    pub fn pre(mut self, context: Expr) -> Self {
        self.pre = Some(context);
        self
    }

    pub fn post(mut self, context: Expr) -> Self {
        self.post = Some(context);
        self
    }

    pub fn begins(mut self, begins: bool) -> Self {
        self.begins = begins;
        self
    }

    pub fn ends(mut self, ends: bool) -> Self {
        self.ends = ends;
        self
    }

    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    pub fn build(self) -> Expr {
        replace(self)
    }
}

/// Assemble a rewrite rule into an expression over its two tapes.
pub fn replace(shape: ReplaceShape) -> Expr {
    let ReplaceShape {
        from,
        to,
        rules,
        pre,
        post,
        begins,
        ends,
        optional,
    } = shape;
    let pre_in = pre.unwrap_or_else(epsilon);
    let post_in = post.unwrap_or_else(epsilon);

    // Input-side image of the full pattern, used by the negated branches
    let pattern_in = union(
        rules
            .iter()
            .map(|(input, _)| seq(pre_in.clone(), seq(input.clone(), post_in.clone())))
            .collect(),
    );

    // One application: copied pre-context, paired rewrite, copied
    // post-context
    let body = union(
        rules
            .into_iter()
            .map(|(input, output)| {
                correspond(seq(input, output), from.clone(), to.clone())
            })
            .collect(),
    );
    let rewrite = seq(
        matches(pre_in, from.clone(), to.clone()),
        seq(body, matches(post_in, from.clone(), to.clone())),
    );

    let mut from_tapes = BTreeSet::new();
    from_tapes.insert(from.clone());
    let copy_all = matches(dot_star(from.clone()), from.clone(), to.clone());

    let core = match (begins, ends) {
        // The pattern spans the whole tape or nothing does
        (true, true) => union(vec![
            rewrite,
            matches(not(pattern_in, from_tapes), from.clone(), to.clone()),
        ]),

        // The pattern starts the tape; whatever follows is copied through
        (true, false) => union(vec![
            seq(rewrite, copy_all.clone()),
            matches(
                not(seq(pattern_in, dot_star(from.clone())), from_tapes),
                from.clone(),
                to.clone(),
            ),
        ]),

        // The pattern ends the tape; whatever precedes is copied through
        (false, true) => union(vec![
            seq(copy_all.clone(), rewrite),
            matches(
                not(seq(dot_star(from.clone()), pattern_in), from_tapes),
                from.clone(),
                to.clone(),
            ),
        ]),

        // Unanchored: a run free of the pattern, then alternating
        // applications and further free runs
        (false, false) => {
            let contains = seq(
                dot_star(from.clone()),
                seq(pattern_in, dot_star(from.clone())),
            );
            let free = matches(
                not(contains, from_tapes),
                from.clone(),
                to.clone(),
            );
            seq(free.clone(), star(seq(rewrite, free)))
        }
    };

    if optional {
        union(vec![core, copy_all])
    } else {
        core
    }
}
