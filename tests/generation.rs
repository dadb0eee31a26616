//! End-to-end generation tests over the interpreter facade
//!
//! These exercise the documented behaviors of query-constrained
//! generation: result cardinality under each kind of constraint, join
//! factorization, match tape equality, budget truncation, and the
//! committed-tape invariant.

use std::collections::BTreeMap;
use weft::{GenConfig, Grammar, Interpreter, MaxChars, Record};

fn lit(tape: &str, text: &str) -> Grammar {
    Grammar::Lit {
        tape: tape.to_string(),
        text: text.to_string(),
    }
}

/// Two lexical rules with distinct surfaces on both tapes.
fn two_rule_grammar() -> Grammar {
    Grammar::Alt(vec![
        Grammar::Seq(vec![
            lit("text", "foo"),
            lit("text", "bar"),
            lit("gloss", "jump"),
            lit("gloss", "-1SG"),
        ]),
        Grammar::Seq(vec![
            lit("text", "swim"),
            lit("gloss", "run"),
            lit("gloss", "-3PL"),
        ]),
    ])
}

fn interp(root: Grammar) -> Interpreter {
    Interpreter::new(BTreeMap::new(), root, GenConfig::default())
}

#[test]
fn test_text_query_resolves_to_one_record() {
    let records = interp(two_rule_grammar())
        .generate_all(&Record::with("text", "foobar"), None)
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].get("text"), Some("foobar"));
    assert_eq!(records[0].get("gloss"), Some("jump-1SG"));
}

#[test]
fn test_gloss_query_resolves_to_one_record() {
    let records = interp(two_rule_grammar())
        .generate_all(&Record::with("gloss", "jump-1SG"), None)
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].get("text"), Some("foobar"));
}

#[test]
fn test_unknown_text_yields_no_records() {
    let records = interp(two_rule_grammar())
        .generate_all(&Record::with("text", "moobar"), None)
        .unwrap();
    assert!(records.is_empty());
}

#[test]
fn test_unconstrained_query_yields_one_record_per_rule() {
    let records = interp(two_rule_grammar())
        .generate_all(&Record::new(), None)
        .unwrap();
    assert_eq!(records.len(), 2);
}

#[test]
fn test_ambiguous_parses_of_one_surface_merge() {
    // Both rules spell the same text; a query for it must still produce
    // one record per distinct (text, gloss) pair, not per parse
    let g = Grammar::Alt(vec![
        Grammar::Seq(vec![lit("text", "ab"), lit("gloss", "X")]),
        Grammar::Seq(vec![lit("text", "a"), lit("text", "b"), lit("gloss", "X")]),
    ]);
    let records = interp(g)
        .generate_all(&Record::with("text", "ab"), None)
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].get("gloss"), Some("X"));
}

#[test]
fn test_disjoint_tape_join_is_a_cross_product() {
    let a = Grammar::Alt(vec![lit("a", "x"), lit("a", "y")]);
    let b = Grammar::Alt(vec![lit("b", "u"), lit("b", "v")]);
    let records = interp(Grammar::Join(Box::new(a), Box::new(b)))
        .generate_all(&Record::new(), None)
        .unwrap();
    assert_eq!(records.len(), 4);
    let mut pairs: Vec<(String, String)> = records
        .iter()
        .map(|r| {
            (
                r.get("a").unwrap_or("").to_string(),
                r.get("b").unwrap_or("").to_string(),
            )
        })
        .collect();
    pairs.sort();
    assert_eq!(
        pairs,
        vec![
            ("x".to_string(), "u".to_string()),
            ("x".to_string(), "v".to_string()),
            ("y".to_string(), "u".to_string()),
            ("y".to_string(), "v".to_string()),
        ]
    );
}

#[test]
fn test_match_forces_tape_equality() {
    let g = Grammar::Match {
        inner: Box::new(Grammar::Alt(vec![lit("t1", "ab"), lit("t1", "cd")])),
        from: "t1".to_string(),
        to: "t2".to_string(),
    };
    let records = interp(g).generate_all(&Record::new(), None).unwrap();
    assert_eq!(records.len(), 2);
    for record in &records {
        assert_eq!(record.get("t1"), record.get("t2"));
    }
}

#[test]
fn test_recursion_without_a_base_case_is_the_empty_language() {
    // X = "a" X never terminates; bounded unfolding truncates it to
    // nothing, silently
    let mut defs = BTreeMap::new();
    defs.insert(
        "X".to_string(),
        Grammar::Seq(vec![
            lit("t", "a"),
            Grammar::Embed {
                name: "X".to_string(),
            },
        ]),
    );
    let interp = Interpreter::new(
        defs,
        Grammar::Embed {
            name: "X".to_string(),
        },
        GenConfig::default(),
    );
    let records = interp.generate_all(&Record::new(), None).unwrap();
    assert!(records.is_empty());
}

#[test]
fn test_recursion_with_a_base_case_is_truncated_at_the_budget() {
    // X = "a" X | "b"
    let mut defs = BTreeMap::new();
    defs.insert(
        "X".to_string(),
        Grammar::Alt(vec![
            Grammar::Seq(vec![
                lit("t", "a"),
                Grammar::Embed {
                    name: "X".to_string(),
                },
            ]),
            lit("t", "b"),
        ]),
    );
    let config = GenConfig {
        max_recursion: 3,
        ..GenConfig::default()
    };
    let interp = Interpreter::new(
        defs,
        Grammar::Embed {
            name: "X".to_string(),
        },
        config,
    );
    let records = interp.generate_all(&Record::new(), None).unwrap();
    assert!(!records.is_empty());
    let mut texts: Vec<String> = records
        .iter()
        .map(|r| r.get("t").unwrap_or("").to_string())
        .collect();
    texts.sort();
    assert!(texts.contains(&"b".to_string()));
    assert!(texts.contains(&"ab".to_string()));
    for text in &texts {
        assert!(text.ends_with('b'));
        assert!(text.trim_end_matches('b').chars().all(|c| c == 'a'));
        assert!(text.len() <= 5, "budget failed to bound {:?}", text);
    }
}

#[test]
fn test_undefined_reference_behaves_as_the_empty_string() {
    let g = Grammar::Seq(vec![
        lit("t", "x"),
        Grammar::Embed {
            name: "no-such-symbol".to_string(),
        },
    ]);
    let records = interp(g).generate_all(&Record::new(), None).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].get("t"), Some("x"));
}

#[test]
fn test_sampling_one_from_an_unbounded_grammar_terminates() {
    // ("a")* is infinite; the character ceiling makes sampling finite
    let g = Grammar::Repeat {
        inner: Box::new(lit("t", "a")),
        min: 0,
        max: None,
    };
    let config = GenConfig {
        max_chars: MaxChars::All(5),
        seed: Some(7),
        ..GenConfig::default()
    };
    let interp = Interpreter::new(BTreeMap::new(), g, config);
    let records = interp.sample(&Record::new(), 1).unwrap();
    assert_eq!(records.len(), 1);
    let text = records[0].get("t").unwrap_or("");
    assert!(text.len() <= 5);
    assert!(text.chars().all(|c| c == 'a'));
}

#[test]
fn test_seeded_sampling_is_reproducible() {
    let config = GenConfig {
        seed: Some(1234),
        ..GenConfig::default()
    };
    let a = Interpreter::new(BTreeMap::new(), two_rule_grammar(), config.clone())
        .sample(&Record::new(), 1)
        .unwrap();
    let b = Interpreter::new(BTreeMap::new(), two_rule_grammar(), config)
        .sample(&Record::new(), 1)
        .unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_hidden_tapes_stay_out_of_records() {
    let g = Grammar::Hide {
        inner: Box::new(Grammar::Seq(vec![lit("t", "x"), lit("secret", "s")])),
        tape: "secret".to_string(),
    };
    let records = interp(g).generate_all(&Record::new(), None).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].get("t"), Some("x"));
    assert_eq!(records[0].get("secret"), None);
    assert_eq!(records[0].0.len(), 1);
}

#[test]
fn test_rename_exposes_the_external_name() {
    let g = Grammar::Rename {
        inner: Box::new(lit("inner", "x")),
        ext: "outer".to_string(),
        int: "inner".to_string(),
    };
    let records = interp(g).generate_all(&Record::new(), None).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].get("outer"), Some("x"));
    assert_eq!(records[0].get("inner"), None);
}

#[test]
fn test_short_stops_at_the_first_complete_alternative() {
    let g = Grammar::Short(Box::new(Grammar::Alt(vec![
        lit("t", "a"),
        lit("t", "ab"),
    ])));
    let records = interp(g).generate_all(&Record::new(), None).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].get("t"), Some("a"));
}

#[test]
fn test_generate_is_lazy() {
    // Pulling one record from a large space must not materialize it all
    let g = Grammar::Repeat {
        inner: Box::new(Grammar::Alt(vec![lit("t", "a"), lit("t", "b")])),
        min: 0,
        max: Some(20),
    };
    let interp = interp(g);
    let mut gen = interp.generate(&Record::new());
    let first = gen.next().unwrap().unwrap();
    assert!(first.get("t").is_some());
}

mod invariants {
    //! The committed-tape invariant, checked at the expression layer
    //! where it is enforced.

    use weft::expr::{done_tape, lit, pre_tape};
    use weft::vocab::graphemes;
    use weft::{GenConfig, GenError, Query};

    #[test]
    fn test_finalized_tape_rejects_further_queries() {
        let env = weft::env::Env::new(&GenConfig::default());
        let e = done_tape("t", "out".to_string(), lit("u", graphemes("a")));
        let result: Vec<_> = e.deriv(&Query::any("t"), &env).collect();
        assert!(matches!(
            result[0],
            Err(GenError::FinalizedTapeQueried { .. })
        ));
        assert!(matches!(
            e.delta("t", &env),
            Err(GenError::FinalizedTapeQueried { .. })
        ));
    }

    #[test]
    fn test_buffered_tape_rejects_external_queries() {
        let env = weft::env::Env::new(&GenConfig::default());
        let e = pre_tape(lit("x", graphemes("ab")), "x", "y");
        assert!(matches!(
            e.delta("x", &env),
            Err(GenError::HiddenTapeQueried { .. })
        ));
    }
}

mod properties {
    //! Property tests over randomly drawn lexica.

    use super::*;
    use proptest::prelude::*;

    fn surface() -> impl Strategy<Value = String> {
        "[a-e]{1,4}"
    }

    proptest! {
        /// Every unit of every generated string belongs to the tape's
        /// declared vocabulary.
        #[test]
        fn generated_tokens_stay_in_vocabulary(
            t1 in surface(), t2 in surface(),
            g1 in surface(), g2 in surface(),
        ) {
            let grammar = Grammar::Alt(vec![
                Grammar::Seq(vec![lit("text", &t1), lit("gloss", &g1)]),
                Grammar::Seq(vec![lit("text", &t2), lit("gloss", &g2)]),
            ]);
            let interp = interp(grammar);
            let records = interp.generate_all(&Record::new(), None).unwrap();
            prop_assert!(!records.is_empty());
            for record in &records {
                for tape in ["text", "gloss"] {
                    let vocab = interp.vocab(tape).unwrap();
                    for unit in vocab.tokenize(record.get(tape).unwrap_or("")) {
                        prop_assert!(vocab.contains(&unit));
                    }
                }
            }
        }

        /// A query for a string the grammar generates always finds it.
        #[test]
        fn generated_strings_are_queryable(t in surface(), g in surface()) {
            let grammar = Grammar::Seq(vec![lit("text", &t), lit("gloss", &g)]);
            let interp = interp(grammar);
            let records = interp
                .generate_all(&Record::with("text", t.as_str()), None)
                .unwrap();
            prop_assert_eq!(records.len(), 1);
            prop_assert_eq!(records[0].get("gloss"), Some(g.as_str()));
        }
    }
}
