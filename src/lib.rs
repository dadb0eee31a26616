//! # weft
//!
//! Generation engine for multi-tape linguistic grammars, built on
//! Brzozowski derivatives.
//!
//! A grammar denotes a set of records, each mapping tape names (`text`,
//! `gloss`, ...) to strings. The [`expr`] module holds the lazy,
//! self-simplifying expression algebra; [`engine`] runs the generation
//! work-list over scheduled expressions; [`bridge`] compiles resolved
//! grammar trees from the front end and exposes the [`Interpreter`]
//! facade.
//!
//! ```
//! use weft::{Grammar, GenConfig, Interpreter, Record};
//! use std::collections::BTreeMap;
//!
//! let root = Grammar::Seq(vec![
//!     Grammar::Lit { tape: "text".into(), text: "foo".into() },
//!     Grammar::Lit { tape: "gloss".into(), text: "jump".into() },
//! ]);
//! let interp = Interpreter::new(BTreeMap::new(), root, GenConfig::default());
//! let records = interp.generate_all(&Record::new(), None).unwrap();
//! assert_eq!(records[0].get("gloss"), Some("jump"));
//! ```

pub mod bridge;
pub mod config;
pub mod engine;
pub mod env;
pub mod error;
pub mod expr;
pub mod tape;
pub mod vocab;

pub use bridge::{Grammar, Interpreter, ReplaceRule};
pub use config::{GenConfig, MaxChars};
pub use engine::Gen;
pub use error::GenError;
pub use tape::{Query, Record};
pub use vocab::{Vocab, VocabMap};
