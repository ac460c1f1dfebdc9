//! Core data model and pure logic of the codon completion engine: the
//! wire-facing completion types, the per-buffer keyword-class table, the
//! engine configuration, the recency map and the filter/rank pipeline.
//!
//! Nothing in this crate talks to an editor or spawns tasks; everything is
//! a pure function of its inputs so it can be tested exhaustively.

pub mod chars;
pub mod completion;
pub mod config;
pub mod recency;
pub mod resume;
pub mod score;

pub use chars::KeywordClass;
pub use completion::{CompleteOption, Documentation, InsertChange, Item};
pub use config::{AutoTrigger, Config, SortMethod};
pub use recency::Recency;
pub use resume::resume_input;
