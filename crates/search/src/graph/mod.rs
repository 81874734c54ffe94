//! Wikilink graph expansion
//!
//! Pulls locally connected notes into the candidate set by following
//! `[[Title]]` references outward from the seeds.

mod expander;

pub use expander::{Expansion, GraphExpander};
