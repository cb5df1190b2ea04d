// tonecheck: multi-strategy toxicity scoring for short-form text
//
// This is the library root. The engine module is the entry point; judges are
// the independent scoring backends it orchestrates.

pub mod batch;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod judges;
pub mod normalize;
pub mod output;
pub mod taxonomy;
