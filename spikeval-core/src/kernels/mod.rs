pub mod inject;
pub mod matching;
pub mod relabel;
pub mod relocate;
pub mod score;
pub mod stat_summary;
pub mod synth;
pub mod template;
