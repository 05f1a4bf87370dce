//! Criterion benchmarks for spikeval-core. See `benches/`.
