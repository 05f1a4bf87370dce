use thiserror::Error;

/// Failures that abort a pass over a recording or a spike train.
///
/// Boundary violations and degenerate units are deliberately NOT represented
/// here: they are local conditions, tallied by the kernels that encounter
/// them and surfaced as summary counters or zero-defaults.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("geometry line {line}: expected two whitespace-separated coordinates")]
    MalformedGeometry { line: usize },

    #[error("probe sites collide at ({x}, {y}); coordinate lookup requires unique sites")]
    DuplicateSite { x: f64, y: f64 },

    #[error("recording exhausted at batch {batch}: wanted {expected} samples, read {found}")]
    EndOfStream {
        batch: usize,
        expected: usize,
        found: usize,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
