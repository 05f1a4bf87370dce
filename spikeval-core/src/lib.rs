/*!
Spike-sorting evaluation kernels: streamed template estimation, ground-truth
recording synthesis, and matching-based confusion scoring.
*/

pub mod error;
pub mod events;
pub mod geometry;
pub mod kernels;
pub mod signal;
pub mod stream;

pub use error::EvalError;
pub use events::SpikeEvent;
pub use geometry::Geometry;
pub use stream::{BatchSource, RecordingStream};
