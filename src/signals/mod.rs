// Signals: the three independent inputs to a verdict.
//
// lexical: phrase/caps/exclamation heuristic, no dependencies.
// tokens + classifier: adapters over the capability traits in `traits`.
// onnx: the local model implementations of those traits.

pub mod classifier;
pub mod download;
pub mod lexical;
pub mod onnx;
pub mod tokens;
pub mod traits;
