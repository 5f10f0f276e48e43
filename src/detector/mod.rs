// Detector: verdict fusion plus the startup logic that picks its backend.

pub mod acquire;
pub mod artifact;
pub mod engine;
pub mod verdict;

pub use acquire::{acquire_backend, CapabilitySource, ModelDirSource};
pub use engine::{BackendOrigin, Detector, DetectorBackend, DetectorSettings};
pub use verdict::{Breakdown, Prediction, Verdict};
