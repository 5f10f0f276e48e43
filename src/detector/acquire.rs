// Backend acquisition: runs once per process, before any request.
//
//   TryPersisted ──(no bundle / load failed)──> TryFreshConstruct ──> Ready
//        │                                                              ^
//        └──────────────────────(bundle loaded)──────────────────────────┘
//
// Nothing here returns an error to the caller. The weakest possible outcome
// is a lexical-only backend, which can always be built.

use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use super::artifact;
use super::engine::{BackendOrigin, DetectorBackend, DetectorSettings};
use crate::signals::download::{
    classifier_dir, tokenizer_dir, CLASSIFIER_CONFIG_FILE, CLASSIFIER_MODEL_FILE, TOKENIZER_FILE,
};
use crate::signals::onnx::{HfTokenizer, OnnxClassifier};
use crate::signals::traits::{TextClassifier, TextTokenizer};

/// Where fresh capabilities come from. Each one is acquired independently.
pub trait CapabilitySource {
    fn tokenizer(&self) -> Result<Arc<dyn TextTokenizer>>;
    fn classifier(&self) -> Result<Arc<dyn TextClassifier>>;
}

/// Loads capabilities from the `download-model` directory layout.
pub struct ModelDirSource {
    model_dir: PathBuf,
}

impl ModelDirSource {
    pub fn new(model_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_dir: model_dir.into(),
        }
    }
}

impl CapabilitySource for ModelDirSource {
    fn tokenizer(&self) -> Result<Arc<dyn TextTokenizer>> {
        let path = tokenizer_dir(&self.model_dir).join(TOKENIZER_FILE);
        let tokenizer = HfTokenizer::load(&path).context("Feature tokenizer unavailable")?;
        Ok(Arc::new(tokenizer))
    }

    fn classifier(&self) -> Result<Arc<dyn TextClassifier>> {
        let dir = classifier_dir(&self.model_dir);
        let classifier = OnnxClassifier::load(
            &dir.join(CLASSIFIER_MODEL_FILE),
            &dir.join(TOKENIZER_FILE),
            &dir.join(CLASSIFIER_CONFIG_FILE),
        )
        .context("Classifier unavailable")?;
        Ok(Arc::new(classifier))
    }
}

/// Acquisition states. `Ready` carries the chosen backend.
pub enum AcquisitionState {
    TryPersisted,
    TryFreshConstruct,
    Ready(DetectorBackend),
}

impl AcquisitionState {
    fn name(&self) -> &'static str {
        match self {
            AcquisitionState::TryPersisted => "try_persisted",
            AcquisitionState::TryFreshConstruct => "try_fresh_construct",
            AcquisitionState::Ready(_) => "ready",
        }
    }
}

/// Run the acquisition state machine to completion.
pub fn acquire_backend(
    artifact_dir: &Path,
    fresh: &dyn CapabilitySource,
    settings: &DetectorSettings,
) -> DetectorBackend {
    let mut state = AcquisitionState::TryPersisted;
    loop {
        info!(state = state.name(), "Backend acquisition");
        state = match state {
            AcquisitionState::TryPersisted => match try_persisted(artifact_dir, settings) {
                Some(backend) => AcquisitionState::Ready(backend),
                None => AcquisitionState::TryFreshConstruct,
            },
            AcquisitionState::TryFreshConstruct => {
                AcquisitionState::Ready(construct_fresh(fresh, settings))
            }
            AcquisitionState::Ready(backend) => {
                info!(backend = %backend.describe(), "Detector backend ready");
                return backend;
            }
        };
    }
}

/// Newest bundle in `artifact_dir`, if there is one and it loads.
fn try_persisted(artifact_dir: &Path, settings: &DetectorSettings) -> Option<DetectorBackend> {
    let Some(bundle) = artifact::find_latest_bundle(artifact_dir) else {
        info!(dir = %artifact_dir.display(), "No persisted bundle found");
        return None;
    };

    info!(bundle = %bundle.display(), "Found persisted bundle");
    match panic::catch_unwind(AssertUnwindSafe(|| artifact::load_bundle(&bundle, settings))) {
        Ok(Ok(backend)) => Some(backend),
        Ok(Err(e)) => {
            warn!(bundle = %bundle.display(), error = %format!("{e:#}"), "Persisted bundle failed to load");
            None
        }
        Err(_) => {
            warn!(bundle = %bundle.display(), "Persisted bundle loader panicked");
            None
        }
    }
}

/// Build a backend from `fresh`, tolerating the loss of either capability.
fn construct_fresh(fresh: &dyn CapabilitySource, settings: &DetectorSettings) -> DetectorBackend {
    let built = panic::catch_unwind(AssertUnwindSafe(|| {
        let tokenizer = match fresh.tokenizer() {
            Ok(t) => Some(t),
            Err(e) => {
                warn!(error = %format!("{e:#}"), "Continuing without token features");
                None
            }
        };
        let classifier = match fresh.classifier() {
            Ok(c) => Some(c),
            Err(e) => {
                warn!(error = %format!("{e:#}"), "Continuing without classifier signal");
                None
            }
        };
        DetectorBackend::new(tokenizer, classifier, settings.clone(), BackendOrigin::Fresh)
    }));

    built.unwrap_or_else(|_| {
        warn!("Fresh backend construction panicked, using lexical-only backend");
        DetectorBackend::lexical_only(settings.clone(), BackendOrigin::Fallback)
    })
}
