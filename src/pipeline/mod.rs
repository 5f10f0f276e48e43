// Pipelines that analyze many inputs in one run.

pub mod batch;
