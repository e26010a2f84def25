use std::path::Path;

use anyhow::Context;
use ort::execution_providers::{CPUExecutionProvider, CUDAExecutionProvider};
use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use ort::session::Session;

/// Registers the execution provider and loads an onnx model into ort.
///
/// Asking for `cuda` may silently fall back to cpu when the provider
/// can't be initialized.
pub fn load_session(model: &Path, cuda: bool) -> anyhow::Result<Session> {
    let (ep, ep_name) = if cuda {
        (CUDAExecutionProvider::default().build(), "cuda")
    } else {
        (CPUExecutionProvider::default().build(), "cpu")
    };

    ort::init().with_execution_providers([ep]).commit()?;

    let session = SessionBuilder::new()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .commit_from_file(model)
        .with_context(|| format!("Failed to load model {model:?}"))?;
    log::debug!("{session:?}");

    log::info!("Prepared ort {ep_name} session with model: {model:?}");
    Ok(session)
}
