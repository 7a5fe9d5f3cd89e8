//! Compute device resolution for ONNX Runtime sessions.

use std::fmt;

use cadence_settings::DevicePreference;
use ort::session::Session;
use ort::session::builder::SessionBuilder;
use serde::Serialize;
use tracing::{debug, info};

use crate::errors::{LoadError, ResultExt};

/// The device the extractor actually runs on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComputeDevice {
    /// ONNX Runtime's default CPU provider.
    Cpu,
    /// The CUDA execution provider.
    Cuda,
}

impl fmt::Display for ComputeDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Cpu => "cpu",
            Self::Cuda => "cuda",
        })
    }
}

/// Pick the device for `preference`.
///
/// `Auto` falls back to CPU; an explicit `Cuda` request fails when CUDA is
/// missing.
pub fn resolve_device(preference: DevicePreference) -> Result<ComputeDevice, LoadError> {
    let device = match preference {
        DevicePreference::Cpu => ComputeDevice::Cpu,
        DevicePreference::Auto => {
            if cuda_available() {
                ComputeDevice::Cuda
            } else {
                ComputeDevice::Cpu
            }
        }
        DevicePreference::Cuda => {
            if !cfg!(feature = "cuda") {
                return Err(LoadError::DeviceUnavailable(
                    "CUDA requested but this build has no `cuda` feature".into(),
                ));
            }
            if !cuda_available() {
                return Err(LoadError::DeviceUnavailable(
                    "CUDA requested but the execution provider is not available".into(),
                ));
            }
            ComputeDevice::Cuda
        }
    };
    info!(%preference, %device, "resolved compute device");
    Ok(device)
}

#[cfg(feature = "cuda")]
fn cuda_available() -> bool {
    use ort::execution_providers::{CUDAExecutionProvider, ExecutionProvider};

    match CUDAExecutionProvider::default().is_available() {
        Ok(available) => available,
        Err(e) => {
            debug!(error = %e, "CUDA availability check failed");
            false
        }
    }
}

#[cfg(not(feature = "cuda"))]
fn cuda_available() -> bool {
    debug!("built without CUDA support");
    false
}

/// A session builder configured for `device` with `intra_threads` workers.
pub(crate) fn session_builder(
    device: ComputeDevice,
    intra_threads: usize,
) -> Result<SessionBuilder, LoadError> {
    let builder = Session::builder()
        .extractor("session builder")?
        .with_intra_threads(intra_threads.max(1))
        .extractor("set threads")?;

    match device {
        ComputeDevice::Cpu => Ok(builder),
        ComputeDevice::Cuda => with_cuda(builder),
    }
}

#[cfg(feature = "cuda")]
fn with_cuda(builder: SessionBuilder) -> Result<SessionBuilder, LoadError> {
    use ort::execution_providers::CUDAExecutionProvider;

    builder
        .with_execution_providers([CUDAExecutionProvider::default().build().error_on_failure()])
        .map_err(|e| LoadError::DeviceUnavailable(format!("register CUDA provider: {e}")))
}

#[cfg(not(feature = "cuda"))]
fn with_cuda(_builder: SessionBuilder) -> Result<SessionBuilder, LoadError> {
    Err(LoadError::DeviceUnavailable(
        "CUDA provider is not compiled in".into(),
    ))
}
