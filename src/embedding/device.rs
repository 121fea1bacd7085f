use candle_core::Device;
use tracing::warn;

#[cfg(any(feature = "metal", feature = "cuda"))]
use tracing::info;

#[cfg(not(any(feature = "metal", feature = "cuda")))]
use tracing::debug;

use super::error::EncodingError;

/// Picks the encoder's compute device from the enabled features, falling back to CPU.
pub fn select_device() -> Result<Device, EncodingError> {
    #[cfg(any(feature = "metal", feature = "cuda"))]
    let mut failures: Vec<String> = Vec::new();

    #[cfg(feature = "metal")]
    match Device::new_metal(0) {
        Ok(device) => {
            info!("Encoder using Metal GPU");
            return Ok(device);
        }
        Err(e) => {
            warn!(error = %e, "Metal device unavailable");
            failures.push(format!("metal: {e}"));
        }
    }

    #[cfg(feature = "cuda")]
    match Device::new_cuda(0) {
        Ok(device) => {
            info!("Encoder using CUDA GPU");
            return Ok(device);
        }
        Err(e) => {
            warn!(error = %e, "CUDA device unavailable");
            failures.push(format!("cuda: {e}"));
        }
    }

    #[cfg(any(feature = "metal", feature = "cuda"))]
    warn!(reason = %failures.join("; "), "Encoder falling back to CPU");

    #[cfg(not(any(feature = "metal", feature = "cuda")))]
    debug!("No GPU backend compiled, encoder running on CPU");

    Ok(Device::Cpu)
}
