//! Execution context.
//!
//! The accelerator choice is made once and handed explicitly to everything
//! that allocates tensors.
use crate::error::Result;
use candle_core::utils::{cuda_is_available, metal_is_available};
use candle_core::Device;

#[derive(Debug, Clone)]
pub struct ExecutionContext {
    device: Device,
}

impl ExecutionContext {
    /// Picks CUDA, then Metal, then CPU. `cpu` forces host execution.
    pub fn new(cpu: bool) -> Result<Self> {
        let device = if cpu {
            Device::Cpu
        } else if cuda_is_available() {
            Device::new_cuda(0)?
        } else if metal_is_available() {
            Device::new_metal(0)?
        } else {
            #[cfg(all(target_os = "macos", target_arch = "aarch64"))]
            {
                tracing::info!(
                    "Running on CPU, to run on GPU(metal), build with `--features metal`"
                );
            }
            #[cfg(not(all(target_os = "macos", target_arch = "aarch64")))]
            {
                tracing::info!("Running on CPU, to run on GPU, build with `--features cuda`");
            }
            Device::Cpu
        };
        Ok(Self { device })
    }

    pub fn cpu() -> Self {
        Self { device: Device::Cpu }
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn is_accelerated(&self) -> bool {
        !self.device.is_cpu()
    }

    pub fn is_cuda(&self) -> bool {
        self.device.is_cuda()
    }
}
