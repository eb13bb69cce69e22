//! Backend used by the binaries: `ndarray` on the CPU, or `wgpu` with the `wgpu` feature.

#[cfg(not(feature = "wgpu"))]
mod selected {
    use burn::backend::ndarray::{NdArray, NdArrayDevice};

    pub type Backend = NdArray<f32>;

    pub fn device() -> NdArrayDevice {
        NdArrayDevice::Cpu
    }
}

#[cfg(feature = "wgpu")]
mod selected {
    use burn::backend::wgpu::{Wgpu, WgpuDevice};

    pub type Backend = Wgpu<f32, i32>;

    pub fn device() -> WgpuDevice {
        WgpuDevice::default()
    }
}

pub use selected::{device, Backend};

/// Backend with automatic differentiation, used for training.
pub type TrainingBackend = burn::backend::Autodiff<Backend>;
