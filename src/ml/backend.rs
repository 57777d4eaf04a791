// ============================================================
// Layer 5 — Backend Selection
// ============================================================
// Maps a DeviceSelector onto a concrete burn backend and device:
//
//   -1     → Autodiff<NdArray>  on NdArrayDevice::Cpu
//   n >= 0 → Autodiff<Wgpu>     on WgpuDevice::DiscreteGpu(n)
//
// The choice is made once per run. Code that needs the backend
// implements BackendTask, whose generic `run` is monomorphised
// for whichever backend the selector picks.

use burn::{
    backend::{
        ndarray::NdArrayDevice,
        wgpu::WgpuDevice,
        Autodiff, NdArray, Wgpu,
    },
    tensor::backend::AutodiffBackend,
};

use crate::domain::device::DeviceSelector;

pub type CpuBackend         = Autodiff<NdArray<f32>>;
pub type AcceleratorBackend = Autodiff<Wgpu>;

/// Work that can run on any autodiff backend.
pub trait BackendTask {
    type Output;

    fn run<B: AutodiffBackend>(self, device: B::Device) -> Self::Output;
}

/// Run `task` on the backend and device picked by `selector`.
pub fn with_backend<T: BackendTask>(selector: DeviceSelector, task: T) -> T::Output {
    match selector.accelerator() {
        None => {
            tracing::debug!("Using CPU (ndarray) backend");
            task.run::<CpuBackend>(NdArrayDevice::Cpu)
        }
        Some(index) => {
            tracing::info!("Use accelerator {}", index);
            task.run::<AcceleratorBackend>(WgpuDevice::DiscreteGpu(index))
        }
    }
}
