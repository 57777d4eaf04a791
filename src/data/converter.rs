// ============================================================
// Layer 4 — Sequence Array Converter
// ============================================================
// Converts four parallel columns (labels, notes, commands,
// values) into contiguous tensors:
//
//   categorical → Int tensor built from i32 data
//   value       → Float tensor built from f32 data
//
// All four tensors are allocated on the converter's device, which
// is always the device the model was moved to.

use burn::{prelude::*, tensor::TensorData};

use crate::domain::error::{LogModelError, LogModelResult};

// ─── TrainingExample ──────────────────────────────────────────────────────────
/// One timestep pooled over `width` chunks. Every tensor has
/// shape `[width]`.
#[derive(Debug, Clone)]
pub struct TrainingExample<B: Backend> {
    pub labels:   Tensor<B, 1, Int>,
    pub notes:    Tensor<B, 1, Int>,
    pub commands: Tensor<B, 1, Int>,
    pub values:   Tensor<B, 1>,
}

impl<B: Backend> TrainingExample<B> {
    /// Batch dimension: `chunk_num - 1` in training, 1 in evaluation.
    pub fn width(&self) -> usize {
        self.labels.dims()[0]
    }

    pub fn device(&self) -> B::Device {
        self.labels.device()
    }
}

// ─── SequenceArrayConverter ───────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct SequenceArrayConverter<B: Backend> {
    device: B::Device,
}

impl<B: Backend> SequenceArrayConverter<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }

    /// Build a TrainingExample from borrowed columns.
    ///
    /// The inputs are not modified. All four columns must have the
    /// same length, otherwise `MisalignedArrays` is returned before
    /// anything is allocated.
    pub fn convert(
        &self,
        labels:   &[u32],
        notes:    &[u32],
        commands: &[u32],
        values:   &[f32],
    ) -> LogModelResult<TrainingExample<B>> {
        let width = labels.len();
        check_aligned("notes",    notes.len(),    width)?;
        check_aligned("commands", commands.len(), width)?;
        check_aligned("values",   values.len(),   width)?;

        Ok(TrainingExample {
            labels:   self.int_array(labels),
            notes:    self.int_array(notes),
            commands: self.int_array(commands),
            values:   Tensor::from_data(TensorData::new(values.to_vec(), [width]), &self.device),
        })
    }

    fn int_array(&self, ids: &[u32]) -> Tensor<B, 1, Int> {
        // Cardinalities are validated by LogStore, so ids fit in i32
        let data: Vec<i32> = ids.iter().map(|&id| id as i32).collect();
        let len = data.len();
        Tensor::from_data(TensorData::new(data, [len]), &self.device)
    }
}

fn check_aligned(field: &'static str, found: usize, expected: usize) -> LogModelResult<()> {
    if found != expected {
        return Err(LogModelError::MisalignedArrays { field, expected, found });
    }
    Ok(())
}
