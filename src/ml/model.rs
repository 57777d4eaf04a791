// ============================================================
// Layer 5 — LogLstm
// ============================================================
// Recurrent next-event predictor over categorical log events.
//
//   label ──► Embedding ─┐
//   note ───► Embedding ─┤
//   command ► Embedding ─┼─► concat [w, 1, 4·n_units] ─► LSTM ─► h [w, n_units]
//   value ──► Linear ────┘                                     │
//                                       ┌──────────────────────┼──────────────────────┐
//                                       ▼                      ▼                      ▼
//                                 label head             note head             command head
//
// Each step consumes event t and scores event t+1. The step loss
// is the summed cross-entropy of the three heads, expressed in
// bits, so 2^loss is a perplexity and the per-event loss is the
// event's outlier factor.
//
// The LSTM's (cell, hidden) pair lives in RecurrentState next to
// the module: optimiser steps replace the module value, the state
// carries on across windows until it is reset.

use std::f64::consts::LN_2;

use burn::{
    nn::{
        loss::CrossEntropyLossConfig,
        Embedding, EmbeddingConfig,
        Linear, LinearConfig,
        Lstm, LstmConfig, LstmState,
    },
    prelude::*,
};

use crate::data::converter::TrainingExample;

#[derive(Config, Debug)]
pub struct LogLstmConfig {
    pub label_num:   usize,
    pub note_num:    usize,
    pub command_num: usize,
    pub n_units:     usize,
}

impl LogLstmConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> LogLstm<B> {
        let n = self.n_units;
        LogLstm {
            label_embedding:   EmbeddingConfig::new(self.label_num, n).init(device),
            note_embedding:    EmbeddingConfig::new(self.note_num, n).init(device),
            command_embedding: EmbeddingConfig::new(self.command_num, n).init(device),
            value_proj:        LinearConfig::new(1, n).init(device),
            lstm:              LstmConfig::new(4 * n, n, true).init(device),
            label_head:        LinearConfig::new(n, self.label_num).init(device),
            note_head:         LinearConfig::new(n, self.note_num).init(device),
            command_head:      LinearConfig::new(n, self.command_num).init(device),
        }
    }
}

#[derive(Module, Debug)]
pub struct LogLstm<B: Backend> {
    pub label_embedding:   Embedding<B>,
    pub note_embedding:    Embedding<B>,
    pub command_embedding: Embedding<B>,
    pub value_proj:        Linear<B>,
    pub lstm:              Lstm<B>,
    pub label_head:        Linear<B>,
    pub note_head:         Linear<B>,
    pub command_head:      Linear<B>,
}

impl<B: Backend> LogLstm<B> {
    /// Advance the recurrence by one event. Returns the hidden
    /// output, shape `[width, n_units]`.
    pub fn step(&self, current: &TrainingExample<B>, state: &mut RecurrentState<B>) -> Tensor<B, 2> {
        let width = current.width();

        let labels   = self.label_embedding.forward(current.labels.clone().reshape([width, 1]));
        let notes    = self.note_embedding.forward(current.notes.clone().reshape([width, 1]));
        let commands = self.command_embedding.forward(current.commands.clone().reshape([width, 1]));
        let values   = self.value_proj.forward(current.values.clone().reshape([width, 1, 1]));

        let input = Tensor::cat(vec![labels, notes, commands, values], 2);
        let (output, next_state) = self.lstm.forward(input, state.take());
        state.set(next_state);

        let [_, _, n_units] = output.dims();
        output.reshape([width, n_units])
    }

    /// Loss in bits of predicting `next` from the hidden output.
    /// Each head's cross-entropy is averaged over the batch width.
    pub fn prediction_loss(&self, hidden: Tensor<B, 2>, next: &TrainingExample<B>) -> Tensor<B, 1> {
        let ce = CrossEntropyLossConfig::new().init(&hidden.device());

        let label   = ce.forward(self.label_head.forward(hidden.clone()), next.labels.clone());
        let note    = ce.forward(self.note_head.forward(hidden.clone()), next.notes.clone());
        let command = ce.forward(self.command_head.forward(hidden), next.commands.clone());

        (label + note + command).div_scalar(LN_2)
    }

    /// Summed loss over one truncated-BPTT window of (current, next)
    /// pairs. The state is advanced through the whole window.
    pub fn window_loss(
        &self,
        window: &[(TrainingExample<B>, TrainingExample<B>)],
        state:  &mut RecurrentState<B>,
    ) -> Tensor<B, 1> {
        window
            .iter()
            .map(|(current, next)| {
                let hidden = self.step(current, state);
                self.prediction_loss(hidden, next)
            })
            .reduce(|acc, loss| acc + loss)
            .unwrap_or_else(|| Tensor::zeros([1], &self.value_proj.weight.device()))
    }

    /// Per-event loss of `next` given `current`, as a plain number.
    /// Called on the inner (non-autodiff) backend during evaluation.
    pub fn eval_step(
        &self,
        current: &TrainingExample<B>,
        next:    &TrainingExample<B>,
        state:   &mut RecurrentState<B>,
    ) -> f64 {
        let hidden = self.step(current, state);
        self.prediction_loss(hidden, next).into_scalar().elem::<f64>()
    }
}

// ─── RecurrentState ───────────────────────────────────────────────────────────
/// The LSTM's carried (cell, hidden) pair. `None` means a fresh
/// recurrent context.
pub struct RecurrentState<B: Backend> {
    inner: Option<LstmState<B, 2>>,
}

impl<B: Backend> RecurrentState<B> {
    pub fn new() -> Self {
        Self { inner: None }
    }

    fn take(&mut self) -> Option<LstmState<B, 2>> {
        self.inner.take()
    }

    fn set(&mut self, state: LstmState<B, 2>) {
        self.inner = Some(state);
    }

    /// Cut the state out of the autodiff graph. The values carry
    /// forward unchanged; gradients stop at this point.
    pub fn detach(&mut self) {
        if let Some(state) = self.inner.take() {
            self.inner = Some(LstmState::new(state.cell.detach(), state.hidden.detach()));
        }
    }
}

impl<B: Backend> Default for RecurrentState<B> {
    fn default() -> Self {
        Self::new()
    }
}
