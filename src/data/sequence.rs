// ============================================================
// Layer 4 — Chunk Sequences
// ============================================================
// Two ways of walking a LogStore one timestep at a time:
//
//   training(held_out)  step j pools event j of every chunk
//                       except `held_out`, in chunk order.
//                       Batch width = chunk_num - 1.
//
//   evaluation(target)  step j is event j of `target` alone.
//                       Batch width = 1.
//
// Example with chunk_num = 3, held_out = 1:
//   step 0 → [chunk0[0], chunk2[0]]
//   step 1 → [chunk0[1], chunk2[1]]
//   ...
//
// The held-out chunk never contributes a training example, so
// evaluating on it afterwards measures generalisation.
//
// Both sequences are lazy and yield exactly chunk_size items; a
// fresh one is built for every epoch.

use burn::prelude::*;

use crate::data::converter::{SequenceArrayConverter, TrainingExample};
use crate::domain::error::{LogModelError, LogModelResult};
use crate::domain::log_store::LogStore;

// ─── ChunkSequence ────────────────────────────────────────────────────────────
pub struct ChunkSequence<'a, B: Backend> {
    store:     &'a LogStore,
    chunks:    Vec<usize>,
    converter: SequenceArrayConverter<B>,
    step:      usize,
}

impl<'a, B: Backend> ChunkSequence<'a, B> {
    /// Leave-one-out training sequence for `held_out`.
    pub fn training(store: &'a LogStore, held_out: usize, device: B::Device) -> LogModelResult<Self> {
        store.check_chunk(held_out)?;
        if store.chunk_num() < 2 {
            return Err(LogModelError::TooFewChunks { chunk_num: store.chunk_num() });
        }
        let chunks = (0..store.chunk_num()).filter(|&k| k != held_out).collect();
        Ok(Self::over(store, chunks, device))
    }

    /// Single-chunk evaluation sequence for `target`.
    pub fn evaluation(store: &'a LogStore, target: usize, device: B::Device) -> LogModelResult<Self> {
        store.check_chunk(target)?;
        Ok(Self::over(store, vec![target], device))
    }

    fn over(store: &'a LogStore, chunks: Vec<usize>, device: B::Device) -> Self {
        Self {
            store,
            chunks,
            converter: SequenceArrayConverter::new(device),
            step: 0,
        }
    }

    /// Chunks pooled at every step, in batch order.
    pub fn source_chunks(&self) -> &[usize] {
        &self.chunks
    }

    fn gather(&self, step: usize) -> LogModelResult<TrainingExample<B>> {
        let width        = self.chunks.len();
        let mut labels   = Vec::with_capacity(width);
        let mut notes    = Vec::with_capacity(width);
        let mut commands = Vec::with_capacity(width);
        let mut values   = Vec::with_capacity(width);

        for &k in &self.chunks {
            let chunk = self.store.chunk(k)?;
            labels.push(chunk.labels[step]);
            notes.push(chunk.notes[step]);
            commands.push(chunk.commands[step]);
            values.push(chunk.values[step]);
        }

        self.converter.convert(&labels, &notes, &commands, &values)
    }
}

impl<B: Backend> Iterator for ChunkSequence<'_, B> {
    type Item = LogModelResult<TrainingExample<B>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.step >= self.store.chunk_size() {
            return None;
        }
        let example = self.gather(self.step);
        self.step += 1;
        Some(example)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.store.chunk_size() - self.step;
        (remaining, Some(remaining))
    }
}

impl<B: Backend> ExactSizeIterator for ChunkSequence<'_, B> {}

// ─── AdjacentPairs ────────────────────────────────────────────────────────────
/// Pairs every item with its successor: for items
/// `[x0, x1, x2, x3]` yields `(x0,x1), (x1,x2), (x2,x3)`.
/// An error from the inner sequence is passed through as-is.
pub struct AdjacentPairs<I, T> {
    inner: I,
    prev:  Option<T>,
}

pub fn adjacent_pairs<I, T>(inner: I) -> AdjacentPairs<I, T>
where
    I: Iterator<Item = LogModelResult<T>>,
    T: Clone,
{
    AdjacentPairs { inner, prev: None }
}

impl<I, T> Iterator for AdjacentPairs<I, T>
where
    I: Iterator<Item = LogModelResult<T>>,
    T: Clone,
{
    type Item = LogModelResult<(T, T)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.prev.is_none() {
            match self.inner.next()? {
                Ok(first) => self.prev = Some(first),
                Err(e)    => return Some(Err(e)),
            }
        }
        let next = match self.inner.next()? {
            Ok(next) => next,
            Err(e)   => return Some(Err(e)),
        };
        let current = self.prev.replace(next.clone())?;
        Some(Ok((current, next)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let (lo, hi) = self.inner.size_hint();
        let adjust   = |n: usize| if self.prev.is_some() { n } else { n.saturating_sub(1) };
        (adjust(lo), hi.map(adjust))
    }
}

impl<I, T> ExactSizeIterator for AdjacentPairs<I, T>
where
    I: ExactSizeIterator<Item = LogModelResult<T>>,
    T: Clone,
{
}

// ─── BpttWindows ──────────────────────────────────────────────────────────────
/// Splits a pair stream into consecutive windows of `len` pairs;
/// the last window may be shorter. Empty windows are never
/// produced.
pub struct BpttWindows<I> {
    pairs: I,
    len:   usize,
}

impl<I> BpttWindows<I> {
    pub fn new(pairs: I, len: usize) -> LogModelResult<Self> {
        if len == 0 {
            return Err(LogModelError::EmptyWindow);
        }
        Ok(Self { pairs, len })
    }

    /// Windows needed to cover `pair_count` pairs.
    pub fn count_for(pair_count: usize, len: usize) -> usize {
        pair_count.div_ceil(len)
    }
}

impl<I, T> Iterator for BpttWindows<I>
where
    I: Iterator<Item = LogModelResult<T>>,
{
    type Item = LogModelResult<Vec<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        let window: LogModelResult<Vec<T>> = self.pairs.by_ref().take(self.len).collect();
        match window {
            Ok(w) if w.is_empty() => None,
            other                 => Some(other),
        }
    }
}
