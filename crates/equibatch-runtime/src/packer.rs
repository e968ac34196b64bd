use std::convert::Infallible;
use std::iter::FusedIterator;
use std::marker::PhantomData;
use std::sync::Arc;

use thiserror::Error;

use equibatch_core::types::{Footprint, PackerConfig, PackerConfigError};
use equibatch_observe::metrics::{Counter, Gauge};

use crate::types::Batch;

#[derive(Debug, Default)]
pub struct PackerMetrics {
    pub batches_total: Counter,
    pub samples_total: Counter,
    pub footprint_flushes_total: Counter,
    pub size_flushes_total: Counter,
    pub oversized_samples_total: Counter,
    pub largest_batch_samples: Gauge,
}

#[derive(Debug, Error)]
pub enum PackError<E> {
    #[error("invalid packer config: {0}")]
    InvalidConfig(#[from] PackerConfigError),
    #[error("length lookup failed")]
    Length(#[source] E),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Accumulating,
    Exhausted,
}

#[derive(Debug, Clone, Copy)]
enum FlushReason {
    Footprint,
    Size,
    EndOfInput,
}

impl FlushReason {
    fn as_str(self) -> &'static str {
        match self {
            FlushReason::Footprint => "footprint",
            FlushReason::Size => "size",
            FlushReason::EndOfInput => "end_of_input",
        }
    }
}

/// Greedy streaming packer that cuts an index stream into footprint-bounded batches.
///
/// Pulls one index at a time from `source`, asks `length_of` for its length and
/// flushes the in-progress batch before appending when either cap would be crossed:
///
/// - the running footprint plus the new length exceeds `max_footprint`, or
/// - the batch already holds `max_size` indices.
///
/// A flush only happens while the running footprint is positive. Leading
/// zero-length samples therefore never close a batch, and a first sample longer
/// than `max_footprint` is still accepted so packing always makes progress.
///
/// The final batch is yielded once the source ends, even when it is empty, so an
/// empty source yields exactly one empty batch. A length lookup error is yielded
/// as-is and ends the sequence; the partially built batch is discarded.
pub struct BatchPacker<S, L, F, E>
where
    S: Iterator,
{
    source: S,
    length_of: L,
    config: PackerConfig<F>,
    batch: Vec<S::Item>,
    footprint: F,
    state: State,
    metrics: Arc<PackerMetrics>,
    _error: PhantomData<fn() -> E>,
}

impl<S, L, F, E> BatchPacker<S, L, F, E>
where
    S: Iterator,
    L: FnMut(&S::Item) -> Result<F, E>,
    F: Footprint,
{
    /// Validates `config` before touching `source`.
    pub fn new<T>(
        source: T,
        length_of: L,
        config: PackerConfig<F>,
    ) -> Result<Self, PackerConfigError>
    where
        T: IntoIterator<IntoIter = S>,
    {
        config.validate()?;
        Ok(Self {
            source: source.into_iter(),
            length_of,
            config,
            batch: Vec::new(),
            footprint: F::ZERO,
            state: State::Accumulating,
            metrics: Arc::new(PackerMetrics::default()),
            _error: PhantomData,
        })
    }

    /// Records into `metrics` instead of a private set, e.g. to aggregate several runs.
    pub fn with_metrics(mut self, metrics: Arc<PackerMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn config(&self) -> PackerConfig<F> {
        self.config
    }

    pub fn metrics(&self) -> Arc<PackerMetrics> {
        self.metrics.clone()
    }

    fn seal(&mut self, reason: FlushReason, seed: F) -> Batch<S::Item, F> {
        let capacity = self.batch.len();
        let indices = std::mem::replace(&mut self.batch, Vec::with_capacity(capacity));
        let footprint = std::mem::replace(&mut self.footprint, seed);

        let sample_count = u64::try_from(indices.len()).unwrap_or(u64::MAX);
        self.metrics.batches_total.inc();
        self.metrics.samples_total.inc_by(sample_count);
        self.metrics.largest_batch_samples.max(sample_count);
        match reason {
            FlushReason::Footprint => self.metrics.footprint_flushes_total.inc(),
            FlushReason::Size => self.metrics.size_flushes_total.inc(),
            FlushReason::EndOfInput => {}
        }

        tracing::debug!(
            target: "equibatch",
            event = "flush",
            reason = reason.as_str(),
            sample_count = sample_count,
            footprint = ?footprint,
            "sealed batch"
        );

        Batch::sealed(indices, footprint)
    }
}

impl<S, L, F, E> Iterator for BatchPacker<S, L, F, E>
where
    S: Iterator,
    L: FnMut(&S::Item) -> Result<F, E>,
    F: Footprint,
{
    type Item = Result<Batch<S::Item, F>, E>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state == State::Exhausted {
            return None;
        }

        loop {
            let Some(index) = self.source.next() else {
                self.state = State::Exhausted;
                return Some(Ok(self.seal(FlushReason::EndOfInput, F::ZERO)));
            };

            let length = match (self.length_of)(&index) {
                Ok(length) => length,
                Err(err) => {
                    self.state = State::Exhausted;
                    self.batch.clear();
                    return Some(Err(err));
                }
            };

            if self.config.is_oversized(length) {
                self.metrics.oversized_samples_total.inc();
                tracing::warn!(
                    target: "equibatch",
                    length = ?length,
                    max_footprint = ?self.config.max_footprint,
                    "sample length alone exceeds max_footprint"
                );
            }

            let projected = self.footprint.checked_add(length);
            // Gate on the running footprint, not the batch length: a batch holding
            // only zero-length samples counts as empty.
            let nonempty = self.footprint > F::ZERO;
            // An overflowing sum is over any cap the type can hold.
            let over_footprint = match projected {
                Some(projected) => projected > self.config.max_footprint,
                None => true,
            };
            let over_size = self.batch.len() >= self.config.max_size;

            if nonempty && (over_footprint || over_size) {
                let reason = if over_footprint {
                    FlushReason::Footprint
                } else {
                    FlushReason::Size
                };
                let sealed = self.seal(reason, length);
                self.batch.push(index);
                return Some(Ok(sealed));
            }

            // Overflow implies a nonzero footprint and over_footprint, so it flushed above.
            self.footprint = projected.unwrap_or(length);
            self.batch.push(index);
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self.state {
            State::Exhausted => (0, Some(0)),
            State::Accumulating => {
                let (_, upper) = self.source.size_hint();
                (1, upper.map(|n| n.saturating_add(1)))
            }
        }
    }
}

impl<S, L, F, E> FusedIterator for BatchPacker<S, L, F, E>
where
    S: Iterator,
    L: FnMut(&S::Item) -> Result<F, E>,
    F: Footprint,
{
}

/// Builds a packer around a length function that cannot fail.
#[allow(clippy::type_complexity)]
pub fn infallible<T, G, F>(
    source: T,
    mut length_of: G,
    config: PackerConfig<F>,
) -> Result<
    BatchPacker<T::IntoIter, impl FnMut(&T::Item) -> Result<F, Infallible>, F, Infallible>,
    PackerConfigError,
>
where
    T: IntoIterator,
    G: FnMut(&T::Item) -> F,
    F: Footprint,
{
    BatchPacker::new(
        source,
        move |index: &T::Item| Ok::<F, Infallible>(length_of(index)),
        config,
    )
}

/// Drains a packer eagerly and returns the plain index batches.
pub fn pack<T, L, F, E>(
    source: T,
    length_of: L,
    config: PackerConfig<F>,
) -> Result<Vec<Vec<T::Item>>, PackError<E>>
where
    T: IntoIterator,
    L: FnMut(&T::Item) -> Result<F, E>,
    F: Footprint,
{
    BatchPacker::new(source, length_of, config)?
        .map(|batch| batch.map(Batch::into_indices).map_err(PackError::Length))
        .collect()
}
