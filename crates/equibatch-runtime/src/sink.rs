use anyhow::{Context, Result};

use crate::types::Batch;

/// Delivery interface for packed batches.
///
/// Synchronous on purpose: a slow sink blocks the pull loop, so the packer never runs
/// ahead of the consumer by more than the batch it is currently building.
pub trait Sink<I, F = u64>: Send + Sync {
    fn deliver(&self, batch: Batch<I, F>) -> Result<()>;
}

/// Pulls every batch from `batches` and hands it to `sink`, in order.
///
/// Stops at the first length lookup failure or delivery error. Returns the number of
/// batches delivered.
pub fn drain_into_sink<B, I, F, E, K>(batches: B, sink: &K) -> Result<u64>
where
    B: IntoIterator<Item = std::result::Result<Batch<I, F>, E>>,
    F: Copy + std::fmt::Debug,
    E: std::error::Error + Send + Sync + 'static,
    K: Sink<I, F> + ?Sized,
{
    let mut delivered: u64 = 0;
    for batch in batches {
        let batch = batch.with_context(|| format!("packing batch {delivered}"))?;
        let sample_count = batch.len();
        let footprint = batch.footprint();
        sink.deliver(batch)
            .with_context(|| format!("delivering batch {delivered}"))?;
        delivered = delivered.saturating_add(1);
        tracing::debug!(
            target: "equibatch",
            event = "delivered",
            sample_count = sample_count,
            footprint = ?footprint,
            "delivered batch"
        );
    }
    Ok(delivered)
}
