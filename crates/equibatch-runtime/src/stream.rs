use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::types::Batch;

/// Runs `batches` on a blocking thread and forwards each sealed batch over a bounded channel.
///
/// The channel holds at most `max_queue_batches` batches (minimum 1), so a slow receiver
/// stalls the packer instead of letting it run ahead. A length lookup failure ends the
/// stream and is returned from the join handle. Dropping the receiver stops the producer
/// after its current batch.
///
/// Must be called from within a tokio runtime.
pub fn spawn_batch_stream<B, I, F, E>(
    batches: B,
    max_queue_batches: usize,
) -> (mpsc::Receiver<Batch<I, F>>, JoinHandle<Result<()>>)
where
    B: IntoIterator<Item = std::result::Result<Batch<I, F>, E>> + Send + 'static,
    I: Send + 'static,
    F: Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    let (tx, rx) = mpsc::channel::<Batch<I, F>>(max_queue_batches.max(1));
    let task = tokio::task::spawn_blocking(move || {
        let mut sent: u64 = 0;
        for batch in batches {
            let batch = batch.with_context(|| format!("packing batch {sent}"))?;
            if tx.blocking_send(batch).is_err() {
                tracing::debug!(
                    target: "equibatch",
                    event = "receiver_dropped",
                    sent_batches = sent,
                    "batch receiver dropped; stopping producer"
                );
                return Ok(());
            }
            sent = sent.saturating_add(1);
        }
        Ok::<(), anyhow::Error>(())
    });
    (rx, task)
}
