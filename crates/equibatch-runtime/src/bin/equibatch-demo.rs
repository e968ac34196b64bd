#![forbid(unsafe_code)]
#![cfg_attr(not(test), deny(clippy::expect_used, clippy::unwrap_used))]

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use tracing::{info, info_span, Instrument};

use equibatch_core::types::PackerConfig;
use equibatch_runtime::manifest::{parse_length_manifest_tsv, LengthTable};
use equibatch_runtime::packer::BatchPacker;
use equibatch_runtime::stream::spawn_batch_stream;

#[derive(Debug, Parser)]
#[command(name = "equibatch-demo")]
struct Args {
    /// Maximum samples per batch.
    #[arg(long, env = "EQUIBATCH_MAX_SIZE", default_value_t = 64)]
    max_size: usize,

    /// Maximum summed sample length per batch.
    #[arg(long, env = "EQUIBATCH_MAX_FOOTPRINT", default_value_t = 4096)]
    max_footprint: u64,

    /// Optional: read sample lengths from a TSV manifest instead of synthesizing them.
    ///
    /// Header `schema_version=0`, then `<sample_id>\t<length>` rows. Samples are packed in
    /// manifest order.
    #[arg(long, env = "EQUIBATCH_LENGTHS_MANIFEST")]
    lengths_manifest: Option<PathBuf>,

    #[arg(long, env = "EQUIBATCH_TOTAL_SAMPLES", default_value_t = 10_000)]
    total_samples: u64,

    #[arg(long, env = "EQUIBATCH_MAX_SAMPLE_LENGTH", default_value_t = 512)]
    max_sample_length: u64,

    #[arg(long, env = "EQUIBATCH_MAX_QUEUE_BATCHES", default_value_t = 16)]
    max_queue_batches: usize,
}

fn load_table(args: &Args) -> Result<LengthTable> {
    match &args.lengths_manifest {
        Some(path) => {
            let bytes = std::fs::read(path)?;
            let records = parse_length_manifest_tsv(&bytes)?;
            info!(
                path = %path.display(),
                samples = records.len() as u64,
                "loaded length manifest"
            );
            Ok(LengthTable::from_records(records))
        }
        None => LengthTable::synthetic(args.total_samples, args.max_sample_length),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    equibatch_observe::logging::init_tracing();
    let args = Args::parse();

    let span = info_span!(
        "equibatch-demo",
        max_size = args.max_size,
        max_footprint = args.max_footprint,
        lengths_manifest = ?args.lengths_manifest,
        max_queue_batches = args.max_queue_batches,
    );

    async move {
        let config = PackerConfig::new(args.max_size, args.max_footprint)?;
        let table = Arc::new(load_table(&args)?);

        let source = table.sample_ids().to_vec();
        let lookup = table.clone();
        let packer = BatchPacker::new(source, move |id: &u64| lookup.length_of(id), config)?;
        let metrics = packer.metrics();

        let start = Instant::now();
        info!(samples = table.len() as u64, "starting packer");

        let (mut rx, task) = spawn_batch_stream(packer, args.max_queue_batches);
        let mut out = std::io::BufWriter::new(std::io::stdout().lock());
        let mut batch_no: u64 = 0;
        while let Some(batch) = rx.recv().await {
            let ids = batch
                .indices()
                .iter()
                .map(u64::to_string)
                .collect::<Vec<_>>()
                .join(",");
            writeln!(out, "{batch_no}\t{}\t{ids}", batch.footprint())?;
            batch_no = batch_no.saturating_add(1);
        }
        out.flush()?;
        task.await??;

        info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            batches_total = metrics.batches_total.get(),
            samples_total = metrics.samples_total.get(),
            footprint_flushes_total = metrics.footprint_flushes_total.get(),
            size_flushes_total = metrics.size_flushes_total.get(),
            oversized_samples_total = metrics.oversized_samples_total.get(),
            largest_batch_samples = metrics.largest_batch_samples.get(),
            "packing complete"
        );

        Ok(())
    }
    .instrument(span)
    .await
}
