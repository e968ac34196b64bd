use std::sync::Arc;

use equibatch_core::types::PackerConfig;
use equibatch_runtime::manifest::{LengthLookupError, LengthTable};
use equibatch_runtime::packer::{infallible, BatchPacker};
use equibatch_runtime::stream::spawn_batch_stream;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stream_forwards_batches_in_order() {
    let table = Arc::new(LengthTable::synthetic(2_000, 64).unwrap());
    let config = PackerConfig::new(32, 512u64).unwrap();

    let expected: Vec<Vec<u64>> = {
        let t = table.clone();
        BatchPacker::new(t.sample_ids().to_vec(), |id: &u64| t.length_of(id), config)
            .unwrap()
            .map(|b| b.unwrap().into_indices())
            .collect()
    };

    let lookup = table.clone();
    let packer = BatchPacker::new(
        table.sample_ids().to_vec(),
        move |id: &u64| lookup.length_of(id),
        config,
    )
    .unwrap();
    let metrics = packer.metrics();

    let (mut rx, task) = spawn_batch_stream(packer, 2);
    let mut got = Vec::new();
    while let Some(batch) = rx.recv().await {
        assert!(batch.footprint() <= 512 || batch.len() == 1);
        got.push(batch.into_indices());
    }
    task.await.unwrap().unwrap();

    assert_eq!(got, expected);
    assert_eq!(metrics.batches_total.get(), expected.len() as u64);
    assert_eq!(metrics.samples_total.get(), 2_000);
}

#[tokio::test]
async fn stream_surfaces_length_failure_through_join_handle() {
    let table = Arc::new(LengthTable::synthetic(4, 8).unwrap());
    let lookup = table.clone();
    let packer = BatchPacker::new(
        vec![0u64, 1, 99, 2],
        move |id: &u64| lookup.length_of(id),
        PackerConfig::new(1, 100u64).unwrap(),
    )
    .unwrap();

    let (mut rx, task) = spawn_batch_stream(packer, 4);
    let mut got = Vec::new();
    while let Some(batch) = rx.recv().await {
        got.push(batch.into_indices());
    }
    assert_eq!(got, vec![vec![0]]);

    let err = task.await.unwrap().unwrap_err();
    assert_eq!(
        err.root_cause().downcast_ref::<LengthLookupError>(),
        Some(&LengthLookupError::UnknownSample(99))
    );
}

#[tokio::test]
async fn dropping_receiver_stops_producer() {
    let packer = infallible(0..100_000u64, |_| 1u32, PackerConfig::new(1, 10u32).unwrap())
        .unwrap();
    let metrics = packer.metrics();

    let (mut rx, task) = spawn_batch_stream(packer, 1);
    let first = rx.recv().await.unwrap();
    assert_eq!(first.into_indices(), vec![0]);
    drop(rx);

    task.await.unwrap().unwrap();
    assert!(metrics.batches_total.get() < 100_000);
}

#[tokio::test]
async fn zero_queue_depth_is_clamped() {
    let packer = infallible(0..3u64, |_| 1u64, PackerConfig::new(2, 10).unwrap()).unwrap();
    let (mut rx, task) = spawn_batch_stream(packer, 0);
    let mut count = 0;
    while rx.recv().await.is_some() {
        count += 1;
    }
    task.await.unwrap().unwrap();
    assert_eq!(count, 2);
}
