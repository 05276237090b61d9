use std::fmt;
use std::future::Future;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, warn, Instrument};
use uuid::Uuid;
use crate::core::config::FanInConfig;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::observability::partition_span;
use crate::parallel::cancel::CancelToken;

/// What travels on one partition queue.
enum PartitionItem<T> {
    Record(T),
    Failed(Error),
}

/// An item of the combined output.
#[derive(Debug)]
pub enum Fanned<T> {
    Record(T),
    Failed(PartitionFailure),
    /// Last item when the run was cancelled before every partition finished.
    Cancelled,
}

#[derive(Debug)]
pub struct PartitionFailure {
    pub partition: String,
    pub error: Error,
}

/// Everything a drained run produced.
#[derive(Debug)]
pub struct FanInOutcome<T> {
    pub records: Vec<T>,
    pub failures: Vec<PartitionFailure>,
    pub cancelled: bool,
}

impl<T> FanInOutcome<T> {
    /// Records of a run where every partition succeeded.
    pub fn into_result(self) -> Result<Vec<T>> {
        if self.cancelled {
            return Err(Error::cancelled("collection run cancelled"));
        }
        if let Some(first) = self.failures.first() {
            return Err(Error::new(
                ErrorKind::Partition,
                format!(
                    "{} partition(s) failed, first {}: {}",
                    self.failures.len(),
                    first.partition,
                    first.error
                ),
            ));
        }
        Ok(self.records)
    }
}

/// Output handle given to one partition's producer.
pub struct PartitionSink<T> {
    partition: String,
    tx: mpsc::Sender<PartitionItem<T>>,
    cancel: CancelToken,
}

impl<T> PartitionSink<T> {
    pub fn partition(&self) -> &str {
        &self.partition
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Hands one record to the merge stage, waiting while the queue is full.
    pub async fn send(&self, record: T) -> Result<()> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                Err(Error::cancelled(format!("partition {} cancelled", self.partition)))
            }
            sent = self.tx.send(PartitionItem::Record(record)) => sent.map_err(|_| {
                Error::cancelled(format!("combined output for {} was dropped", self.partition))
            }),
        }
    }
}

/// Combined output of all partitions. Closes once every partition worker has
/// finished and its queue is drained, or right after `Fanned::Cancelled`.
pub struct Combined<T> {
    rx: mpsc::Receiver<Fanned<T>>,
    merge: JoinHandle<()>,
}

impl<T> Combined<T> {
    pub async fn next(&mut self) -> Option<Fanned<T>> {
        self.rx.recv().await
    }

    pub async fn drain(mut self) -> FanInOutcome<T> {
        let mut outcome = FanInOutcome {
            records: Vec::new(),
            failures: Vec::new(),
            cancelled: false,
        };
        while let Some(item) = self.rx.recv().await {
            match item {
                Fanned::Record(record) => outcome.records.push(record),
                Fanned::Failed(failure) => outcome.failures.push(failure),
                Fanned::Cancelled => outcome.cancelled = true,
            }
        }
        outcome
    }
}

impl<T> Drop for Combined<T> {
    fn drop(&mut self) {
        // Nobody reads anymore; stop forwarding.
        self.merge.abort();
    }
}

/// Fan-in of per-partition producers into one combined output.
#[derive(Debug, Clone)]
pub struct FanIn {
    config: FanInConfig,
    run_id: String,
}

impl FanIn {
    pub fn new(config: &FanInConfig) -> Result<Self> {
        if config.partition_queue_depth == 0 || config.combined_queue_depth == 0 {
            return Err(Error::new(
                ErrorKind::InvalidArgument,
                "fan-in queues need a depth of at least 1".to_string(),
            ));
        }
        Ok(FanIn {
            config: config.clone(),
            run_id: Uuid::new_v4().to_string(),
        })
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Spawns one worker per partition running `producer(partition, sink)`.
    ///
    /// Records keep their order within a partition; there is no order across
    /// partitions. A failing producer closes its queue like a finished one and
    /// its error is forwarded as `Fanned::Failed`, the other partitions carry on.
    pub fn collect<P, T, F, Fut>(
        &self,
        partitions: Vec<P>,
        producer: F,
        cancel: CancelToken,
    ) -> Combined<T>
    where
        P: fmt::Display,
        T: Send + 'static,
        F: Fn(P, PartitionSink<T>) -> Fut,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let mut queues = Vec::with_capacity(partitions.len());
        let mut workers = Vec::with_capacity(partitions.len());

        for partition in partitions {
            let label = partition.to_string();
            let (tx, rx) = mpsc::channel(self.config.partition_queue_depth);
            let sink = PartitionSink {
                partition: label.clone(),
                tx: tx.clone(),
                cancel: cancel.clone(),
            };
            let work = producer(partition, sink);
            let worker_cancel = cancel.clone();
            let worker_label = label.clone();

            let handle = tokio::spawn(
                async move {
                    let result = tokio::select! {
                        biased;
                        _ = worker_cancel.cancelled() => Err(Error::cancelled("partition cancelled")),
                        result = work => result,
                    };
                    match result {
                        Ok(()) => debug!("partition finished"),
                        Err(e) if e.kind == ErrorKind::Cancelled => debug!("partition stopped by cancellation"),
                        Err(e) => {
                            warn!(partition = %worker_label, error = %e, "partition worker failed");
                            let _ = tx.send(PartitionItem::Failed(e)).await;
                        }
                    }
                    // Dropping `tx` closes this partition's queue.
                }
                .instrument(partition_span(&self.run_id, &label)),
            );

            queues.push((label.clone(), rx));
            workers.push((label, handle));
        }

        let (out_tx, out_rx) = mpsc::channel(self.config.combined_queue_depth);
        let merge = tokio::spawn(merge(queues, workers, out_tx, cancel));

        Combined { rx: out_rx, merge }
    }
}

/// Forwards every partition queue into `out` and closes it once all workers are done.
async fn merge<T: Send + 'static>(
    queues: Vec<(String, mpsc::Receiver<PartitionItem<T>>)>,
    workers: Vec<(String, JoinHandle<()>)>,
    out: mpsc::Sender<Fanned<T>>,
    cancel: CancelToken,
) {
    let mut forwarders = JoinSet::new();
    for (label, mut rx) in queues {
        let out = out.clone();
        forwarders.spawn(async move {
            while let Some(item) = rx.recv().await {
                let fanned = match item {
                    PartitionItem::Record(record) => Fanned::Record(record),
                    PartitionItem::Failed(error) => Fanned::Failed(PartitionFailure {
                        partition: label.clone(),
                        error,
                    }),
                };
                if out.send(fanned).await.is_err() {
                    break;
                }
            }
        });
    }

    let barrier = async {
        while forwarders.join_next().await.is_some() {}
        for (label, handle) in workers {
            if let Err(e) = handle.await {
                if e.is_panic() {
                    let _ = out
                        .send(Fanned::Failed(PartitionFailure {
                            partition: label,
                            error: Error::new(ErrorKind::Internal, "partition worker panicked".to_string()),
                        }))
                        .await;
                }
            }
        }
    };

    let cancelled = tokio::select! {
        biased;
        _ = cancel.cancelled() => true,
        _ = barrier => false,
    };

    if cancelled {
        forwarders.abort_all();
        let _ = out.send(Fanned::Cancelled).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    fn fan_in() -> FanIn {
        FanIn::new(&FanInConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn combined_output_is_union_of_partitions() {
        let combined = fan_in().collect(
            vec!["us-east-1", "eu-west-1", "ap-south-1"],
            |region, sink| async move {
                for i in 0..5 {
                    sink.send(format!("{}/{}", region, i)).await?;
                }
                Ok::<(), Error>(())
            },
            CancelToken::new(),
        );

        let outcome = combined.drain().await;
        assert!(!outcome.cancelled);
        assert!(outcome.failures.is_empty());

        let mut records = outcome.records;
        records.sort();
        let mut expected: Vec<String> = ["us-east-1", "eu-west-1", "ap-south-1"]
            .iter()
            .flat_map(|r| (0..5).map(move |i| format!("{}/{}", r, i)))
            .collect();
        expected.sort();
        assert_eq!(records, expected);
    }

    #[tokio::test]
    async fn order_is_kept_within_a_partition() {
        let combined = fan_in().collect(
            vec![0u32, 1, 2, 3],
            |partition, sink| async move {
                for seq in 0..50u32 {
                    sink.send((partition, seq)).await?;
                    if seq % 7 == 0 {
                        tokio::task::yield_now().await;
                    }
                }
                Ok::<(), Error>(())
            },
            CancelToken::new(),
        );

        let records = combined.drain().await.into_result().unwrap();
        let mut last: HashMap<u32, u32> = HashMap::new();
        for (partition, seq) in records {
            if let Some(prev) = last.insert(partition, seq) {
                assert!(seq > prev, "partition {} went from {} to {}", partition, prev, seq);
            }
        }
        assert_eq!(last.len(), 4);
    }

    #[tokio::test]
    async fn failing_partition_does_not_hide_others() {
        let combined = fan_in().collect(
            vec!["p1", "p2", "p3"],
            |partition, sink| async move {
                if partition == "p2" {
                    return Err(Error::backend("DescribeInstances throttled"));
                }
                for i in 0..3 {
                    sink.send(format!("{}-{}", partition, i)).await?;
                }
                Ok::<(), Error>(())
            },
            CancelToken::new(),
        );

        let outcome = combined.drain().await;
        assert_eq!(outcome.records.len(), 6);
        assert!(outcome.records.iter().all(|r| !r.starts_with("p2")));
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].partition, "p2");
        assert_eq!(outcome.failures[0].error.kind, ErrorKind::Backend);
        assert_eq!(outcome.into_result().unwrap_err().kind, ErrorKind::Partition);
    }

    #[tokio::test]
    async fn cancellation_closes_output_early() {
        let cancel = CancelToken::new();
        let mut combined = fan_in().collect(
            vec!["fast", "stuck"],
            |partition, sink| async move {
                sink.send(partition.to_string()).await?;
                if partition == "stuck" {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                }
                Ok::<(), Error>(())
            },
            cancel.clone(),
        );

        let mut received = 0;
        while received < 2 {
            match combined.next().await {
                Some(Fanned::Record(_)) => received += 1,
                other => panic!("unexpected item {:?}", other.map(|_| ())),
            }
        }
        cancel.cancel();

        let outcome = tokio::time::timeout(Duration::from_secs(5), combined.drain())
            .await
            .expect("combined output closed after cancel");
        assert!(outcome.cancelled);
        assert_eq!(outcome.into_result().unwrap_err().kind, ErrorKind::Cancelled);
    }

    #[tokio::test]
    async fn no_partitions_closes_immediately() {
        let combined = fan_in().collect(
            Vec::<String>::new(),
            |_, sink: PartitionSink<u8>| async move {
                sink.send(1).await
            },
            CancelToken::new(),
        );
        let outcome = combined.drain().await;
        assert!(outcome.records.is_empty());
        assert!(!outcome.cancelled);
    }

    #[tokio::test]
    async fn panicking_worker_is_reported() {
        let combined = fan_in().collect(
            vec![1u8, 2],
            |partition, sink| async move {
                if partition == 2 {
                    panic!("collector bug");
                }
                sink.send(partition).await
            },
            CancelToken::new(),
        );
        let outcome = combined.drain().await;
        assert_eq!(outcome.records, vec![1]);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].partition, "2");
        assert_eq!(outcome.failures[0].error.kind, ErrorKind::Internal);
    }

    #[test]
    fn zero_queue_depth_is_rejected() {
        let unbuffered = FanInConfig {
            partition_queue_depth: 0,
            ..FanInConfig::default()
        };
        assert_eq!(FanIn::new(&unbuffered).unwrap_err().kind, ErrorKind::InvalidArgument);

        let combined = FanInConfig {
            combined_queue_depth: 0,
            ..FanInConfig::default()
        };
        assert!(FanIn::new(&combined).is_err());
    }
}
