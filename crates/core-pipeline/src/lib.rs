//! Staged record pipeline: producer → worker fan-out → order-restoring
//! sink, with optional identifier-keyed pass-through stages.
//!
//! Channel policy: every stage boundary is a bounded crossbeam channel
//! whose depth defaults to the worker count; the producer parks when
//! consumers fall behind, which is the only backpressure mechanism needed
//! for a batch tool. A stage signals completion by dropping its sender;
//! fan-out stages clone the sender per worker so the channel closes when
//! the last worker finishes (the waitgroup equivalent). Fatal errors close
//! the stage's output the same way; downstream drains and exits.

use crossbeam_channel::{bounded, Receiver, Sender};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::thread;
use tracing::{debug, warn};

pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_HEAP_SIZE: usize = 16;

/// One record moving through the stages. `ident` stays empty outside the
/// archive modes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlRecord {
    /// 1-based input position; the unshuffler restores this order.
    pub index: u64,
    /// Absolute byte offset of the record in the processed stream.
    pub offset: u64,
    pub ident: String,
    pub text: String,
}

/// Tuning knobs resolved from configuration and global options.
#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    pub workers: usize,
    pub channel_depth: usize,
    pub heap_size: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            channel_depth: DEFAULT_WORKERS,
            heap_size: DEFAULT_HEAP_SIZE,
        }
    }
}

impl PipelineSettings {
    pub fn with_workers(workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            workers,
            channel_depth: workers,
            heap_size: DEFAULT_HEAP_SIZE,
        }
    }

    pub fn channel(&self) -> usize {
        self.channel_depth.max(1)
    }
}

/// Spawn the producer stage: runs `fill` with a sender, closing the
/// channel when it returns.
pub fn producer<F>(settings: &PipelineSettings, fill: F) -> Receiver<XmlRecord>
where
    F: FnOnce(Sender<XmlRecord>) + Send + 'static,
{
    let (tx, rx) = bounded(settings.channel());
    thread::spawn(move || {
        fill(tx);
        // Sender drops here; downstream sees the close.
    });
    rx
}

/// Fan out `workers` threads applying `work` to each record. The output
/// channel closes when the last worker drops its sender clone.
pub fn consumers<F>(
    settings: &PipelineSettings,
    input: Receiver<XmlRecord>,
    work: F,
) -> Receiver<XmlRecord>
where
    F: Fn(XmlRecord) -> XmlRecord + Send + Sync + 'static,
{
    let (tx, rx) = bounded(settings.channel());
    let work = std::sync::Arc::new(work);
    for worker in 0..settings.workers {
        let input = input.clone();
        let tx = tx.clone();
        let work = work.clone();
        thread::Builder::new()
            .name(format!("consume-{worker}"))
            .spawn(move || {
                for record in input.iter() {
                    let out = work(record);
                    if tx.send(out).is_err() {
                        debug!(target: "pipeline", worker, "output closed; stopping");
                        return;
                    }
                }
            })
            .expect("spawning a consumer thread");
    }
    rx
}

/// Restore input order with a min-heap keyed by record index.
///
/// Ordering is never sacrificed: the heap waits for the next expected
/// index no matter how far ahead the workers run. `heap_size` is the
/// intended buffering level; growth beyond it is logged once since it
/// means the bounded channels upstream are sized larger than the reorder
/// window.
pub fn unshuffler(settings: &PipelineSettings, input: Receiver<XmlRecord>) -> Receiver<XmlRecord> {
    let (tx, rx) = bounded(settings.channel());
    let heap_size = settings.heap_size.max(1);
    thread::Builder::new()
        .name("unshuffle".to_string())
        .spawn(move || {
            let mut heap: BinaryHeap<Reverse<HeapItem>> = BinaryHeap::with_capacity(heap_size);
            let mut next = 1u64;
            let mut warned = false;
            for record in input.iter() {
                heap.push(Reverse(HeapItem(record)));
                if heap.len() > heap_size && !warned {
                    warned = true;
                    warn!(
                        target: "pipeline",
                        buffered = heap.len(),
                        heap_size,
                        "reorder buffer exceeded its target size"
                    );
                }
                while heap
                    .peek()
                    .is_some_and(|Reverse(HeapItem(r))| r.index == next)
                {
                    let Reverse(HeapItem(out)) = heap.pop().expect("peeked entry");
                    next += 1;
                    if tx.send(out).is_err() {
                        return;
                    }
                }
            }
            // Input closed: drain whatever is left in index order.
            while let Some(Reverse(HeapItem(out))) = heap.pop() {
                if out.index != next {
                    debug!(
                        target: "pipeline",
                        expected = next,
                        got = out.index,
                        "gap in record indices at drain"
                    );
                }
                next = out.index + 1;
                if tx.send(out).is_err() {
                    return;
                }
            }
        })
        .expect("spawning the unshuffler thread");
    rx
}

struct HeapItem(XmlRecord);

impl PartialEq for HeapItem {
    fn eq(&self, other: &Self) -> bool {
        self.0.index == other.0.index
    }
}
impl Eq for HeapItem {}
impl PartialOrd for HeapItem {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for HeapItem {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.index.cmp(&other.0.index)
    }
}

/// Drop the earlier of two adjacent records with equal identifiers.
pub fn uniquer(settings: &PipelineSettings, input: Receiver<XmlRecord>) -> Receiver<XmlRecord> {
    let (tx, rx) = bounded(settings.channel());
    thread::Builder::new()
        .name("unique".to_string())
        .spawn(move || {
            let mut held: Option<XmlRecord> = None;
            for record in input.iter() {
                match held.take() {
                    Some(prev) if prev.ident == record.ident => {
                        debug!(
                            target: "pipeline",
                            ident = record.ident.as_str(),
                            dropped = prev.index,
                            "superseded by a later record"
                        );
                        held = Some(record);
                    }
                    Some(prev) => {
                        if tx.send(prev).is_err() {
                            return;
                        }
                        held = Some(record);
                    }
                    None => held = Some(record),
                }
            }
            if let Some(last) = held {
                let _ = tx.send(last);
            }
        })
        .expect("spawning the uniquer thread");
    rx
}

/// Drop records whose identifier is in the skip set.
pub fn deleter(
    settings: &PipelineSettings,
    skip: std::collections::HashSet<String>,
    input: Receiver<XmlRecord>,
) -> Receiver<XmlRecord> {
    let (tx, rx) = bounded(settings.channel());
    thread::Builder::new()
        .name("delete".to_string())
        .spawn(move || {
            for record in input.iter() {
                if skip.contains(&record.ident) {
                    continue;
                }
                if tx.send(record).is_err() {
                    return;
                }
            }
        })
        .expect("spawning the deleter thread");
    rx
}

/// Fan out `workers` threads running a side-effecting sink (the stasher).
/// Returns a join handle so the caller can block until all writes finish.
pub fn fanout_sink<F>(
    settings: &PipelineSettings,
    input: Receiver<XmlRecord>,
    sink: F,
) -> Vec<thread::JoinHandle<()>>
where
    F: Fn(XmlRecord) + Send + Sync + 'static,
{
    let sink = std::sync::Arc::new(sink);
    (0..settings.workers)
        .map(|worker| {
            let input = input.clone();
            let sink = sink.clone();
            thread::Builder::new()
                .name(format!("stash-{worker}"))
                .spawn(move || {
                    for record in input.iter() {
                        sink(record);
                    }
                })
                .expect("spawning a sink thread")
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(workers: usize) -> PipelineSettings {
        PipelineSettings::with_workers(workers)
    }

    fn send_all(records: Vec<XmlRecord>, depth: usize) -> Receiver<XmlRecord> {
        let (tx, rx) = bounded(depth.max(records.len()).max(1));
        for r in records {
            tx.send(r).unwrap();
        }
        rx
    }

    fn rec(index: u64, ident: &str) -> XmlRecord {
        XmlRecord {
            index,
            offset: 0,
            ident: ident.to_string(),
            text: format!("<R>{index}</R>"),
        }
    }

    #[test]
    fn unshuffler_restores_index_order() {
        let shuffled = vec![rec(3, ""), rec(1, ""), rec(4, ""), rec(2, ""), rec(5, "")];
        let rx = unshuffler(&settings(2), send_all(shuffled, 8));
        let order: Vec<u64> = rx.iter().map(|r| r.index).collect();
        assert_eq!(order, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn uniquer_keeps_the_later_adjacent_duplicate() {
        let input = vec![rec(1, "A"), rec(2, "A"), rec(3, "B"), rec(4, "A")];
        let rx = uniquer(&settings(1), send_all(input, 8));
        let kept: Vec<(u64, String)> = rx.iter().map(|r| (r.index, r.ident)).collect();
        assert_eq!(
            kept,
            vec![
                (2, "A".to_string()),
                (3, "B".to_string()),
                (4, "A".to_string())
            ]
        );
    }

    #[test]
    fn deleter_drops_skip_set_members() {
        let skip: std::collections::HashSet<String> = ["B".to_string()].into_iter().collect();
        let input = vec![rec(1, "A"), rec(2, "B"), rec(3, "C")];
        let rx = deleter(&settings(1), skip, send_all(input, 8));
        let kept: Vec<String> = rx.iter().map(|r| r.ident).collect();
        assert_eq!(kept, vec!["A".to_string(), "C".to_string()]);
    }

    proptest::proptest! {
        // Any arrival permutation leaves the sink in ascending index order.
        #[test]
        fn unshuffler_orders_any_permutation(seed in proptest::collection::vec(0u64..1000, 1..60)) {
            let mut indices: Vec<u64> = (1..=seed.len() as u64).collect();
            // Deterministic shuffle driven by the seed values.
            for (i, s) in seed.iter().enumerate() {
                let len = indices.len();
                let j = (*s as usize) % len;
                indices.swap(i % len, j);
            }
            let records: Vec<XmlRecord> = indices.iter().map(|i| rec(*i, "")).collect();
            let rx = unshuffler(&settings(2), send_all(records, 64));
            let order: Vec<u64> = rx.iter().map(|r| r.index).collect();
            let expected: Vec<u64> = (1..=seed.len() as u64).collect();
            proptest::prop_assert_eq!(order, expected);
        }
    }

    #[test]
    fn producer_workers_unshuffler_preserve_order_end_to_end() {
        let total = 10_000u64;
        let settings = settings(8);
        let rx = producer(&settings, move |tx| {
            for index in 1..=total {
                let record = XmlRecord {
                    index,
                    offset: 0,
                    ident: String::new(),
                    text: format!("<Rec><Id>{index}</Id></Rec>"),
                };
                if tx.send(record).is_err() {
                    return;
                }
            }
        });
        let processed = consumers(&settings, rx, |mut record| {
            // Simulate uneven work so arrival order scrambles.
            if record.index % 97 == 0 {
                std::thread::yield_now();
            }
            record.text = record
                .text
                .trim_start_matches("<Rec><Id>")
                .trim_end_matches("</Id></Rec>")
                .to_string();
            record
        });
        let ordered = unshuffler(&settings, processed);
        let mut expected = 1u64;
        for record in ordered.iter() {
            assert_eq!(record.index, expected);
            assert_eq!(record.text, expected.to_string());
            expected += 1;
        }
        assert_eq!(expected, total + 1);
    }
}
