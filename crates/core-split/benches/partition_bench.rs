use core_split::{BlockReader, Partitioner, ReaderOptions};
use criterion::{Criterion, criterion_group, criterion_main};
use std::io::Cursor;

fn synthetic_corpus(records: usize) -> String {
    let mut xml = String::from("<RecSet>\n");
    for n in 0..records {
        xml.push_str(&format!(
            "<Rec><Id>{n}</Id><Title>record number {n} with some text payload</Title></Rec>\n"
        ));
    }
    xml.push_str("</RecSet>\n");
    xml
}

fn bench_partition(c: &mut Criterion) {
    let corpus = synthetic_corpus(5_000);
    c.bench_function("partition_5k_records", |b| {
        b.iter(|| {
            let part = Partitioner::new("Rec").unwrap();
            let mut reader =
                BlockReader::new(Cursor::new(corpus.as_bytes()), ReaderOptions::default());
            let mut count = 0u64;
            part.partition(&mut reader, |_, record| {
                count += record.len() as u64;
            })
            .unwrap();
            count
        })
    });
}

criterion_group!(benches, bench_partition);
criterion_main!(benches);
