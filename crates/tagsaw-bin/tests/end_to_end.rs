//! Full-stack flows through the library crates: partition → parse →
//! execute → reorder, and the archive round trip.

use core_archive::{stash::normalize_record, StashOptions, Stasher};
use core_exec::execute;
use core_parse::{build_tree, BuildOptions};
use core_pipeline::{consumers, producer, unshuffler, PipelineSettings, XmlRecord};
use core_query::compile;
use core_split::{BlockReader, Partitioner, ReaderOptions};
use std::io::Cursor;
use std::sync::Arc;

fn pubmed(pmid: &str, authors: &[(&str, &str)]) -> String {
    let mut body = String::new();
    for (initials, last) in authors {
        body.push_str(&format!(
            "<Author><LastName>{last}</LastName><Initials>{initials}</Initials></Author>"
        ));
    }
    format!(
        "<PubmedArticle><MedlineCitation><PMID>{pmid}</PMID>\
<Article><AuthorList>{body}</AuthorList></Article>\
</MedlineCitation></PubmedArticle>"
    )
}

#[test]
fn extraction_output_is_order_stable_across_worker_counts() {
    let corpus = {
        let mut s = String::from("<PubmedArticleSet>");
        for n in 1..=500u32 {
            s.push_str(&pubmed(&n.to_string(), &[("AB", "Name")]));
        }
        s.push_str("</PubmedArticleSet>");
        s
    };
    let args: Vec<String> = ["-pattern", "PubmedArticle", "-element", "MedlineCitation/PMID"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    let mut outputs = Vec::new();
    for workers in [1usize, 4, 8] {
        let program = Arc::new(compile(&args).unwrap());
        let settings = PipelineSettings::with_workers(workers);
        let corpus = corpus.clone();
        let rx = producer(&settings, move |tx| {
            let part = Partitioner::new("PubmedArticle").unwrap();
            let mut reader = BlockReader::new(Cursor::new(corpus), ReaderOptions::default());
            part.partition(&mut reader, |meta, record| {
                let _ = tx.send(XmlRecord {
                    index: meta.index,
                    offset: meta.offset,
                    ident: String::new(),
                    text: record.to_string(),
                });
            })
            .unwrap();
        });
        let program_for_workers = program.clone();
        let processed = consumers(&settings, rx, move |mut record| {
            let tree = build_tree(&record.text, &BuildOptions::default(), 64).unwrap();
            record.text = execute(&program_for_workers, &tree);
            record
        });
        let collected: String = unshuffler(&settings, processed)
            .iter()
            .map(|r| r.text)
            .collect();
        outputs.push(collected);
    }
    let expected: String = (1..=500u32).map(|n| format!("{n}\n")).collect();
    for output in outputs {
        assert_eq!(output, expected);
    }
}

#[test]
fn archive_round_trip_matches_normalized_input() {
    let dir = tempfile::TempDir::new().unwrap();
    let stasher = Stasher::new(
        dir.path(),
        StashOptions {
            gzip: true,
            hash: true,
        },
    );

    let one = pubmed("6301692", &[("MA", "Krasnow"), ("NR", "Cozzarelli")]);
    let two = pubmed("6271474", &[("JG", "Sutcliffe")]);
    let corpus = format!("<PubmedArticleSet>{one}{two}</PubmedArticleSet>");

    // Partition, pick the PMID out of each record, and stash it.
    let part = Partitioner::new("PubmedArticle").unwrap();
    let mut reader = BlockReader::new(Cursor::new(corpus), ReaderOptions::default());
    let pmid_args: Vec<String> = ["-pattern", "PubmedArticle", "-element", "MedlineCitation/PMID"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let pmid_program = compile(&pmid_args).unwrap();
    part.partition(&mut reader, |meta, record| {
        let tree = build_tree(record, &BuildOptions::default(), 64).unwrap();
        let ident = execute(&pmid_program, &tree).trim().to_string();
        stasher.store(&ident, record, meta.index).unwrap();
    })
    .unwrap();

    let fetched = stasher.fetch("6301692").unwrap().unwrap();
    assert_eq!(fetched, normalize_record(&one));
    let fetched = stasher.fetch("6271474").unwrap().unwrap();
    assert_eq!(fetched, normalize_record(&two));
    assert!(stasher.fetch("9999999").unwrap().is_none());
}
