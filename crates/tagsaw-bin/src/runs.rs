//! Mode wiring: each run_* function assembles the stages for one verb and
//! drives them to completion. All take the input source and output writer
//! as parameters so integration tests can run them hermetically.

use crate::options::{GlobalOptions, Prepare};
use anyhow::{anyhow, Context, Result};
use core_archive::{ChangeStatus, StashOptions, Stasher};
use core_parse::{build_tree, Token, Tokenizer};
use core_pipeline::{consumers, producer, unshuffler, uniquer, PipelineSettings, XmlRecord};
use core_query::{Block, Step};
use core_split::{BlockReader, Partitioner};
use std::collections::HashSet;
use std::io::{BufRead, BufReader, Read, Write};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// The element the partitioner anchors on for a compiled program.
fn partition_target(program: &Block) -> String {
    if program.visit.ends_with("/*") {
        program.visit.clone()
    } else if program.match_name.is_empty() {
        program.visit.clone()
    } else {
        program.match_name.clone()
    }
}

/// Uppercase and whitespace-normalize record content for phrase tests,
/// keeping angle brackets so tag boundaries still anchor matches.
fn phrase_text(record: &str) -> String {
    let upper = record.to_ascii_uppercase();
    let compressed = core_text::compress_runs_of_spaces(&upper);
    compressed.into_owned()
}

/// `-phrase "A B + C"`: every '+'-separated clause must occur.
pub fn phrase_matches(record_text: &str, phrase: &str) -> bool {
    let haystack = phrase_text(record_text);
    phrase
        .split('+')
        .map(|clause| clause.trim().to_ascii_uppercase())
        .filter(|clause| !clause.is_empty())
        .all(|clause| haystack.contains(&clause))
}

/// Pull one identifier out of a record with a bare tokenizer pass; no
/// tree is built for the indexer stage.
pub fn extract_identifier(record: &str, spec: &Step) -> Option<String> {
    let mut tokens = Tokenizer::new(record);
    let mut parent_stack: Vec<&str> = Vec::new();
    loop {
        match tokens.next_token() {
            Token::StartTag { name, attrs } => {
                let parent = parent_stack.last().copied().unwrap_or_default();
                let name_ok = spec.match_name.is_empty() || name == spec.match_name;
                let parent_ok = spec.parent.is_empty() || parent == spec.parent;
                if name_ok && parent_ok && !spec.attribute.is_empty() {
                    if let Some(value) = attr_value(attrs, &spec.attribute) {
                        return Some(value);
                    }
                }
                parent_stack.push(name);
                if name_ok && parent_ok && spec.attribute.is_empty() {
                    // The next content run inside this element is the id.
                    loop {
                        match tokens.next_token() {
                            Token::Content(text) | Token::CData(text) => {
                                return Some(text.trim().to_string());
                            }
                            Token::StartTag { name, .. } => {
                                parent_stack.push(name);
                            }
                            Token::StopTag { .. } => return None,
                            Token::Closed => return None,
                            _ => {}
                        }
                    }
                }
            }
            Token::StopTag { .. } => {
                parent_stack.pop();
            }
            Token::Closed => return None,
            _ => {}
        }
    }
}

fn attr_value(attrs: &str, want: &str) -> Option<String> {
    let mut rest = attrs;
    while let Some(eq) = rest.find('=') {
        let name = rest[..eq].trim();
        let after = rest[eq + 1..].trim_start();
        let quote = after.chars().next()?;
        if quote != '"' && quote != '\'' {
            return None;
        }
        let end = after[1..].find(quote)? + 1;
        if name == want {
            return Some(after[1..end].to_string());
        }
        rest = &after[end + 1..];
    }
    None
}

/// Merge the optional `tagsaw.toml` with command-line overrides.
pub fn resolve_runtime(opts: &GlobalOptions) -> core_config::RuntimeConfig {
    let file = core_config::load_from(opts.config.as_deref()).unwrap_or_default();
    let mut cfg = core_config::RuntimeConfig::from_file(&file);
    if let Some(p) = opts.procs {
        cfg.procs = p;
    }
    if let Some(c) = opts.chan {
        cfg.chan = c;
    }
    if let Some(h) = opts.heap {
        cfg.heap = h;
    }
    if let Some(f) = opts.farm {
        cfg.farm = f;
    }
    if let Some(s) = opts.serv {
        cfg.serv = s;
    }
    cfg.effective()
}

fn settings_for(opts: &GlobalOptions) -> PipelineSettings {
    let cfg = resolve_runtime(opts);
    PipelineSettings {
        workers: opts.workers(cfg.procs),
        channel_depth: cfg.chan,
        heap_size: cfg.heap,
    }
}

pub fn run_extraction(
    opts: &GlobalOptions,
    program_args: &[String],
    input: Box<dyn Read + Send>,
    out: &mut dyn Write,
) -> Result<()> {
    let program = Arc::new(core_query::compile(program_args)?);
    let settings = settings_for(opts);
    let farm = resolve_runtime(opts).farm;
    let reader_options = opts.reader_options();
    let build_options = opts.build_options();
    let pattern = partition_target(&program);
    let phrase = opts.phrase.clone();

    info!(
        target: "runtime",
        pattern = pattern.as_str(),
        workers = settings.workers,
        "extraction starting"
    );

    let rx = producer(&settings, move |tx| {
        let partitioner = match Partitioner::new(&pattern) {
            Ok(p) => p,
            Err(e) => {
                warn!(target: "split", error = %e, "bad partition pattern");
                return;
            }
        };
        let mut reader = BlockReader::new(input, reader_options);
        let mut emitted = 0u64;
        let outcome = partitioner.partition(&mut reader, |meta, record| {
            if let Some(phrase) = &phrase {
                if !phrase_matches(record, phrase) {
                    return;
                }
            }
            emitted += 1;
            let _ = tx.send(XmlRecord {
                index: emitted,
                offset: meta.offset,
                ident: String::new(),
                text: record.to_string(),
            });
        });
        if let Err(e) = outcome {
            warn!(target: "split", error = %e, "partitioning aborted");
        }
    });

    let exec_program = program.clone();
    let processed = consumers(&settings, rx, move |mut record| {
        record.text = match build_tree(&record.text, &build_options, farm) {
            Ok(tree) => core_exec::execute(&exec_program, &tree),
            Err(e) => {
                warn!(target: "parse", index = record.index, error = %e, "record skipped");
                String::new()
            }
        };
        record
    });
    let ordered = unshuffler(&settings, processed);

    if let Some(head) = &opts.head {
        writeln!(out, "{head}")?;
    }
    for record in ordered.iter() {
        if record.text.is_empty() {
            continue;
        }
        if let Some(hd) = &opts.hd {
            writeln!(out, "{hd}")?;
        }
        out.write_all(record.text.as_bytes())?;
        if let Some(tl) = &opts.tl {
            writeln!(out, "{tl}")?;
        }
    }
    if let Some(tail) = &opts.tail {
        writeln!(out, "{tail}")?;
    }
    out.flush()?;
    Ok(())
}

/// `-index SPEC` without an archive: print identifier index lines.
pub fn run_index(
    opts: &GlobalOptions,
    spec: &str,
    pattern: &str,
    input: Box<dyn Read + Send>,
    out: &mut dyn Write,
) -> Result<()> {
    let settings = settings_for(opts);
    let reader_options = opts.reader_options();
    let step = Step::parse(spec).map_err(|e| anyhow!("bad -index selector: {e}"))?;
    let pattern = pattern.to_string();
    let phrase = opts.phrase.clone();

    let rx = producer(&settings, move |tx| {
        let partitioner = match Partitioner::new(&pattern) {
            Ok(p) => p,
            Err(e) => {
                warn!(target: "split", error = %e, "bad partition pattern");
                return;
            }
        };
        let mut reader = BlockReader::new(input, reader_options);
        let mut emitted = 0u64;
        let _ = partitioner.partition(&mut reader, |meta, record| {
            if let Some(phrase) = &phrase {
                if !phrase_matches(record, phrase) {
                    return;
                }
            }
            emitted += 1;
            let _ = tx.send(XmlRecord {
                index: emitted,
                offset: meta.offset,
                ident: String::new(),
                text: record.to_string(),
            });
        });
    });

    let indexed = consumers(&settings, rx, move |mut record| {
        record.ident = extract_identifier(&record.text, &step).unwrap_or_default();
        record
    });
    let ordered = unshuffler(&settings, indexed);

    for record in ordered.iter() {
        if record.ident.is_empty() {
            warn!(target: "runtime", index = record.index, "record has no identifier");
            continue;
        }
        writeln!(
            out,
            "{}\t{}\t{}\t{}",
            record.ident,
            record.index,
            record.offset,
            record.text.len()
        )?;
    }
    out.flush()?;
    Ok(())
}

/// Archive modes: store (default), or compare with `-prepare`.
pub fn run_archive(
    opts: &GlobalOptions,
    pattern: &str,
    input: Box<dyn Read + Send>,
    out: &mut dyn Write,
) -> Result<()> {
    let root = opts
        .archive
        .clone()
        .or_else(|| opts.stash.clone())
        .ok_or_else(|| anyhow!("archive mode needs -archive or -stash"))?;
    let spec = opts
        .index
        .clone()
        .ok_or_else(|| anyhow!("archive mode needs -index to pick identifiers"))?;
    let step = Step::parse(&spec).map_err(|e| anyhow!("bad -index selector: {e}"))?;
    let settings = settings_for(opts);
    let reader_options = opts.reader_options();
    let pattern = pattern.to_string();
    let phrase = opts.phrase.clone();

    let stasher = Stasher::new(
        &root,
        StashOptions {
            gzip: opts.gzip,
            hash: opts.hash,
        },
    );

    let skip: HashSet<String> = match &opts.skip {
        Some(path) => BufReader::new(
            std::fs::File::open(path)
                .with_context(|| format!("opening skip list {}", path.display()))?,
        )
        .lines()
        .collect::<std::io::Result<_>>()?,
        None => HashSet::new(),
    };

    let rx = producer(&settings, move |tx| {
        let partitioner = match Partitioner::new(&pattern) {
            Ok(p) => p,
            Err(e) => {
                warn!(target: "split", error = %e, "bad partition pattern");
                return;
            }
        };
        let mut reader = BlockReader::new(input, reader_options);
        let mut emitted = 0u64;
        let _ = partitioner.partition(&mut reader, |meta, record| {
            if let Some(phrase) = &phrase {
                if !phrase_matches(record, phrase) {
                    return;
                }
            }
            emitted += 1;
            let _ = tx.send(XmlRecord {
                index: emitted,
                offset: meta.offset,
                ident: String::new(),
                text: record.to_string(),
            });
        });
    });

    let indexed = consumers(&settings, rx, move |mut record| {
        record.ident = extract_identifier(&record.text, &step).unwrap_or_default();
        record
    });
    let ordered = unshuffler(&settings, indexed);
    let deduped = uniquer(&settings, ordered);
    let survivors = if skip.is_empty() {
        deduped
    } else {
        core_pipeline::deleter(&settings, skip, deduped)
    };

    if let Some(prepare) = opts.prepare {
        // Compare runs single-threaded so report lines keep record order.
        for record in survivors.iter() {
            if record.ident.is_empty() {
                warn!(target: "archive", index = record.index, "record has no identifier");
                continue;
            }
            let status = stasher.compare(&record.ident, &record.text, opts.ignore.as_deref())?;
            writeln!(out, "{}\t{}", status.code(), record.ident)?;
            if prepare == Prepare::Release && status != ChangeStatus::Unchanged {
                stasher.store(&record.ident, &record.text, record.index)?;
            }
        }
        out.flush()?;
        return Ok(());
    }

    // Stash fan-out; hash lines print as writes complete.
    let sink_out = Arc::new(Mutex::new(Vec::<String>::new()));
    let sink_stash = stasher.clone();
    let lines = sink_out.clone();
    let posting_root = opts.posting.clone();
    let handles = core_pipeline::fanout_sink(
        &PipelineSettings {
            workers: resolve_runtime(opts).serv,
            ..settings
        },
        survivors,
        move |record| {
            if record.ident.is_empty() {
                warn!(target: "archive", index = record.index, "record has no identifier");
                return;
            }
            match sink_stash.store(&record.ident, &record.text, record.index) {
                Ok(Some(crc)) => {
                    lines
                        .lock()
                        .expect("hash line buffer poisoned")
                        .push(format!("{}\t{}", record.ident, crc));
                }
                Ok(None) => {}
                Err(e) => warn!(target: "archive", ident = record.ident.as_str(), error = %e, "store failed"),
            }
            if let Some(root) = &posting_root {
                if let Err(e) = core_archive::post_uid(root, &record.ident, &record.ident) {
                    warn!(target: "archive", error = %e, "posting append failed");
                }
            }
        },
    );
    for handle in handles {
        handle
            .join()
            .map_err(|_| anyhow!("a stasher thread panicked"))?;
    }
    for line in sink_out.lock().expect("hash line buffer poisoned").iter() {
        writeln!(out, "{line}")?;
    }
    out.flush()?;
    Ok(())
}

/// `-fetch`: identifiers arrive one per line; stored records stream out.
/// With `-missing`, report the identifiers with no stored file instead.
pub fn run_fetch(
    opts: &GlobalOptions,
    input: Box<dyn Read + Send>,
    out: &mut dyn Write,
) -> Result<()> {
    let root = opts
        .archive
        .clone()
        .or_else(|| opts.stash.clone())
        .ok_or_else(|| anyhow!("-fetch needs -archive"))?;
    let stasher = Stasher::new(
        &root,
        StashOptions {
            gzip: opts.gzip,
            hash: opts.hash,
        },
    );
    for line in BufReader::new(input).lines() {
        let ident = line?;
        let ident = ident.trim();
        if ident.is_empty() {
            continue;
        }
        match stasher.fetch(ident)? {
            Some(text) => {
                if opts.missing {
                    continue;
                }
                out.write_all(text.as_bytes())?;
            }
            None => {
                if opts.missing {
                    writeln!(out, "{ident}")?;
                }
                // Fetch misses are otherwise skipped silently.
            }
        }
    }
    out.flush()?;
    Ok(())
}

/// `-trie`: print the archive-relative path for each identifier.
pub fn run_trie(
    input: Box<dyn Read + Send>,
    gzip: bool,
    out: &mut dyn Write,
) -> Result<()> {
    for line in BufReader::new(input).lines() {
        let ident = line?;
        let ident = ident.trim();
        if ident.is_empty() {
            continue;
        }
        match core_archive::trie_path(ident) {
            Ok(dir) => {
                let suffix = if gzip { ".xml.gz" } else { ".xml" };
                writeln!(out, "{}\t{}/{}{}", ident, dir.display(), ident, suffix)?;
            }
            Err(e) => warn!(target: "archive", error = %e, "identifier rejected"),
        }
    }
    out.flush()?;
    Ok(())
}

/// `-posting` without a pattern: append `term<TAB>uid` lines to the trie.
pub fn run_posting(
    root: &std::path::Path,
    input: Box<dyn Read + Send>,
) -> Result<()> {
    for line in BufReader::new(input).lines() {
        let line = line?;
        let Some((term, uid)) = line.split_once('\t') else {
            warn!(target: "archive", line = line.as_str(), "posting line needs term<TAB>uid");
            continue;
        };
        core_archive::post_uid(root, term.trim(), uid.trim())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const REC: &str = "<PubmedArticle><MedlineCitation><PMID Version=\"1\">6301692</PMID>\
<Article><ArticleTitle>Tn3 resolvase studies</ArticleTitle></Article>\
</MedlineCitation></PubmedArticle>";

    #[test]
    fn phrase_clauses_are_all_required() {
        assert!(phrase_matches(REC, "tn3 resolvase"));
        assert!(phrase_matches(REC, "tn3 resolvase + studies"));
        assert!(!phrase_matches(REC, "tn3 resolvase + plasmid"));
        assert!(phrase_matches(REC, "RESOLVASE"));
    }

    #[test]
    fn phrase_boundaries_keep_angle_brackets() {
        // The tag boundary anchors the match; ">Tn3" hits, ">resolvase" not.
        assert!(phrase_matches(REC, ">TN3"));
        assert!(!phrase_matches(REC, ">RESOLVASE"));
    }

    #[test]
    fn identifier_extraction_with_parent_constraint() {
        let step = Step::parse("MedlineCitation/PMID").unwrap();
        assert_eq!(extract_identifier(REC, &step).as_deref(), Some("6301692"));
        let wrong_parent = Step::parse("Article/PMID").unwrap();
        assert_eq!(extract_identifier(REC, &wrong_parent), None);
    }

    #[test]
    fn identifier_extraction_from_attribute() {
        let step = Step::parse("PMID@Version").unwrap();
        assert_eq!(extract_identifier(REC, &step).as_deref(), Some("1"));
    }

    #[test]
    fn extraction_mode_runs_hermetically() {
        let opts = GlobalOptions::default();
        let args: Vec<String> = ["-pattern", "PubmedArticle", "-element", "MedlineCitation/PMID"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let corpus = format!("<Set>{REC}{}</Set>", REC.replace("6301692", "6271474"));
        let mut out = Vec::new();
        run_extraction(
            &opts,
            &args,
            Box::new(Cursor::new(corpus.into_bytes())),
            &mut out,
        )
        .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "6301692\n6271474\n");
    }

    #[test]
    fn index_mode_prints_key_lines() {
        let opts = GlobalOptions::default();
        let corpus = format!("<Set>{REC}</Set>");
        let mut out = Vec::new();
        run_index(
            &opts,
            "MedlineCitation/PMID",
            "PubmedArticle",
            Box::new(Cursor::new(corpus.into_bytes())),
            &mut out,
        )
        .unwrap();
        let line = String::from_utf8(out).unwrap();
        let fields: Vec<&str> = line.trim_end().split('\t').collect();
        assert_eq!(fields[0], "6301692");
        assert_eq!(fields[1], "1");
        assert_eq!(fields[2], "5");
        assert_eq!(fields[3], REC.len().to_string().as_str());
    }

    #[test]
    fn archive_store_fetch_and_prepare_cycle() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut opts = GlobalOptions {
            archive: Some(dir.path().to_path_buf()),
            index: Some("MedlineCitation/PMID".to_string()),
            gzip: true,
            hash: true,
            ..Default::default()
        };
        let corpus = format!("<Set>{REC}</Set>");
        let mut out = Vec::new();
        run_archive(
            &opts,
            "PubmedArticle",
            Box::new(Cursor::new(corpus.clone().into_bytes())),
            &mut out,
        )
        .unwrap();
        let hash_line = String::from_utf8(out).unwrap();
        assert!(hash_line.starts_with("6301692\t"));

        let mut fetched = Vec::new();
        run_fetch(
            &opts,
            Box::new(Cursor::new(b"6301692\n".to_vec())),
            &mut fetched,
        )
        .unwrap();
        let fetched = String::from_utf8(fetched).unwrap();
        assert!(fetched.contains("<PMID Version=\"1\">6301692</PMID>"));

        // A second pass reports no change; a modified record reports UP.
        opts.prepare = Some(Prepare::Report);
        let mut report = Vec::new();
        run_archive(
            &opts,
            "PubmedArticle",
            Box::new(Cursor::new(corpus.into_bytes())),
            &mut report,
        )
        .unwrap();
        assert_eq!(String::from_utf8(report).unwrap(), "NO\t6301692\n");
    }

    #[test]
    fn trie_lines_follow_the_archive_layout() {
        let mut out = Vec::new();
        run_trie(
            Box::new(Cursor::new(b"NP_060051.2\n".to_vec())),
            false,
            &mut out,
        )
        .unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "NP_060051.2\tNP_/06/00/51/NP_060051.2.xml\n"
        );
    }
}
