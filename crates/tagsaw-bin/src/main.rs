//! tagsaw entrypoint: global options, then one verb.

use anyhow::{anyhow, bail, Result};
use core_split::BlockReader;
use std::io::{IsTerminal, Read, Write};
use std::sync::Once;
use tracing::info;

mod help;
mod options;
mod runs;

use options::GlobalOptions;

fn configure_logging() {
    // Stdout belongs to record output; diagnostics go to stderr.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

fn install_panic_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            tracing::error!(target: "runtime.panic", ?info, "panic");
            default_panic(info);
        }));
    });
}

/// Open the record source. `-input` and piped stdin are mutually
/// exclusive; with neither, there is nothing to read.
fn open_input(opts: &GlobalOptions) -> Result<Box<dyn Read + Send>> {
    let stdin_piped = !std::io::stdin().is_terminal();
    match &opts.input {
        Some(path) => {
            if stdin_piped {
                bail!("both stdin and -input {} given", path.display());
            }
            let file = std::fs::File::open(path)
                .map_err(|e| anyhow!("opening {}: {e}", path.display()))?;
            Ok(Box::new(file))
        }
        None => {
            if !stdin_piped {
                bail!("no input: pipe XML on stdin or pass -input PATH");
            }
            Ok(Box::new(std::io::stdin()))
        }
    }
}

fn main() -> Result<()> {
    configure_logging();
    install_panic_hook();
    info!(target: "runtime", version = help::VERSION, "startup");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (opts, rest) = options::parse_globals(&args)?;
    let stdout = std::io::stdout();
    let mut out = std::io::BufWriter::new(stdout.lock());

    // Documentation verbs print a fixed blob and exit 0.
    if let Some(first) = rest.first() {
        let blob = match first.as_str() {
            "-version" => Some(format!("{}\n", help::VERSION)),
            "-help" => Some(help::HELP.to_string()),
            "-examples" => Some(help::EXAMPLES.to_string()),
            "-extras" => Some(help::EXTRAS.to_string()),
            "-advanced" => Some(help::ADVANCED.to_string()),
            "-internal" => Some(help::INTERNAL.to_string()),
            "-sample" => Some(help::SAMPLE.to_string()),
            "-keys" => Some(help::KEYS.to_string()),
            "-unix" => Some(help::UNIX.to_string()),
            _ => None,
        };
        if let Some(blob) = blob {
            out.write_all(blob.as_bytes())?;
            out.flush()?;
            return Ok(());
        }
    }

    match rest.first().map(String::as_str) {
        Some("-format") => {
            let mode = rest
                .get(1)
                .map(String::as_str)
                .unwrap_or("indent");
            let mode = core_parse::stream::FormatMode::parse(mode)
                .ok_or_else(|| anyhow!("unrecognized -format style '{mode}'"))?;
            let reader = BlockReader::new(open_input(&opts)?, opts.reader_options());
            core_parse::stream::format(reader, mode, &mut out)?;
        }
        Some("-outline") => {
            let reader = BlockReader::new(open_input(&opts)?, opts.reader_options());
            core_parse::stream::outline(reader, &mut out)?;
        }
        Some("-synopsis") => {
            let reader = BlockReader::new(open_input(&opts)?, opts.reader_options());
            core_parse::stream::synopsis(reader, &mut out)?;
        }
        Some("-verify") | Some("-validate") => {
            let pattern = rest.get(1).filter(|p| !p.starts_with('-')).cloned();
            let reader = BlockReader::new(open_input(&opts)?, opts.reader_options());
            core_parse::stream::verify(reader, pattern.as_deref(), &mut out)?;
        }
        Some("-filter") => {
            let pattern = rest
                .get(1)
                .ok_or_else(|| anyhow!("missing pattern after -filter"))?;
            let action = rest
                .get(2)
                .and_then(|a| core_parse::stream::FilterAction::parse(a))
                .ok_or_else(|| anyhow!("missing or unrecognized -filter action"))?;
            let object = rest
                .get(3)
                .and_then(|o| core_parse::stream::FilterObject::parse(o))
                .ok_or_else(|| anyhow!("missing or unrecognized -filter object"))?;
            let reader = BlockReader::new(open_input(&opts)?, opts.reader_options());
            core_parse::stream::filter(reader, pattern, action, object, &mut out)?;
        }
        Some("-fetch") => {
            runs::run_fetch(&opts, open_input(&opts)?, &mut out)?;
        }
        Some(flag) if core_query::Level::parse(flag) == Some(core_query::Level::Pattern) => {
            let pattern = rest
                .get(1)
                .ok_or_else(|| anyhow!("missing pattern name after -pattern"))?
                .clone();
            let input = open_input(&opts)?;
            if opts.archive.is_some() || opts.stash.is_some() {
                runs::run_archive(&opts, &pattern, input, &mut out)?;
            } else if let Some(spec) = opts.index.clone() {
                runs::run_index(&opts, &spec, &pattern, input, &mut out)?;
            } else {
                runs::run_extraction(&opts, &rest, input, &mut out)?;
            }
        }
        Some(other) => bail!("unknown command '{other}'"),
        None => {
            if opts.trie {
                runs::run_trie(open_input(&opts)?, opts.gzip, &mut out)?;
            } else if let Some(root) = opts.posting.clone() {
                runs::run_posting(&root, open_input(&opts)?)?;
            } else if opts.archive.is_some() && opts.missing {
                runs::run_fetch(&opts, open_input(&opts)?, &mut out)?;
            } else {
                bail!("no command given; see tagsaw -help");
            }
        }
    }
    out.flush()?;
    Ok(())
}
