//! Global option parsing.
//!
//! Global options come before the verb and tune the whole run; everything
//! from the first unrecognized flag onward is handed to the verb
//! dispatcher untouched (the extraction compiler owns its own grammar,
//! including user-named variable flags like `-ACC`).

use anyhow::{anyhow, bail, Result};
use core_parse::BuildOptions;
use core_split::ReaderOptions;
use core_text::{MarkupPolicy, ScriptShift};
use std::path::PathBuf;

#[derive(Debug, Default, Clone)]
pub struct GlobalOptions {
    pub procs: Option<usize>,
    pub cons: Option<f64>,
    pub serv: Option<usize>,
    pub chan: Option<usize>,
    pub heap: Option<usize>,
    pub farm: Option<usize>,
    pub input: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub index: Option<String>,
    pub archive: Option<PathBuf>,
    pub stash: Option<PathBuf>,
    pub skip: Option<PathBuf>,
    pub posting: Option<PathBuf>,
    pub phrase: Option<String>,
    pub gzip: bool,
    pub hash: bool,
    pub trie: bool,
    pub markup: MarkupPolicy,
    pub scripts: Option<ScriptShift>,
    pub accent: bool,
    pub ascii: bool,
    pub compress: bool,
    pub spaces: bool,
    pub prepare: Option<Prepare>,
    pub ignore: Option<String>,
    pub missing: bool,
    pub head: Option<String>,
    pub tail: Option<String>,
    pub hd: Option<String>,
    pub tl: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prepare {
    Release,
    Report,
}

impl GlobalOptions {
    pub fn reader_options(&self) -> ReaderOptions {
        ReaderOptions {
            compress_spaces: self.compress,
            cleanup_spaces: self.spaces,
            html_aware: self.markup == MarkupPolicy::Mixed,
        }
    }

    pub fn build_options(&self) -> BuildOptions {
        BuildOptions {
            markup: self.markup,
            accent: self.accent,
            ascii: self.ascii,
            scripts: self.scripts,
        }
    }

    /// Worker count: `-cons` scales `-proc` the way the original exposed
    /// its consumer ratio.
    pub fn workers(&self, configured: usize) -> usize {
        let base = self.procs.unwrap_or(configured);
        match self.cons {
            Some(ratio) if ratio > 0.0 => ((base as f64 * ratio).round() as usize).max(1),
            _ => base.max(1),
        }
    }
}

fn take_value<'a>(
    args: &'a [String],
    idx: &mut usize,
    flag: &str,
) -> Result<&'a str> {
    *idx += 1;
    args.get(*idx)
        .map(|s| s.as_str())
        .ok_or_else(|| anyhow!("missing value after {flag}"))
}

fn parse_number<T: std::str::FromStr>(value: &str, flag: &str) -> Result<T> {
    value
        .parse::<T>()
        .map_err(|_| anyhow!("non-numeric value '{value}' after {flag}"))
}

/// Split the argument vector into global options and the verb remainder.
pub fn parse_globals(args: &[String]) -> Result<(GlobalOptions, Vec<String>)> {
    let mut opts = GlobalOptions::default();
    let mut idx = 0;
    while idx < args.len() {
        let flag = args[idx].as_str();
        match flag {
            "-proc" => opts.procs = Some(parse_number(take_value(args, &mut idx, flag)?, flag)?),
            "-cons" => opts.cons = Some(parse_number(take_value(args, &mut idx, flag)?, flag)?),
            "-serv" => opts.serv = Some(parse_number(take_value(args, &mut idx, flag)?, flag)?),
            "-chan" => opts.chan = Some(parse_number(take_value(args, &mut idx, flag)?, flag)?),
            "-heap" => opts.heap = Some(parse_number(take_value(args, &mut idx, flag)?, flag)?),
            "-farm" => opts.farm = Some(parse_number(take_value(args, &mut idx, flag)?, flag)?),
            "-gogc" => {
                // Accepted for script compatibility; there is no collector
                // to tune here.
                let value = take_value(args, &mut idx, flag)?;
                tracing::debug!(target: "runtime", value, "-gogc ignored");
            }
            "-input" => opts.input = Some(PathBuf::from(take_value(args, &mut idx, flag)?)),
            "-config" => opts.config = Some(PathBuf::from(take_value(args, &mut idx, flag)?)),
            "-index" => opts.index = Some(take_value(args, &mut idx, flag)?.to_string()),
            "-archive" => opts.archive = Some(PathBuf::from(take_value(args, &mut idx, flag)?)),
            "-stash" => opts.stash = Some(PathBuf::from(take_value(args, &mut idx, flag)?)),
            "-skip" => opts.skip = Some(PathBuf::from(take_value(args, &mut idx, flag)?)),
            "-posting" => opts.posting = Some(PathBuf::from(take_value(args, &mut idx, flag)?)),
            "-phrase" => opts.phrase = Some(take_value(args, &mut idx, flag)?.to_string()),
            "-gzip" => opts.gzip = true,
            "-hash" => opts.hash = true,
            "-trie" => opts.trie = true,
            "-flag" => {
                opts.markup = match take_value(args, &mut idx, flag)? {
                    "strict" => MarkupPolicy::Strict,
                    "mixed" => MarkupPolicy::Mixed,
                    "none" => MarkupPolicy::None,
                    other => bail!("unrecognized -flag value '{other}'"),
                }
            }
            "-strict" => opts.markup = MarkupPolicy::Strict,
            "-mixed" => opts.markup = MarkupPolicy::Mixed,
            "-accent" => opts.accent = true,
            "-ascii" => opts.ascii = true,
            "-scripts" => opts.scripts = Some(ScriptShift::Plain),
            "-compress" => opts.compress = true,
            "-spaces" => opts.spaces = true,
            "-prepare" => {
                opts.prepare = Some(match take_value(args, &mut idx, flag)? {
                    "release" => Prepare::Release,
                    "report" => Prepare::Report,
                    other => bail!("unrecognized -prepare value '{other}'"),
                })
            }
            "-ignore" => opts.ignore = Some(take_value(args, &mut idx, flag)?.to_string()),
            "-missing" => opts.missing = true,
            "-head" => opts.head = Some(unquote(take_value(args, &mut idx, flag)?)),
            "-tail" => opts.tail = Some(unquote(take_value(args, &mut idx, flag)?)),
            "-hd" => opts.hd = Some(unquote(take_value(args, &mut idx, flag)?)),
            "-tl" => opts.tl = Some(unquote(take_value(args, &mut idx, flag)?)),
            _ => break,
        }
        idx += 1;
    }
    Ok((opts, args[idx..].to_vec()))
}

/// `-head`/`-tail` operands interpret the same backslash escapes the
/// extraction literals do.
fn unquote(value: &str) -> String {
    value
        .replace("\\n", "\n")
        .replace("\\t", "\t")
        .replace("\\r", "\r")
}
