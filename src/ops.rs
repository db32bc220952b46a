//! Top-level Operations (C9): `repack`, `compare`, `assist`, `auto`, `join`.
//!
//! Each operation takes one or more archive paths and returns a process
//! exit code per §6: 0 success, 1 usage/interrupt, 2 one or more archives
//! aborted.

use crate::analyzer::FmtSize;
use crate::archive::Archive;
use crate::cache::ScratchRoot;
use crate::config::{ArchiveFormat, ConversionOptions};
use crate::error::{RecbzError, Result};
use crate::progress::ProgressReporter;
use crate::report::{ArchiveOutcome, RunReport};
use chrono::Utc;
use humansize::{format_size, DECIMAL};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

pub const EXIT_OK: i32 = 0;
pub const EXIT_USAGE_OR_INTERRUPT: i32 = 1;
pub const EXIT_ABORTED: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Repack,
    Compare,
    Assist,
    Auto,
    Join,
}

/// Reads the user's numeric codec choice in `assist` mode. Production code
/// uses stdin; tests supply a canned reader.
pub trait ChoiceReader {
    fn read_choice(&mut self, max: usize) -> Result<usize>;
}

pub struct StdinChoiceReader;

impl ChoiceReader for StdinChoiceReader {
    fn read_choice(&mut self, max: usize) -> Result<usize> {
        use std::io::Write;
        loop {
            print!("Repack with which format? [1-{max}]: ");
            std::io::stdout().flush().ok();
            let mut line = String::new();
            std::io::stdin()
                .read_line(&mut line)
                .map_err(|e| RecbzError::Other(anyhow::anyhow!(e)))?;
            if line.is_empty() {
                return Err(RecbzError::WorkerPoolInterrupt);
            }
            match line.trim().parse::<usize>() {
                Ok(n) if n >= 1 && n <= max => return Ok(n - 1),
                _ => println!("Invalid choice, try again."),
            }
        }
    }
}

pub fn run(
    paths: &[PathBuf],
    mode: Mode,
    options: ConversionOptions,
    progress: &dyn ProgressReporter,
    choice_reader: &mut dyn ChoiceReader,
) -> Result<(i32, RunReport)> {
    let start_instant = Instant::now();
    let start_time = Utc::now();
    let root = ScratchRoot::create()?;

    let mut outcomes = Vec::new();
    let mut aborted_count = 0u64;
    let mut format_counts: HashMap<String, u64> = HashMap::new();
    let mut exit_code = EXIT_OK;

    if mode == Mode::Join {
        let outcome = run_join(paths, &root, options.clone(), progress)?;
        if outcome.aborted {
            aborted_count += 1;
            exit_code = EXIT_ABORTED;
        }
        outcomes.push(outcome);
    } else {
        for path in paths {
            let result = run_one(path, mode, &root, options.clone(), progress, choice_reader);
            match result {
                Ok(outcome) => {
                    if outcome.aborted {
                        aborted_count += 1;
                        exit_code = exit_code.max(EXIT_ABORTED);
                    }
                    for (name, count) in &outcome.codec_counts {
                        *format_counts.entry(name.clone()).or_insert(0) += count;
                    }
                    outcomes.push(outcome);
                }
                Err(RecbzError::WorkerPoolInterrupt) => {
                    return Err(RecbzError::WorkerPoolInterrupt);
                }
                Err(e) => {
                    progress.report_page_error(&path.display().to_string(), &e.to_string());
                    aborted_count += 1;
                    exit_code = exit_code.max(EXIT_ABORTED);
                }
            }
        }
    }

    let report = RunReport {
        start_time,
        end_time: Utc::now(),
        duration: start_instant.elapsed(),
        archive_count: outcomes.len() as u64,
        aborted_count,
        format_counts,
        archives: outcomes,
    };
    Ok((exit_code, report))
}

fn run_one(
    path: &Path,
    mode: Mode,
    root: &ScratchRoot,
    options: ConversionOptions,
    progress: &dyn ProgressReporter,
    choice_reader: &mut dyn ChoiceReader,
) -> Result<ArchiveOutcome> {
    let mut archive = Archive::new(path, root, options.clone())?;

    if options.noprev && archive.already_repacked().unwrap_or(false) {
        log::info!("{}: already repacked, skipping", path.display());
        let outcome = ArchiveOutcome {
            source_path: path.to_path_buf(),
            output_path: None,
            original_size: 0,
            compressed_size: 0,
            page_count: 0,
            bad_file_count: 0,
            aborted: false,
            errors: vec![],
            codec_counts: HashMap::new(),
        };
        archive.cleanup()?;
        return Ok(outcome);
    }

    let outcome = match mode {
        Mode::Repack => do_repack(&mut archive, progress, None),
        Mode::Compare => do_compare(&mut archive, progress),
        Mode::Auto => {
            let ranked = archive.compute_fmt_sizes()?;
            let best = ranked.get(1).ok_or_else(|| RecbzError::AbortedCompare {
                path: path.to_path_buf(),
            })?;
            let codec = crate::codec::Codec::from_name(&best.name)?;
            do_repack(&mut archive, progress, Some(codec))
        }
        Mode::Assist => {
            let ranked = archive.compute_fmt_sizes()?;
            print_ranked_table(&ranked);
            let choice = choice_reader.read_choice(ranked.len())?;
            if choice == 0 {
                do_repack(&mut archive, progress, None)
            } else {
                let codec = crate::codec::Codec::from_name(&ranked[choice].name)?;
                do_repack(&mut archive, progress, Some(codec))
            }
        }
        Mode::Join => unreachable!("handled by run_join"),
    };

    archive.cleanup()?;
    outcome
}

/// Tally converted pages by their final codec name, for the run-wide
/// format breakdown in the report.
fn tally_codecs(pages: &mut [crate::page::Page]) -> HashMap<String, u64> {
    let mut counts = HashMap::new();
    for page in pages.iter_mut() {
        if let Ok(fmt) = page.fmt() {
            *counts.entry(fmt.name().to_string()).or_insert(0) += 1;
        }
    }
    counts
}

fn do_repack(
    archive: &mut Archive,
    progress: &dyn ProgressReporter,
    fmt_override: Option<crate::codec::Codec>,
) -> Result<ArchiveOutcome> {
    let original_size: u64 = archive
        .fetch_pages()?
        .iter()
        .map(|p| std::fs::metadata(&p.path).map(|m| m.len()).unwrap_or(0))
        .sum();
    let page_count = archive.fetch_pages()?.len() as u64;
    progress.set_total_pages(page_count as usize);
    progress.start_archive(&archive.source_stem);

    archive.convert_pages(fmt_override, None, None, None)?;
    progress.update_progress(
        (page_count as usize).saturating_sub(archive.bad_files.len()),
        archive.bad_files.len(),
    );

    let errors: Vec<String> = archive
        .bad_files
        .iter()
        .map(|p| format!("{}: failed to convert", p.display()))
        .collect();
    let codec_counts = tally_codecs(archive.pages_mut());

    if !archive.bad_files.is_empty() && !archive.options.force_write {
        progress.finish_archive();
        return Ok(ArchiveOutcome {
            source_path: archive.source_path.clone(),
            output_path: None,
            original_size,
            compressed_size: 0,
            page_count,
            bad_file_count: archive.bad_files.len() as u64,
            aborted: true,
            errors,
            codec_counts,
        });
    }

    let outcome = if archive.options.no_write {
        ArchiveOutcome {
            source_path: archive.source_path.clone(),
            output_path: None,
            original_size,
            compressed_size: 0,
            page_count,
            bad_file_count: archive.bad_files.len() as u64,
            aborted: false,
            errors,
            codec_counts,
        }
    } else {
        let dest = archive.write_archive(archive.options.archive_format, None)?;
        let compressed_size = std::fs::metadata(&dest).map(|m| m.len()).unwrap_or(0);
        ArchiveOutcome {
            source_path: archive.source_path.clone(),
            output_path: Some(dest),
            original_size,
            compressed_size,
            page_count,
            bad_file_count: archive.bad_files.len() as u64,
            aborted: false,
            errors,
            codec_counts,
        }
    };

    progress.finish_archive();
    Ok(outcome)
}

fn do_compare(archive: &mut Archive, progress: &dyn ProgressReporter) -> Result<ArchiveOutcome> {
    progress.start_archive(&archive.source_stem);
    let ranked = archive.compute_fmt_sizes()?;
    print_ranked_table(&ranked);
    progress.finish_archive();
    let codec_counts: HashMap<String, u64> = ranked
        .iter()
        .skip(1)
        .map(|r| (r.name.clone(), 1))
        .collect();
    Ok(ArchiveOutcome {
        source_path: archive.source_path.clone(),
        output_path: None,
        original_size: ranked.first().map(|r| r.bytes).unwrap_or(0),
        compressed_size: ranked.get(1).map(|r| r.bytes).unwrap_or(0),
        page_count: 0,
        bad_file_count: 0,
        aborted: false,
        errors: vec![],
        codec_counts,
    })
}

fn print_ranked_table(ranked: &[FmtSize]) {
    for (i, entry) in ranked.iter().enumerate() {
        println!(
            "{:>2}. {:<28} {}",
            i,
            entry.desc,
            format_size(entry.bytes, DECIMAL)
        );
    }
}

fn run_join(
    paths: &[PathBuf],
    root: &ScratchRoot,
    options: ConversionOptions,
    progress: &dyn ProgressReporter,
) -> Result<ArchiveOutcome> {
    let (first, rest) = paths
        .split_first()
        .ok_or_else(|| RecbzError::Other(anyhow::anyhow!("join requires at least one archive")))?;

    let mut primary = Archive::new(first, root, options.clone())?;
    primary.fetch_pages()?;

    let mut secondaries = Vec::new();
    for path in rest {
        let mut secondary = Archive::new(path, root, options.clone())?;
        secondary.fetch_pages()?;
        secondaries.push(secondary);
    }
    for secondary in secondaries.iter_mut() {
        primary.add_chapter(secondary, None, None)?;
    }

    let outcome = do_repack(&mut primary, progress, None);
    for secondary in &secondaries {
        let _ = secondary.cleanup();
    }
    primary.cleanup()?;
    outcome
}
