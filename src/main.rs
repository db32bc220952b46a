use anyhow::Result;
use clap::{CommandFactory, Parser};
use recbz::config::{parse_file_config, ArchiveFormat, ConversionOptions};
use recbz::ops::{self, Mode, StdinChoiceReader};
use recbz::progress::init_logging;
use recbz::{profiles, report, Codec};
use std::path::PathBuf;

#[cfg(feature = "cli")]
use recbz::progress::ConsoleProgressReporter;
use recbz::progress::NoOpProgressReporter;

/// reCBZ - batch comic-archive repacker and analyzer
#[derive(Parser)]
#[command(name = "recbz")]
#[command(about = "Repack and analyze CBZ/ZIP comic archives")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Args {
    /// One or more archive paths
    pub paths: Vec<PathBuf>,

    /// Print the ranked codec comparison table, don't write anything
    #[arg(long, conflicts_with_all = ["assist", "auto", "join"])]
    pub compare: bool,

    /// Print ranked codecs and prompt for which one to repack with
    #[arg(short, long, conflicts_with_all = ["compare", "auto", "join"])]
    pub assist: bool,

    /// Repack with whichever codec analysis ranks smallest
    #[arg(short = 'A', long, conflicts_with_all = ["compare", "assist", "join"])]
    pub auto: bool,

    /// Join all given archives into one, chapter per input, before repacking
    #[arg(short = 'J', long, conflicts_with_all = ["compare", "assist", "auto"])]
    pub join: bool,

    /// Write output as CBZ (default)
    #[arg(long, conflicts_with_all = ["zip", "epub"])]
    pub cbz: bool,

    /// Write output as plain ZIP
    #[arg(long, conflicts_with_all = ["cbz", "epub"])]
    pub zip: bool,

    /// Write output as EPUB
    #[arg(long, conflicts_with_all = ["cbz", "zip"])]
    pub epub: bool,

    /// Deflate-compress the output ZIP/CBZ instead of storing pages raw
    #[arg(long)]
    pub compress: bool,

    /// Mark the EPUB as right-to-left reading order
    #[arg(long)]
    pub rtl: bool,

    /// Convert every page to this codec (jpeg, png, webp, webpll)
    #[arg(long, value_name = "FORMAT")]
    pub imgfmt: Option<String>,

    /// Output image quality, 1-100
    #[arg(long, value_name = "QUALITY")]
    pub quality: Option<u8>,

    /// Resize pages to WxH, preserving aspect ratio
    #[arg(long, value_name = "WxH")]
    pub size: Option<String>,

    /// Never upscale a page above its source size
    #[arg(long)]
    pub noup: bool,

    /// Never downscale a page below its source size
    #[arg(long)]
    pub nodown: bool,

    /// Convert every page to grayscale
    #[arg(long, conflicts_with = "color")]
    pub bw: bool,

    /// Force color, overriding a device profile's grayscale default
    #[arg(long, conflicts_with = "bw")]
    pub color: bool,

    /// Exclude WebP (lossy and lossless) from codec analysis and --auto
    #[arg(long)]
    pub nowebp: bool,

    /// Number of worker threads (default: all but one core)
    #[arg(long, value_name = "N", conflicts_with = "sequential")]
    pub process: Option<usize>,

    /// Convert pages one at a time instead of with a worker pool
    #[arg(long, conflicts_with = "process")]
    pub sequential: bool,

    /// Increase log verbosity (repeatable: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, conflicts_with = "silent")]
    pub verbose: u8,

    /// Suppress progress output (errors still print)
    #[arg(short, long, conflicts_with = "verbose")]
    pub silent: bool,

    /// Analyze and report, but don't write the output archive
    #[arg(short = 'n', long = "nowrite")]
    pub nowrite: bool,

    /// Overwrite the source archive instead of writing beside it
    #[arg(short = 'O', long)]
    pub overwrite: bool,

    /// Write the output archive even if some pages failed to convert
    #[arg(short = 'F', long)]
    pub force: bool,

    /// Skip archives already carrying the reCBZ repack marker
    #[arg(long)]
    pub noprev: bool,

    /// Apply a device profile's size/grayscale/output defaults
    #[arg(short = 'p', long, value_name = "PROFILE")]
    pub profile: Option<String>,

    /// List all known device profiles and exit
    #[arg(long)]
    pub profiles: bool,

    /// Load a TOML config file; with no path, print the effective config and exit
    #[arg(long, num_args = 0..=1, default_missing_value = "", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Write a JSON/CSV/HTML run report
    #[arg(long, value_name = "FORMAT")]
    pub report: Option<String>,
}

fn main() -> Result<()> {
    if std::env::args().len() == 1 {
        Args::command().print_help()?;
        println!();
        std::process::exit(ops::EXIT_USAGE_OR_INTERRUPT);
    }

    let args = Args::parse();
    init_logging(args.verbose, args.silent);

    if args.profiles {
        for line in profiles::list_display() {
            println!("{line}");
        }
        return Ok(());
    }

    let mut options = ConversionOptions::default();

    if let Some(config_arg) = &args.config {
        if config_arg.as_os_str().is_empty() {
            println!("{options:#?}");
            return Ok(());
        }
        let contents = std::fs::read_to_string(config_arg)?;
        let file_config = parse_file_config(&contents)?;
        options = options.apply_file(&file_config);
    }

    if let Some(nickname) = &args.profile {
        let profile = profiles::lookup(nickname)?;
        options = options.apply_profile(profile);
    }

    apply_cli_overrides(&mut options, &args)?;

    let mode = if args.compare {
        Mode::Compare
    } else if args.assist {
        Mode::Assist
    } else if args.auto {
        Mode::Auto
    } else if args.join {
        Mode::Join
    } else {
        Mode::Repack
    };

    if args.paths.is_empty() {
        eprintln!("error: at least one archive path is required");
        std::process::exit(ops::EXIT_USAGE_OR_INTERRUPT);
    }
    for path in &args.paths {
        if path.is_dir() {
            eprintln!(
                "error: {} is a directory, expected an archive file",
                path.display()
            );
            std::process::exit(ops::EXIT_USAGE_OR_INTERRUPT);
        }
    }

    #[cfg(feature = "cli")]
    let console_reporter = ConsoleProgressReporter::new();
    let noop_reporter = NoOpProgressReporter;
    #[cfg(feature = "cli")]
    let progress: &dyn recbz::ProgressReporter = if options.silent {
        &noop_reporter
    } else {
        &console_reporter
    };
    #[cfg(not(feature = "cli"))]
    let progress: &dyn recbz::ProgressReporter = &noop_reporter;

    let mut choice_reader = StdinChoiceReader;
    let (exit_code, run_report) =
        ops::run(&args.paths, mode, options, progress, &mut choice_reader)?;

    if mode != Mode::Compare {
        for outcome in &run_report.archives {
            println!(
                "{}: {} -> {} ({})",
                outcome.source_path.display(),
                humansize::format_size(outcome.original_size, humansize::DECIMAL),
                humansize::format_size(outcome.compressed_size, humansize::DECIMAL),
                outcome.pct_change(),
            );
            if outcome.aborted {
                println!("  aborted: {} page(s) failed to convert", outcome.bad_file_count);
            } else {
                println!("  {} page(s)", outcome.page_count);
            }
        }
        println!(
            "{} archive(s), {} aborted, {}",
            run_report.archive_count,
            run_report.aborted_count,
            recbz::util::format_duration(run_report.duration),
        );
    }

    if let Some(fmt_name) = &args.report {
        let format = report::ReportFormat::from_name(fmt_name)
            .ok_or_else(|| anyhow::anyhow!("'{fmt_name}': invalid report format"))?;
        let path = report::generate_report(&run_report, format)?;
        println!("report written to {}", path.display());
    }

    std::process::exit(exit_code);
}

fn apply_cli_overrides(options: &mut ConversionOptions, args: &Args) -> Result<()> {
    if args.cbz {
        options.archive_format = ArchiveFormat::Cbz;
    } else if args.zip {
        options.archive_format = ArchiveFormat::Zip;
    } else if args.epub {
        options.archive_format = ArchiveFormat::Epub;
    }

    if args.compress {
        options.compress_zip = true;
    }
    if args.rtl {
        options.right_to_left = true;
    }

    if let Some(name) = &args.imgfmt {
        options.img_format = Some(Codec::from_name(name)?);
    }
    if let Some(quality) = args.quality {
        options.img_quality = quality;
    }
    if let Some(size) = &args.size {
        options.img_size = parse_size(size)?;
    }
    if args.noup {
        options.no_upscale = true;
    }
    if args.nodown {
        options.no_downscale = true;
    }
    if args.bw {
        options.grayscale = true;
    }
    if args.color {
        options.grayscale = false;
    }
    if args.nowebp {
        options.blacklisted_fmts = "webp webpll".to_string();
    }

    if let Some(n) = args.process {
        options.processes = n.max(1);
    }
    if args.sequential {
        options.processes = 1;
    }

    options.verbosity = args.verbose;
    if args.silent {
        options.silent = true;
    }
    if args.nowrite {
        options.no_write = true;
    }
    if args.overwrite {
        options.overwrite = true;
    }
    if args.force {
        options.force_write = true;
    }
    if args.noprev {
        options.noprev = true;
    }

    Ok(())
}

fn parse_size(raw: &str) -> Result<(u32, u32)> {
    let (w, h) = raw
        .split_once('x')
        .or_else(|| raw.split_once('X'))
        .ok_or_else(|| anyhow::anyhow!("'{raw}': expected size as WxH"))?;
    Ok((w.parse()?, h.parse()?))
}
