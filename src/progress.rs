//! Logging & Progress (C12): a `ProgressReporter` abstraction so a
//! non-interactive caller (tests, `compare` mode) can supply a no-op
//! implementation while the CLI supplies an `indicatif`-backed console one.

/// Reports progress of a single archive's page conversion.
pub trait ProgressReporter: Send + Sync {
    fn set_total_pages(&self, total: usize);
    fn update_progress(&self, processed: usize, failed: usize);
    fn start_archive(&self, _name: &str) {}
    fn finish_archive(&self) {}
    fn report_page_error(&self, _page: &str, _error: &str) {}
}

pub struct NoOpProgressReporter;

impl ProgressReporter for NoOpProgressReporter {
    fn set_total_pages(&self, _total: usize) {}
    fn update_progress(&self, _processed: usize, _failed: usize) {}
}

#[cfg(feature = "cli")]
pub struct ConsoleProgressReporter {
    bar: indicatif::ProgressBar,
}

#[cfg(feature = "cli")]
impl Default for ConsoleProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "cli")]
impl ConsoleProgressReporter {
    pub fn new() -> Self {
        let bar = indicatif::ProgressBar::new(0);
        bar.set_style(
            indicatif::ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap()
                .progress_chars("#>-"),
        );
        Self { bar }
    }
}

#[cfg(feature = "cli")]
impl ProgressReporter for ConsoleProgressReporter {
    fn set_total_pages(&self, total: usize) {
        self.bar.set_length(total as u64);
    }

    fn update_progress(&self, processed: usize, failed: usize) {
        self.bar.set_position(processed as u64);
        if failed > 0 {
            self.bar.set_message(format!("{failed} failed"));
        }
    }

    fn start_archive(&self, name: &str) {
        self.bar.set_message(name.to_string());
    }

    fn finish_archive(&self) {
        self.bar.finish_and_clear();
    }

    fn report_page_error(&self, page: &str, error: &str) {
        self.bar.println(format!("[!] {page}: {error}"));
    }
}

/// Initialize `env_logger` at the level implied by `-v`/`-vv`/`-s`.
pub fn init_logging(verbosity: u8, silent: bool) {
    let level = if silent {
        log::LevelFilter::Error
    } else {
        match verbosity {
            0 => log::LevelFilter::Info,
            1 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    };
    let _ = env_logger::Builder::new().filter_level(level).try_init();
}
