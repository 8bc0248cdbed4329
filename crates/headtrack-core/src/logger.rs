//! Stderr logging for tracking runs.
//!
//! Lines look like `[  0.412s  WARN #17 tracker] too few markers found ...`:
//! elapsed time, level, the frame being processed (see [`set_log_frame`]) and
//! the emitting module with the `headtrack` prefix dropped. Records from the
//! headtrack crates pass at the installed level, everything else is capped at
//! `Warn`.

use std::fmt::Display;
use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

use log::{Level, LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::fmt::format::FmtSpan;
#[cfg(feature = "tracing")]
use tracing_subscriber::util::SubscriberInitExt;
#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt, EnvFilter};

const NO_FRAME: usize = usize::MAX;

static FRAME: AtomicUsize = AtomicUsize::new(NO_FRAME);
static LOGGER: OnceLock<TrackLogger> = OnceLock::new();

struct TrackLogger {
    level: LevelFilter,
    started: Instant,
}

impl Log for TrackLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= level_for(metadata.target(), self.level)
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let _ = render(
            &mut io::stderr().lock(),
            self.started.elapsed().as_secs_f64(),
            record.level(),
            current_frame(),
            record.target(),
            record.args(),
        );
    }

    fn flush(&self) {
        let _ = io::stderr().flush();
    }
}

/// Tag subsequent log lines with a frame index; `None` removes the tag.
pub fn set_log_frame(index: Option<usize>) {
    FRAME.store(index.unwrap_or(NO_FRAME), Ordering::Relaxed);
}

fn current_frame() -> Option<usize> {
    Some(FRAME.load(Ordering::Relaxed)).filter(|&i| i != NO_FRAME)
}

fn level_for(target: &str, level: LevelFilter) -> LevelFilter {
    if target.starts_with("headtrack") {
        level
    } else {
        level.min(LevelFilter::Warn)
    }
}

/// `headtrack::tracker` -> `tracker`, `headtrack_core::conic` -> `core::conic`.
fn short_target(target: &str) -> &str {
    target
        .strip_prefix("headtrack::")
        .or_else(|| target.strip_prefix("headtrack_"))
        .unwrap_or(target)
}

fn render(
    out: &mut impl Write,
    elapsed: f64,
    level: Level,
    frame: Option<usize>,
    target: &str,
    msg: impl Display,
) -> io::Result<()> {
    write!(out, "[{elapsed:7.3}s {level:>5}")?;
    if let Some(i) = frame {
        write!(out, " #{i}")?;
    }
    writeln!(out, " {}] {msg}", short_target(target))
}

/// Install the stderr logger with the provided level filter.
///
/// Calling this more than once is a no-op after the first successful
/// initialization.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_none() {
        let logger = LOGGER.get_or_init(|| TrackLogger {
            level,
            started: Instant::now(),
        });
        log::set_logger(logger)?;
        log::set_max_level(level);
    }
    Ok(())
}

/// Install a `tracing` subscriber and route `log` records into it.
///
/// `RUST_LOG` overrides the default filter, which mirrors the stderr logger:
/// headtrack crates at `info`, everything else at `warn`.
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool) {
    let _ = tracing_log::LogTracer::init();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,headtrack=info,headtrack_core=info"));
    let builder = fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE);
    if json {
        let _ = builder.json().flatten_event(true).finish().try_init();
    } else {
        let _ = builder
            .with_timer(fmt::time::Uptime::default())
            .finish()
            .try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(level: Level, frame: Option<usize>, target: &str, msg: &str) -> String {
        let mut buf = Vec::new();
        render(&mut buf, 1.5, level, frame, target, msg).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn lines_carry_frame_and_short_target() {
        assert_eq!(
            line(Level::Warn, Some(17), "headtrack::tracker", "too few markers"),
            "[  1.500s  WARN #17 tracker] too few markers\n"
        );
        assert_eq!(
            line(Level::Debug, None, "headtrack_core::conic", "fit"),
            "[  1.500s DEBUG core::conic] fit\n"
        );
        assert_eq!(
            line(Level::Info, None, "png::decoder", "chunk"),
            "[  1.500s  INFO png::decoder] chunk\n"
        );
    }

    #[test]
    fn foreign_targets_are_capped_at_warn() {
        assert_eq!(level_for("headtrack::extract", LevelFilter::Trace), LevelFilter::Trace);
        assert_eq!(level_for("headtrack_cli", LevelFilter::Debug), LevelFilter::Debug);
        assert_eq!(level_for("image::codecs", LevelFilter::Debug), LevelFilter::Warn);
        assert_eq!(level_for("image::codecs", LevelFilter::Error), LevelFilter::Error);
    }

    #[test]
    fn frame_tag_can_be_cleared() {
        set_log_frame(Some(3));
        assert_eq!(current_frame(), Some(3));
        set_log_frame(None);
        assert_eq!(current_frame(), None);
    }
}
