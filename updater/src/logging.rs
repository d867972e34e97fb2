//! Logger setup for the updater binary.

use log::LevelFilter;

/// Map `-v` count and `-q` to a level filter.
///
/// Warnings are shown by default; `--quiet` keeps errors only.
#[must_use]
pub const fn level_filter(verbosity: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Error;
    }
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Initialise `env_logger` on stderr.
///
/// `RUST_LOG`, when set, refines or overrides the level chosen on the
/// command line. Calling this twice is harmless.
pub fn init_logging(verbosity: u8, quiet: bool) {
    let initialised = env_logger::Builder::new()
        .filter_level(level_filter(verbosity, quiet))
        .parse_default_env()
        .format_timestamp(None)
        .format_target(false)
        .try_init();
    if initialised.is_err() {
        // A logger is already installed; keep it.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::default(0, false, LevelFilter::Warn)]
    #[case::verbose(1, false, LevelFilter::Info)]
    #[case::debug(2, false, LevelFilter::Debug)]
    #[case::trace(5, false, LevelFilter::Trace)]
    #[case::quiet(0, true, LevelFilter::Error)]
    fn verbosity_maps_to_level(
        #[case] verbosity: u8,
        #[case] quiet: bool,
        #[case] expected: LevelFilter,
    ) {
        assert_eq!(level_filter(verbosity, quiet), expected);
    }
}
