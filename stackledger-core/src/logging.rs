use tracing::Level;

/// Install the fmt subscriber for a binary.
///
/// Quiet runs only report errors; verbose runs show progress at `verbose_level`.
pub fn init(verbose: bool, verbose_level: Level) {
    let level = if verbose { verbose_level } else { Level::ERROR };

    // A subscriber may already be installed (tests, embedding)
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init();
}
