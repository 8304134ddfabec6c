use log::LevelFilter;

/// Logging verbosity, set explicitly by the caller (the CLI maps `--quiet`
/// and `--verbose` onto this). Deliberately not a hidden global flag read
/// from an env var somewhere deep in the call stack — the level is threaded
/// through one call to [`init`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Quiet,
    Normal,
    Verbose,
}

impl LogLevel {
    fn filter(self) -> LevelFilter {
        match self {
            LogLevel::Quiet => LevelFilter::Error,
            LogLevel::Normal => LevelFilter::Info,
            LogLevel::Verbose => LevelFilter::Debug,
        }
    }
}

/// Initializes the global logger once, at `level`. Safe to call more than
/// once; subsequent calls are no-ops (matches `env_logger`'s own contract).
pub fn init(level: LogLevel) {
    use env_logger::Env;

    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
    builder.filter_level(level.filter());
    if level != LogLevel::Verbose {
        builder.format_timestamp_secs();
    }
    let _ = builder.try_init();
}
