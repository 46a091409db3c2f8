/// Return early with a generic error built from a format string.
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::error::Error::from($crate::eyre::eyre!($($arg)*)))
    };
}

/// Abort on a broken internal invariant of the MIR builder. These are
/// programming errors, never user errors.
#[macro_export]
macro_rules! bug {
    ($($arg:tt)*) => {
        panic!("internal MIR builder error: {}", format_args!($($arg)*))
    };
}

/// Log a debug message
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        $crate::tracing::debug!($($arg)*)
    };
}

/// Log an info message
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::tracing::info!($($arg)*)
    };
}

/// Log a trace message
#[macro_export]
macro_rules! trace {
    ($($arg:tt)*) => {
        $crate::tracing::trace!($($arg)*)
    };
}
