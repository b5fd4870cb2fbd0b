//! Macros and other utility code.

/// This should be used for every write to stdout.
#[macro_export]
macro_rules! write_to_stdout {
    ($($arg:tt)*) => ({
        use std::io::Write;
        match write!(std::io::stdout(), $($arg)*) {
            Ok(()) => (),
            // Nobody is listening anymore, logging is best effort.
            Err(ref err) if err.kind() == std::io::ErrorKind::BrokenPipe => (),
            Err(ref err) => panic!("{}", err),
        };
    })
}

/// Implementation of log.
#[macro_export]
macro_rules! _log {
    ($verbosity:expr, $level:expr, $($arg:tt)*) => {
        if $crate::config::ENABLE_LOGGING && $level <= $verbosity
        {
            $crate::write_to_stdout!("c  ");
            $crate::write_to_stdout!($($arg)*);
            $crate::write_to_stdout!("\n");
        }
    }
}

/// Print a formatted message if the verbosity of `$context` is at least `$level`.
///
/// `$context` is anything with an `options.verbosity` field, usually the
/// pool manager.
#[macro_export]
macro_rules! log {
    ($context:expr, $level:expr, $($arg:tt)*) => {
        $crate::_log!($context.options.verbosity, $level, $($arg)*)
    };
}

/// Print a warning to stdout with yellow font color.
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => ({
        let style = if $crate::output::is_a_tty() {
            $crate::ansi_term::Colour::Yellow.normal()
        } else {
            $crate::ansi_term::Style::default()
        };
        $crate::write_to_stdout!("c  {}", style.paint("WARNING: "));
        $crate::write_to_stdout!("{}\n", style.paint(&format!($($arg)*)));
    })
}

/// Print an error to stdout with red font color.
///
/// This never exits; the caller decides whether the phase is aborted.
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => ({
        let style = if $crate::output::is_a_tty() {
            $crate::ansi_term::Colour::Red.normal()
        } else {
            $crate::ansi_term::Style::default()
        };
        $crate::write_to_stdout!("c  {}", style.paint("ERROR: "));
        $crate::write_to_stdout!("{}\n", style.paint(&format!($($arg)*)));
    })
}

/// An assertion that can be switched off in `config`.
#[macro_export]
macro_rules! invariant {
    ($($arg:tt)*) => ({
        if $crate::config::CHECK_INVARIANTS {
            assert!($($arg)*);
        }
    })
}

/// Like invariant, but for preconditions.
#[macro_export]
macro_rules! requires {
    ($($arg:tt)*) => ({
        if $crate::config::CHECK_PRECONDITIONS {
            assert!($($arg)*);
        }
    })
}

/// Print to stdout, prefixed by "c ".
#[macro_export]
macro_rules! comment {
    ($($arg:tt)*) => ({
        $crate::write_to_stdout!("c ");
        $crate::write_to_stdout!($($arg)*);
        $crate::write_to_stdout!("\n");
    })
}
