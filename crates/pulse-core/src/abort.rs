// SPDX-License-Identifier: CEPL-1.0
use tracing::debug;

use crate::Failure;

/// Writes `message` to stderr and ends the process with status 1.
pub fn fatal(message: &str) -> ! {
    fatal_with_code(message, 1)
}

/// Reports an error chain and exits.
///
/// The exit status comes from the first [`Failure`] in the chain. Platform
/// failures already carry the OS error text captured when they were raised,
/// so it is printed as part of the chain.
pub fn report(err: &anyhow::Error) -> ! {
    let message = format!("{err:#}");
    match err.chain().find_map(|e| e.downcast_ref::<Failure>()) {
        Some(failure) => fatal_with_code(&message, failure.exit_code()),
        None => fatal(&message),
    }
}

fn fatal_with_code(message: &str, code: i32) -> ! {
    eprintln!("{message}");
    debug!(code, "aborting");
    std::process::exit(code)
}
