//! Timestamped console logging

use chrono::Local;

/// Print a timestamped message to stdout.
pub fn log(message: &str) {
    println!("{}: {}", Local::now().format("%Y-%m-%d %H:%M:%S"), message);
}

/// Print a timestamped warning to stderr.
pub fn warn(message: &str) {
    eprintln!(
        "{}: warning: {}",
        Local::now().format("%Y-%m-%d %H:%M:%S"),
        message
    );
}
