//! Logger module
//!
//! Provides logging utilities for the file server including:
//! - Server lifecycle logging
//! - Per-request debug logging
//! - Error and warning logging
//! - File-based logging support

pub mod writer;

use crate::config::LoggingConfig;
use crate::pathspec::AliasMap;
use chrono::Local;
use std::net::SocketAddr;
use std::path::Path;

/// Initialize the logger with configuration
///
/// Should be called once at application startup.
pub fn init(config: &LoggingConfig) -> std::io::Result<()> {
    writer::init(
        config.access_log_file.as_deref(),
        config.error_log_file.as_deref(),
    )
}

fn stamp(message: &str) -> String {
    format!("{} {message}", Local::now().format("%Y-%m-%d %H:%M:%S"))
}

/// Write to info/access log
fn write_info(message: &str) {
    let line = stamp(message);
    match writer::get() {
        Some(w) => w.write_info(&line),
        None => println!("{line}"),
    }
}

/// Write to error log
fn write_error(message: &str) {
    let line = stamp(message);
    match writer::get() {
        Some(w) => w.write_error(&line),
        None => eprintln!("{line}"),
    }
}

pub fn log_server_start(addr: &SocketAddr, backend: &str, debug: bool) {
    write_info("======================================");
    write_info("File server started");
    write_info(&format!("Listening on: http://{addr}"));
    write_info(&format!("Backend: {backend}"));
    if debug {
        write_info("Request logging: enabled");
    }
    write_info("======================================");
}

/// Log every alias with its target, sorted by alias
pub fn log_aliases(aliases: &AliasMap) {
    for alias in aliases.aliases() {
        if let Some(target) = aliases.get(alias) {
            write_info(&format!("[Alias] /{alias} -> {}", target.display()));
        }
    }
}

pub fn log_archive(path: &Path, files: usize) {
    write_info(&format!(
        "[Archive] Serving {} ({files} files)",
        path.display()
    ));
}

pub fn log_request(uri: &hyper::Uri) {
    write_info(&request_line(uri));
}

fn request_line(uri: &hyper::Uri) -> String {
    format!("[Request] Request for \"{uri}\"")
}

pub fn log_info(message: &str) {
    write_info(&format!("[INFO] {message}"));
}

pub fn log_connection_error(err: &impl std::fmt::Debug) {
    write_error(&format!("[ERROR] Failed to serve connection: {err:?}"));
}

pub fn log_error(message: &str) {
    write_error(&format!("[ERROR] {message}"));
}

pub fn log_warning(message: &str) {
    write_error(&format!("[WARN] {message}"));
}

pub fn log_shutdown() {
    write_info("[Shutdown] Stopped accepting connections");
}
