//! Single-attempt HTTP download built on curl's Easy handle.

use std::cell::{Cell, RefCell};
use std::fs::File;
use std::io::Write;
use std::path::Path;

use curl::easy::Easy;

use crate::retry::FetchError;

const CONNECT_TIMEOUT_SECS: u64 = 30;
const MAX_REDIRECTS: u32 = 10;
// Abort transfers slower than 1 KiB/s for 30s; surfaces as a curl timeout.
const LOW_SPEED_LIMIT: u32 = 1024;
const LOW_SPEED_TIME_SECS: u64 = 30;

/// Downloads `url` into `dest` (truncating any partial file from a previous
/// attempt), invoking `on_progress(downloaded, total)` as body bytes arrive.
/// Returns the number of bytes written.
pub fn download<F>(
    url: &str,
    dest: &Path,
    size_hint: Option<u64>,
    mut on_progress: F,
) -> Result<u64, FetchError>
where
    F: FnMut(u64, Option<u64>),
{
    let file = File::create(dest).map_err(FetchError::Storage)?;
    let mut handle = Easy::new();
    handle.url(url).map_err(FetchError::Curl)?;
    handle.follow_location(true).map_err(FetchError::Curl)?;
    handle
        .max_redirections(MAX_REDIRECTS)
        .map_err(FetchError::Curl)?;
    handle
        .connect_timeout(std::time::Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .map_err(FetchError::Curl)?;
    handle
        .low_speed_limit(LOW_SPEED_LIMIT)
        .map_err(FetchError::Curl)?;
    handle
        .low_speed_time(std::time::Duration::from_secs(LOW_SPEED_TIME_SECS))
        .map_err(FetchError::Curl)?;

    let content_length: Cell<Option<u64>> = Cell::new(None);
    let written: Cell<u64> = Cell::new(0);
    let file = RefCell::new(file);
    let write_error: RefCell<Option<std::io::Error>> = RefCell::new(None);

    {
        let mut transfer = handle.transfer();
        transfer
            .header_function(|header| {
                if let Ok(line) = std::str::from_utf8(header) {
                    let lower = line.to_ascii_lowercase();
                    if let Some(rest) = lower.strip_prefix("content-length:") {
                        if let Ok(len) = rest.trim().parse::<u64>() {
                            content_length.set(Some(len));
                        }
                    }
                }
                true
            })
            .map_err(FetchError::Curl)?;
        transfer
            .write_function(|data| {
                if let Err(e) = file.borrow_mut().write_all(data) {
                    *write_error.borrow_mut() = Some(e);
                    // Returning a short write aborts the transfer.
                    return Ok(0);
                }
                written.set(written.get() + data.len() as u64);
                on_progress(written.get(), content_length.get().or(size_hint));
                Ok(data.len())
            })
            .map_err(FetchError::Curl)?;
        transfer.perform().map_err(|e| {
            if let Some(io_err) = write_error.borrow_mut().take() {
                FetchError::Storage(io_err)
            } else {
                FetchError::Curl(e)
            }
        })?;
    }

    let code = handle.response_code().map_err(FetchError::Curl)?;
    if !(200..300).contains(&code) {
        return Err(FetchError::Http(code));
    }

    let received = written.get();
    if let Some(expected) = content_length.get() {
        if received < expected {
            return Err(FetchError::Partial { expected, received });
        }
    }

    file.into_inner().flush().map_err(FetchError::Storage)?;
    Ok(received)
}
