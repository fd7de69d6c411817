//! Shared HTTP retry policy.
//!
//! All outbound calls are synchronous with a client-level timeout; transient
//! faults (connect errors, timeouts, 5xx) get a small fixed number of
//! retries with exponential backoff. Anything that survives the budget is
//! returned to the caller, which decides whether it is item-level or fatal.

use std::time::Duration;

use crate::error::{Result, SyncError};

const RETRY_BASE_DELAY: Duration = Duration::from_millis(250);

pub(crate) fn send_with_retry<F>(context: &str, retries: u32, request: F) -> Result<reqwest::blocking::Response>
where
    F: Fn() -> reqwest::blocking::RequestBuilder,
{
    let mut attempt: u32 = 0;
    loop {
        match request().send() {
            Ok(response) => {
                if response.status().is_server_error() && attempt < retries {
                    tracing::debug!(
                        context,
                        attempt,
                        status = response.status().as_u16(),
                        "transient engine fault, backing off"
                    );
                } else {
                    return Ok(response);
                }
            }
            Err(err) => {
                if (err.is_timeout() || err.is_connect()) && attempt < retries {
                    tracing::debug!(context, attempt, error = %err, "transient fault, backing off");
                } else {
                    return Err(SyncError::Engine {
                        reason: format!("{context}: {err}"),
                    });
                }
            }
        }
        std::thread::sleep(RETRY_BASE_DELAY * 2u32.pow(attempt));
        attempt += 1;
    }
}
