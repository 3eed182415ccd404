use std::thread;
use std::time::Duration;

use reqwest::blocking::{Client, ClientBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::error::KiraError;

pub fn user_agent() -> String {
    format!("kira-bu/{}", env!("CARGO_PKG_VERSION"))
}

/// Client builder with the crate user agent already set.
pub fn client_builder() -> Result<ClientBuilder, KiraError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(&user_agent()).map_err(|err| KiraError::Transport(err.to_string()))?,
    );
    Ok(Client::builder().default_headers(headers))
}

pub fn build_client(timeout: Duration) -> Result<Client, KiraError> {
    client_builder()?
        .timeout(timeout)
        .build()
        .map_err(|err| KiraError::Transport(err.to_string()))
}

pub fn handle_status(response: Response, service: &str) -> Result<Response, KiraError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let message = response
        .text()
        .ok()
        .filter(|body| !body.trim().is_empty())
        .unwrap_or_else(|| format!("{service} request failed"));
    Err(KiraError::TransportStatus { status, message })
}

/// Runs `op` up to `attempts` times, pausing between tries.
///
/// Only transport failures are retried; any other error is returned at once.
/// The last transport error is returned once every attempt has failed.
pub fn with_retries<T, F>(attempts: usize, pause: Duration, mut op: F) -> Result<T, KiraError>
where
    F: FnMut() -> Result<T, KiraError>,
{
    let attempts = attempts.max(1);
    let mut attempt = 1usize;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transport() && attempt < attempts => {
                tracing::debug!(attempt, attempts, error = %err, "retrying request");
                if !pause.is_zero() {
                    thread::sleep(pause);
                }
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn retries_until_success() {
        let calls = Cell::new(0);
        let value = with_retries(10, Duration::ZERO, || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(KiraError::Transport("connection reset".to_string()))
            } else {
                Ok(calls.get())
            }
        })
        .unwrap();
        assert_eq!(value, 3);
    }

    #[test]
    fn gives_up_after_attempts() {
        let calls = Cell::new(0);
        let err = with_retries(4, Duration::ZERO, || -> Result<(), KiraError> {
            calls.set(calls.get() + 1);
            Err(KiraError::TransportStatus {
                status: 503,
                message: "busy".to_string(),
            })
        })
        .unwrap_err();
        assert_eq!(calls.get(), 4);
        assert_matches!(err, KiraError::TransportStatus { status: 503, .. });
    }

    #[test]
    fn lookup_errors_are_not_retried() {
        let calls = Cell::new(0);
        let err = with_retries(10, Duration::ZERO, || -> Result<(), KiraError> {
            calls.set(calls.get() + 1);
            Err(KiraError::Lookup("nothing".to_string()))
        })
        .unwrap_err();
        assert_eq!(calls.get(), 1);
        assert_matches!(err, KiraError::Lookup(_));
    }
}
