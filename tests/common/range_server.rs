//! Minimal HTTP/1.1 fixture server supporting HEAD and ranged GET, used by
//! the integration tests in this directory to exercise the coordinator
//! against a real socket instead of mocking `reqwest`.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

#[derive(Debug, Clone, Copy)]
pub struct RangeServerOptions {
    /// If false, HEAD returns 405 (simulates servers that block HEAD).
    pub head_allowed: bool,
    /// If false, GET ignores Range and always returns 200 with the full body.
    pub support_ranges: bool,
    /// If false, omit `Accept-Ranges: bytes` even when ranges work.
    pub advertise_ranges: bool,
    /// If set, every ranged GET gets this status instead of 206 (S5: server
    /// refuses partial content).
    pub fail_ranged_with_status: Option<u16>,
}

impl Default for RangeServerOptions {
    fn default() -> Self {
        Self {
            head_allowed: true,
            support_ranges: true,
            advertise_ranges: true,
            fail_ranged_with_status: None,
        }
    }
}

/// Starts a server in a background thread serving `body`. Returns the base
/// URL, e.g. `http://127.0.0.1:PORT/file.bin`.
pub fn start(body: Vec<u8>) -> String {
    start_with_options(body, RangeServerOptions::default(), HashMap::new())
}

/// Like `start`, but the ranges in `flaky_ranges` (keyed by `(start, end)`)
/// drop the connection without writing a response on their first N attempts
/// (S6: transient mid-segment failure that later succeeds).
pub fn start_with_options(
    body: Vec<u8>,
    opts: RangeServerOptions,
    flaky_ranges: HashMap<(u64, u64), u32>,
) -> String {
    let (url, _) = start_counting(body, opts, flaky_ranges);
    url
}

/// Like `start_with_options`, additionally returning a shared counter of how
/// many GET requests (HEAD excluded) the server has handled — used to
/// confirm a resumed-to-completion sequential download issues no body GET.
pub fn start_counting(
    body: Vec<u8>,
    opts: RangeServerOptions,
    flaky_ranges: HashMap<(u64, u64), u32>,
) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let body = Arc::new(body);
    let flaky = Arc::new(Mutex::new(flaky_ranges));
    let get_count = Arc::new(AtomicUsize::new(0));
    let get_count2 = get_count.clone();
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let body = Arc::clone(&body);
            let flaky = Arc::clone(&flaky);
            let get_count = get_count2.clone();
            thread::spawn(move || handle(stream, &body, opts, &flaky, &get_count));
        }
    });
    (format!("http://127.0.0.1:{port}/file.bin"), get_count)
}

fn handle(
    mut stream: std::net::TcpStream,
    body: &[u8],
    opts: RangeServerOptions,
    flaky: &Mutex<HashMap<(u64, u64), u32>>,
    get_count: &AtomicUsize,
) {
    let _ = stream.set_read_timeout(Some(std::time::Duration::from_secs(5)));
    let _ = stream.set_write_timeout(Some(std::time::Duration::from_secs(5)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) => return,
        Ok(n) => n,
        Err(_) => return,
    };
    let request = match std::str::from_utf8(&buf[..n]) {
        Ok(s) => s,
        Err(_) => return,
    };
    let (method, range) = parse_request(request);
    let total = body.len() as u64;

    if method.eq_ignore_ascii_case("HEAD") {
        if !opts.head_allowed {
            let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\n\r\n");
            return;
        }
        let accept_ranges = if opts.advertise_ranges && opts.support_ranges {
            "Accept-Ranges: bytes\r\n"
        } else {
            ""
        };
        let response =
            format!("HTTP/1.1 200 OK\r\nContent-Length: {total}\r\n{accept_ranges}\r\n");
        let _ = stream.write_all(response.as_bytes());
        return;
    }

    if !method.eq_ignore_ascii_case("GET") {
        let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\n\r\n");
        return;
    }
    get_count.fetch_add(1, Ordering::SeqCst);

    if let Some((start, end_incl)) = range {
        let end_incl = end_incl.min(total.saturating_sub(1));

        if let Some(remaining) = flaky.lock().unwrap().get_mut(&(start, end_incl)) {
            if *remaining > 0 {
                *remaining -= 1;
                return; // drop the connection: simulates a transient failure
            }
        }

        if let Some(status) = opts.fail_ranged_with_status {
            let response = format!("HTTP/1.1 {status} Forbidden\r\nContent-Length: 0\r\n\r\n");
            let _ = stream.write_all(response.as_bytes());
            return;
        }

        if !opts.support_ranges {
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {total}\r\n\r\n"
            );
            let _ = stream.write_all(response.as_bytes());
            let _ = stream.write_all(body);
            return;
        }

        if start > end_incl || start >= total {
            let response = format!(
                "HTTP/1.1 416 Range Not Satisfiable\r\nContent-Range: bytes */{total}\r\n\r\n"
            );
            let _ = stream.write_all(response.as_bytes());
            return;
        }

        let slice = &body[start as usize..=end_incl as usize];
        let response = format!(
            "HTTP/1.1 206 Partial Content\r\nContent-Length: {}\r\nContent-Range: bytes {}-{}/{}\r\n\r\n",
            slice.len(),
            start,
            end_incl,
            total
        );
        let _ = stream.write_all(response.as_bytes());
        let _ = stream.write_all(slice);
        return;
    }

    if let Some(status) = opts.fail_ranged_with_status {
        let response = format!("HTTP/1.1 {status} Forbidden\r\nContent-Length: 0\r\n\r\n");
        let _ = stream.write_all(response.as_bytes());
        return;
    }

    let response = format!("HTTP/1.1 200 OK\r\nContent-Length: {total}\r\n\r\n");
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.write_all(body);
}

/// Returns (method, optional (start, end_inclusive) for `Range: bytes=X-Y`).
/// An open-ended range (`bytes=X-`) reports `end_inclusive = u64::MAX`; the
/// caller clamps it to `total - 1`.
fn parse_request(request: &str) -> (&str, Option<(u64, u64)>) {
    let mut method = "";
    let mut range = None;
    for line in request.lines() {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        if method.is_empty() {
            method = line.split_whitespace().next().unwrap_or("");
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("range") {
                let value = value.trim();
                if let Some(part) = value.to_lowercase().strip_prefix("bytes=") {
                    if let Some((a, b)) = part.split_once('-') {
                        let start = a.trim().parse::<u64>().unwrap_or(0);
                        let end = b.trim();
                        let end_incl = if end.is_empty() {
                            u64::MAX
                        } else {
                            end.parse::<u64>().unwrap_or(0)
                        };
                        range = Some((start, end_incl));
                    }
                }
            }
        }
    }
    (method, range)
}
