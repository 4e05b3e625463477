//! Minimal HTTP/1.1 server serving fixed bodies by path, for integration
//! tests. Each path can be told to fail its first N requests with a 503 to
//! exercise the retry path.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;

struct Route {
    body: Vec<u8>,
    /// Remaining requests to fail with 503 before serving the body.
    fail_remaining: AtomicU32,
}

#[derive(Default)]
pub struct StreamServerBuilder {
    routes: HashMap<String, Route>,
}

impl StreamServerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` at `path` (e.g. "/v.mp4").
    pub fn route(mut self, path: &str, body: Vec<u8>) -> Self {
        self.routes.insert(
            path.to_string(),
            Route {
                body,
                fail_remaining: AtomicU32::new(0),
            },
        );
        self
    }

    /// Serve `body` at `path`, failing the first `failures` requests with 503.
    pub fn flaky_route(mut self, path: &str, body: Vec<u8>, failures: u32) -> Self {
        self.routes.insert(
            path.to_string(),
            Route {
                body,
                fail_remaining: AtomicU32::new(failures),
            },
        );
        self
    }

    /// Start the server in a background thread; returns the base URL without
    /// a trailing slash. The server runs until the process exits.
    pub fn start(self) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().unwrap().port();
        let routes = Arc::new(self.routes);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let routes = Arc::clone(&routes);
                thread::spawn(move || handle(stream, &routes));
            }
        });
        format!("http://127.0.0.1:{}", port)
    }
}

fn handle(mut stream: std::net::TcpStream, routes: &HashMap<String, Route>) {
    let _ = stream.set_read_timeout(Some(std::time::Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(std::time::Duration::from_secs(2)));
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
    let path = request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/");

    let Some(route) = routes.get(path) else {
        let _ = stream.write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n");
        return;
    };

    let remaining = route.fail_remaining.load(Ordering::SeqCst);
    if remaining > 0
        && route
            .fail_remaining
            .compare_exchange(remaining, remaining - 1, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    {
        let _ = stream.write_all(b"HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\n\r\n");
        return;
    }

    let header = format!(
        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n",
        route.body.len()
    );
    let _ = stream.write_all(header.as_bytes());
    let _ = stream.write_all(&route.body);
}
