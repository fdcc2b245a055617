//! A tiny blocking HTTP server for exercising the client end to end
//!
//! Every connection is served on its own thread, which matters: the client
//! holds several half-sent requests open at once and the timing test needs
//! the server to block in `read` on all of them simultaneously.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};

pub struct TestServer {
    pub addr: String,
}

pub fn start() -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    thread::spawn(move || {
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    thread::spawn(move || handle(stream));
                }
                Err(_) => break,
            }
        }
    });
    TestServer { addr: format!("127.0.0.1:{}", port) }
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|window| window == needle)
}

fn read_more(stream: &mut TcpStream, data: &mut Vec<u8>) -> bool {
    let mut buf = [0u8; 16384];
    match stream.read(&mut buf) {
        Ok(0) | Err(_) => false,
        Ok(n) => {
            data.extend_from_slice(&buf[..n]);
            true
        }
    }
}

fn read_chunked(stream: &mut TcpStream, mut raw: Vec<u8>) -> Vec<u8> {
    let mut decoded = Vec::new();
    let mut offset = 0;
    loop {
        let line_end = loop {
            match find(&raw[offset..], b"\r\n") {
                Some(pos) => break offset + pos,
                None => {
                    if !read_more(stream, &mut raw) {
                        return decoded;
                    }
                }
            }
        };
        let size_line = String::from_utf8_lossy(&raw[offset..line_end])
            .into_owned();
        let size_digits = size_line.split(';').next().unwrap().trim()
            .to_string();
        let size = usize::from_str_radix(&size_digits, 16).unwrap_or(0);
        offset = line_end + 2;
        if size == 0 {
            return decoded;
        }
        while raw.len() < offset + size + 2 {
            if !read_more(stream, &mut raw) {
                return decoded;
            }
        }
        decoded.extend_from_slice(&raw[offset..offset + size]);
        offset += size + 2;
    }
}

fn handle(mut stream: TcpStream) {
    let mut data = Vec::new();
    let head_end = loop {
        if let Some(pos) = find(&data, b"\r\n\r\n") {
            break pos + 4;
        }
        if !read_more(&mut stream, &mut data) {
            return;
        }
    };

    let head = String::from_utf8_lossy(&data[..head_end]).into_owned();
    let mut lines = head.split("\r\n");
    let request_line = lines.next().unwrap_or("");
    let mut parts = request_line.split(' ');
    let method = parts.next().unwrap_or("").to_string();
    let path = parts.next().unwrap_or("").to_string();
    let mut headers = Vec::new();
    for line in lines {
        if let Some(colon) = line.find(':') {
            headers.push((line[..colon].trim().to_string(),
                          line[colon + 1..].trim().to_string()));
        }
    }

    let header = |name: &str| {
        headers.iter()
            .find(|&&(ref n, _)| n.eq_ignore_ascii_case(name))
            .map(|&(_, ref v)| v.clone())
    };
    let rest = data[head_end..].to_vec();
    let body = if let Some(value) = header("Content-Length") {
        let total: usize = value.trim().parse().unwrap_or(0);
        let mut body = rest;
        while body.len() < total {
            if !read_more(&mut stream, &mut body) {
                break;
            }
        }
        body.truncate(total);
        body
    } else if header("Transfer-Encoding")
        .map(|v| v.eq_ignore_ascii_case("chunked")).unwrap_or(false)
    {
        read_chunked(&mut stream, rest)
    } else {
        Vec::new()
    };
    // body is echoed only at reasonable sizes, its length always
    let body_text = if body.len() <= 65536 {
        String::from_utf8_lossy(&body).into_owned()
    } else {
        String::new()
    };

    let time = SystemTime::now().duration_since(UNIX_EPOCH).unwrap();
    let time = time.as_secs() as f64 + time.subsec_nanos() as f64 * 1e-9;
    let (status, extra_headers, payload) = route(&path, json!({
        "time": time,
        "method": method,
        "path": path,
        "headers": headers.iter()
            .map(|&(ref n, ref v)| vec![n.clone(), v.clone()])
            .collect::<Vec<_>>(),
        "body": body_text,
        "body_len": body.len(),
    }));

    let payload = payload.to_string().into_bytes();
    let mut response = Vec::new();
    let reason = if status == 200 { "OK" } else { "Not Found" };
    write!(&mut response, "HTTP/1.1 {} {}\r\n", status, reason).unwrap();
    write!(&mut response, "Content-Type: application/json\r\n").unwrap();
    write!(&mut response, "Content-Length: {}\r\n", payload.len()).unwrap();
    for line in extra_headers {
        write!(&mut response, "{}\r\n", line).unwrap();
    }
    write!(&mut response, "Connection: close\r\n\r\n").unwrap();
    if method != "HEAD" {
        response.extend_from_slice(&payload);
    }
    let _ = stream.write_all(&response);
    let _ = stream.flush();
}

fn route(path: &str, echo: ::serde_json::Value)
    -> (u16, Vec<&'static str>, ::serde_json::Value)
{
    if path.starts_with("/does_not_exist") {
        (404, vec![], json!({}))
    } else if path.starts_with("/set_cookie") {
        (200, vec!["Set-Cookie: hello=world"], json!({"ok": true}))
    } else {
        (200, vec!["X-Hello: World"], echo)
    }
}
