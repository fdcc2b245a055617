//! Release and collection fan-out
//!
//! Release workers are plain OS threads on purpose: the point is to have
//! several threads blocked inside the kernel write syscall at the same
//! instant, which a cooperative scheduler cannot provide. Collection only
//! starts once every release worker has been joined, so write pressure and
//! read pressure never interleave.

use std::cmp::{max, min};
use std::str::from_utf8;
use std::sync::{Arc, Mutex};
use std::sync::mpsc::channel;
use std::thread;
use std::time::Duration;

use cookie::{Cookie, CookieJar};

use chunk::chunk_evenly;
use errors::Error;
use parser;
use prime::PendingEntry;
use response::{Response, STATUS_FAILED};

fn merge_cookies(jar: &Mutex<CookieJar>, headers: &[(String, Vec<u8>)]) {
    for &(ref name, ref value) in headers {
        if !name.eq_ignore_ascii_case("Set-Cookie") {
            continue;
        }
        match from_utf8(value).ok()
            .ok_or(())
            .and_then(|text| Cookie::parse(text.to_string()).map_err(|_| ()))
        {
            Ok(parsed) => {
                jar.lock().unwrap().add(parsed);
            }
            Err(()) => debug!("ignoring unparseable Set-Cookie header"),
        }
    }
}

fn release_entry(entry: &mut PendingEntry) {
    if let Err(e) = entry.conn.release(&entry.tail) {
        warn!("releasing {} {} failed: {}",
            entry.request.method, entry.request.url, e);
        entry.response.fail(&e);
    }
}

fn collect_entry(entry: &mut PendingEntry, jar: &Mutex<CookieJar>) {
    if entry.response.status() == STATUS_FAILED {
        // the release already failed, there is nothing to read
        return;
    }
    match parser::read_response(&mut entry.conn, entry.request.is_head()) {
        Ok(raw) => {
            merge_cookies(jar, &raw.headers);
            entry.response.materialize(raw);
            entry.conn.mark_collected();
        }
        Err(e) => {
            warn!("collecting {} {} failed: {}",
                entry.request.method, entry.request.url, e);
            entry.response.fail(&e);
        }
    }
    entry.conn.close();
}

/// Run `work` over every group on its own thread and join them in order.
///
/// With a timeout, each join waits at most that long (the same semantics as
/// joining OS threads one by one with a per-join bound). A worker that
/// misses its deadline keeps running detached; its entries are lost to the
/// next phase and their placeholders stay unfinished, which is the caller's
/// indication of the hang.
fn fan_out<F>(groups: Vec<Vec<PendingEntry>>, phase: &'static str,
    timeout: Option<Duration>, work: F)
    -> Vec<Vec<PendingEntry>>
    where F: Fn(&mut Vec<PendingEntry>) + Send + Sync + 'static
{
    let work = Arc::new(work);
    let mut receivers = Vec::with_capacity(groups.len());
    for (index, group) in groups.into_iter().enumerate() {
        let (done_tx, done_rx) = channel();
        let work = work.clone();
        thread::Builder::new()
            .name(format!("race-{}-{}", phase, index))
            .spawn(move || {
                let mut group = group;
                (*work)(&mut group);
                // fails if the join below already gave up on us
                let _ = done_tx.send(group);
            })
            .expect("failed to spawn worker thread");
        receivers.push(done_rx);
    }

    let mut finished = Vec::with_capacity(receivers.len());
    for (index, done_rx) in receivers.into_iter().enumerate() {
        let result = match timeout {
            Some(t) => done_rx.recv_timeout(t).map_err(|_| ()),
            None => done_rx.recv().map_err(|_| ()),
        };
        match result {
            Ok(group) => finished.push(group),
            Err(()) => {
                warn!("{} worker {} did not finish in time; \
                    its responses are left unfinished", phase, index);
            }
        }
    }
    finished
}

/// Release every pending tail in parallel, then collect every response.
pub fn finish_all(entries: Vec<PendingEntry>, worker_cap: Option<usize>,
    warmup: Duration, timeout: Option<Duration>,
    jar: &Arc<Mutex<CookieJar>>)
{
    if entries.is_empty() {
        return;
    }
    let count = entries.len();
    let workers = match worker_cap {
        Some(cap) => max(1, min(cap, count)),
        None => count,
    };
    let groups = chunk_evenly(entries, workers);
    debug!("releasing {} requests on {} workers", count, workers);

    // Freshly spawned threads dispatch measurably less synchronously than
    // warmed-up ones; the pause also lets connect-time work drain before
    // the timing-sensitive writes.
    thread::sleep(warmup);

    let groups = fan_out(groups, "release", timeout, |group| {
        for entry in group.iter_mut() {
            release_entry(entry);
        }
    });

    let collect_jar = jar.clone();
    fan_out(groups, "collect", timeout, move |group| {
        for entry in group.iter_mut() {
            collect_entry(entry, &collect_jar);
        }
    });
}

/// Release and collect a single request right away, without threads.
///
/// This is the conventional-client path; errors are returned instead of
/// being folded into the placeholder.
pub fn finish_entry(mut entry: PendingEntry, jar: &Mutex<CookieJar>)
    -> Result<Response, Error>
{
    entry.conn.release(&entry.tail)?;
    let raw = match parser::read_response(
        &mut entry.conn, entry.request.is_head())
    {
        Ok(raw) => raw,
        Err(e) => {
            entry.conn.close();
            return Err(e);
        }
    };
    merge_cookies(jar, &raw.headers);
    entry.response.materialize(raw);
    entry.conn.mark_collected();
    entry.conn.close();
    Ok(entry.response)
}
