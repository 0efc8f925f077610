//! Bounded, randomized-priority URL queue driving the crawler's dispatch
//! loop.
//!
//! Each `put` draws a uniform random priority so that adjacent outlinks from
//! one page don't monopolize worker attention the way a plain FIFO would.
//! The queue is hard-capped so memory stays bounded on a breadth-unbounded
//! crawl; once full, `put` sheds the incoming URL silently rather than
//! blocking or growing.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::{Condvar, Mutex};

use rand::Rng;
use url::Url;

/// Hard cap on the number of pending URLs. Chosen to bound memory, not to
/// reflect any expectation about crawl size.
pub const Q_MAX: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    priority: u32,
    url: Url,
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| self.url.as_str().cmp(other.url.as_str()))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

struct State {
    heap: BinaryHeap<Reverse<Entry>>,
    closed: bool,
}

/// A bounded, thread-safe priority queue of pending URLs.
pub struct Frontier {
    state: Mutex<State>,
    not_empty: Condvar,
    capacity: usize,
}

impl Frontier {
    pub fn new() -> Self {
        Self::with_capacity(Q_MAX)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Mutex::new(State {
                heap: BinaryHeap::new(),
                closed: false,
            }),
            not_empty: Condvar::new(),
            capacity,
        }
    }

    /// Enqueues `url` with a freshly drawn random priority. Silently drops
    /// the URL if the queue is already at capacity: the crawl is
    /// breadth-unbounded so shedding is cheaper than blocking the caller.
    pub fn put(&self, url: Url) {
        let priority = rand::thread_rng().gen_range(0..1000);
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        if state.heap.len() >= self.capacity {
            tracing::debug!(url = %url, "frontier full, dropping url");
            return;
        }

        state.heap.push(Reverse(Entry { priority, url }));
        self.not_empty.notify_one();
    }

    /// Bulk version of [`Frontier::put`].
    pub fn load<I: IntoIterator<Item = Url>>(&self, urls: I) {
        for url in urls {
            self.put(url);
        }
    }

    /// Removes and returns the entry with the smallest priority, breaking
    /// ties lexicographically on the URL. Blocks while the queue is empty
    /// and open; returns `None` once [`Frontier::close`] has been called and
    /// the queue has drained.
    pub fn get(&self) -> Option<Url> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        loop {
            if let Some(Reverse(entry)) = state.heap.pop() {
                return Some(entry.url);
            }

            if state.closed {
                return None;
            }

            state = self
                .not_empty
                .wait(state)
                .unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Non-blocking variant of [`Frontier::get`]: returns `None` immediately
    /// if the queue is currently empty, regardless of `closed`.
    pub fn try_get(&self) -> Option<Url> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.heap.pop().map(|Reverse(entry)| entry.url)
    }

    /// Wakes any blocked `get` callers with `None` once the frontier has
    /// drained; used at crawl shutdown so worker loops can terminate instead
    /// of blocking forever on an empty, permanently-idle queue.
    pub fn close(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.closed = true;
        self.not_empty.notify_all();
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Frontier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn put_then_get_roundtrips() {
        let frontier = Frontier::new();
        frontier.put(url("https://a.example/"));
        assert_eq!(frontier.try_get(), Some(url("https://a.example/")));
        assert_eq!(frontier.try_get(), None);
    }

    #[test]
    fn drops_on_overflow() {
        let frontier = Frontier::with_capacity(2);
        frontier.put(url("https://a.example/"));
        frontier.put(url("https://b.example/"));
        frontier.put(url("https://c.example/"));
        assert_eq!(frontier.len(), 2);
    }

    #[test]
    fn load_enqueues_all_within_capacity() {
        let frontier = Frontier::with_capacity(10);
        frontier.load([url("https://a.example/"), url("https://b.example/")]);
        assert_eq!(frontier.len(), 2);
    }

    #[test]
    fn get_never_returns_a_url_that_was_not_put() {
        let frontier = Frontier::with_capacity(10);
        let urls = [
            url("https://a.example/"),
            url("https://b.example/"),
            url("https://c.example/"),
        ];
        frontier.load(urls.clone());

        let mut drained = Vec::new();
        while let Some(u) = frontier.try_get() {
            drained.push(u);
        }

        drained.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        let mut expected: Vec<_> = urls.to_vec();
        expected.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        assert_eq!(drained, expected);
    }

    #[test]
    fn close_wakes_blocked_getters() {
        let frontier = Arc::new(Frontier::new());
        let waiter = {
            let frontier = frontier.clone();
            std::thread::spawn(move || frontier.get())
        };

        std::thread::sleep(std::time::Duration::from_millis(50));
        frontier.close();

        assert_eq!(waiter.join().unwrap(), None);
    }

    #[test]
    fn concurrent_put_get_preserves_count() {
        let frontier = Arc::new(Frontier::with_capacity(10_000));
        let mut handles = Vec::new();

        for t in 0..4 {
            let frontier = frontier.clone();
            handles.push(std::thread::spawn(move || {
                for i in 0..100 {
                    frontier.put(url(&format!("https://host{t}.example/{i}")));
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(frontier.len(), 400);
    }
}
