//! Open-stream registry.
//!
//! Streams register at open and deregister at close (permanent standard
//! streams never deregister). Two chains are kept: streams that are both
//! line-buffered and writable, and everyone else. The split lets a
//! blocking refill flush exactly the interactive writers, and lets
//! shutdown flush the whole population exactly once.
//!
//! The registry holds weak references only; a stream removes its own
//! entry at close or on drop, and a sweep skips anything already gone.

use std::sync::{Arc, OnceLock, Weak};

use parking_lot::Mutex;

use crate::stream::StreamInner;

#[derive(Default)]
struct Chains {
    line: Vec<Weak<StreamInner>>,
    other: Vec<Weak<StreamInner>>,
}

fn sweep(chain: &mut Vec<Weak<StreamInner>>) -> Vec<Arc<StreamInner>> {
    let mut live = Vec::with_capacity(chain.len());
    chain.retain(|w| match w.upgrade() {
        Some(strong) => {
            live.push(strong);
            true
        }
        None => false,
    });
    live
}

pub struct Registry {
    chains: Mutex<Chains>,
}

impl Registry {
    pub fn new() -> Self {
        Registry {
            chains: Mutex::new(Chains::default()),
        }
    }

    /// The process-wide instance. First use arms the shutdown flush hook.
    pub fn global() -> &'static Arc<Registry> {
        static GLOBAL: OnceLock<Arc<Registry>> = OnceLock::new();
        GLOBAL.get_or_init(|| {
            crate::sys::register_atexit(shutdown_flush);
            Arc::new(Registry::new())
        })
    }

    pub(crate) fn insert(&self, stream: Weak<StreamInner>, line_writer: bool) {
        let mut chains = self.chains.lock();
        if line_writer {
            chains.line.push(stream);
        } else {
            chains.other.push(stream);
        }
    }

    pub(crate) fn remove(&self, id: usize) {
        let mut chains = self.chains.lock();
        chains.line.retain(|w| w.as_ptr() as usize != id);
        chains.other.retain(|w| w.as_ptr() as usize != id);
    }

    /// Total entries across both chains, dead or alive.
    #[cfg(test)]
    pub(crate) fn census(&self) -> usize {
        let chains = self.chains.lock();
        chains.line.len() + chains.other.len()
    }

    /// Move a stream between chains after a buffering-mode change.
    pub(crate) fn reseat(&self, stream: &Arc<StreamInner>, line_writer: bool) {
        let id = Arc::as_ptr(stream) as usize;
        let mut chains = self.chains.lock();
        chains.line.retain(|w| w.as_ptr() as usize != id);
        chains.other.retain(|w| w.as_ptr() as usize != id);
        if line_writer {
            chains.line.push(Arc::downgrade(stream));
        } else {
            chains.other.push(Arc::downgrade(stream));
        }
    }

    /// Flush every line-buffered writer except `except` (the stream about
    /// to block on a refill). Snapshot first, then flush outside the
    /// registry lock; a stream busy on another thread is skipped rather
    /// than waited on.
    pub(crate) fn flush_line_buffered(&self, except: usize) {
        let targets = sweep(&mut self.chains.lock().line);
        for stream in targets {
            if Arc::as_ptr(&stream) as usize == except {
                continue;
            }
            stream.flush_best_effort(false);
        }
    }

    /// Flush everything still open, registry order, each stream under its
    /// own lock. Runs exactly once per stream per call; errors are
    /// swallowed because there is nowhere left to report them at exit.
    pub fn flush_all(&self) {
        let (line, other) = {
            let mut chains = self.chains.lock();
            (sweep(&mut chains.line), sweep(&mut chains.other))
        };
        for stream in line.into_iter().chain(other) {
            stream.flush_best_effort(true);
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Registry::new()
    }
}

/// Flush every registered stream in the global registry.
pub fn flush_open_streams() {
    Registry::global().flush_all();
}

extern "C" fn shutdown_flush() {
    flush_open_streams();
}
