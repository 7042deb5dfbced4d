//! Background draining of the engine's stdout and stderr.
//!
//! Each stream gets its own thread that reads one line at a time and pushes
//! it into an unbounded channel. The session side only ever sees the two
//! [`OutputQueue`]s, so it can wait on a deadline without ever blocking in a
//! pipe read. Lines keep their order within a queue; nothing is promised
//! about interleaving across the two queues.

use std::io::{BufRead, BufReader, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, trace, warn};

/// Result of waiting on a queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pop {
    Line(String),
    /// Nothing arrived in time.
    Empty,
    /// The producing stream has ended and the queue is empty.
    Closed,
}

/// FIFO of decoded lines from one output stream.
pub struct OutputQueue {
    name: &'static str,
    rx: Receiver<String>,
}

impl OutputQueue {
    /// A queue fed by the returned sender.
    pub fn channel(name: &'static str) -> (Sender<String>, Self) {
        let (tx, rx) = mpsc::channel();
        (tx, Self { name, rx })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Take the next line without waiting.
    pub fn try_pop(&self) -> Option<String> {
        self.rx.try_recv().ok()
    }

    /// Wait up to `timeout` for the next line.
    pub fn pop_timeout(&self, timeout: Duration) -> Pop {
        match self.rx.recv_timeout(timeout) {
            Ok(line) => Pop::Line(line),
            Err(RecvTimeoutError::Timeout) => Pop::Empty,
            Err(RecvTimeoutError::Disconnected) => Pop::Closed,
        }
    }

    /// Remove every line currently queued. Never blocks.
    pub fn drain(&self) -> Vec<String> {
        self.rx.try_iter().collect()
    }
}

/// Owns the two reader threads.
pub struct StreamReader {
    stop: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
}

impl StreamReader {
    /// Start draining `stdout` and `stderr`, returning the reader and the
    /// stdout and stderr queues in that order.
    pub fn spawn<O, E>(stdout: O, stderr: E) -> std::io::Result<(Self, OutputQueue, OutputQueue)>
    where
        O: Read + Send + 'static,
        E: Read + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let (out_tx, out_queue) = OutputQueue::channel("stdout");
        let (err_tx, err_queue) = OutputQueue::channel("stderr");

        let handles = vec![
            spawn_pump("stdout", stdout, out_tx, Arc::clone(&stop))?,
            spawn_pump("stderr", stderr, err_tx, Arc::clone(&stop))?,
        ];

        Ok((Self { stop, handles }, out_queue, err_queue))
    }

    /// Ask both threads to stop. They exit after their current read returns,
    /// which is at the latest when the process closes its pipes.
    pub fn signal_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Wait for both threads to finish. Only returns once both streams have
    /// reached end of file or [`signal_stop`](Self::signal_stop) took effect.
    pub fn join(mut self) {
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                warn!("stream reader thread panicked");
            }
        }
    }
}

fn spawn_pump<R>(
    name: &'static str,
    stream: R,
    tx: Sender<String>,
    stop: Arc<AtomicBool>,
) -> std::io::Result<JoinHandle<()>>
where
    R: Read + Send + 'static,
{
    thread::Builder::new()
        .name(format!("engine-{name}"))
        .spawn(move || pump(name, stream, tx, stop))
}

fn pump<R: Read>(name: &'static str, stream: R, tx: Sender<String>, stop: Arc<AtomicBool>) {
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => {
                debug!(stream = name, "end of stream");
                break;
            }
            Ok(_) => {
                if stop.load(Ordering::SeqCst) {
                    break;
                }
                let line = String::from_utf8_lossy(&buf)
                    .trim_end_matches(['\n', '\r'])
                    .to_string();
                trace!(stream = name, line = %line, "<-");
                if tx.send(line).is_err() {
                    break;
                }
            }
            Err(e) => {
                warn!(stream = name, error = %e, "read failed");
                break;
            }
        }
    }
}
