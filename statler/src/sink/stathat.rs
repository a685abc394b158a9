use std::{
    fmt, io,
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::{debug, error, trace};

use super::ReportSink;
use crate::{error::SinkError, stat::Stat};

/// Endpoint of the StatHat EZ API.
pub const DEFAULT_STATHAT_ENDPOINT: &str = "https://api.stathat.com/ez";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_WORKERS: usize = 40;
const DEFAULT_QUEUE_CAPACITY: usize = 100_000;

/// Builder for a [`StatHatSink`].
pub struct StatHatBuilder {
    ezkey: String,
    endpoint: String,
    workers: usize,
    queue_capacity: usize,
    timeout: Duration,
}

impl StatHatBuilder {
    /// Creates a new `StatHatBuilder` that posts with the given EZ key.
    pub fn new<K: Into<String>>(ezkey: K) -> StatHatBuilder {
        StatHatBuilder {
            ezkey: ezkey.into(),
            endpoint: DEFAULT_STATHAT_ENDPOINT.to_owned(),
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets the endpoint that reports are posted to.
    ///
    /// Defaults to [`DEFAULT_STATHAT_ENDPOINT`].
    #[must_use]
    pub fn with_endpoint<E: Into<String>>(mut self, endpoint: E) -> StatHatBuilder {
        self.endpoint = endpoint.into();
        self
    }

    /// Sets the number of worker threads posting reports concurrently.
    ///
    /// A value of zero is treated as one.
    ///
    /// Defaults to 40.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> StatHatBuilder {
        self.workers = workers.max(1);
        self
    }

    /// Sets how many reports can wait for a worker before new ones are rejected.
    ///
    /// A value of zero is treated as one.
    ///
    /// Defaults to 100,000.
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> StatHatBuilder {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Sets the timeout for a single request to StatHat.
    ///
    /// Defaults to 5 seconds.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> StatHatBuilder {
        self.timeout = timeout;
        self
    }

    /// Spawns the workers and returns the sink feeding them.
    ///
    /// # Errors
    ///
    /// If a worker thread cannot be spawned, an error is returned and no workers are left running.
    pub fn build(self) -> io::Result<StatHatSink> {
        let agent = ureq::AgentBuilder::new()
            .timeout(self.timeout)
            .max_idle_connections_per_host(self.workers)
            .build();
        let poster = Arc::new(Poster { agent, endpoint: self.endpoint, ezkey: self.ezkey });

        let (tx, rx) = bounded(self.queue_capacity);
        let mut sink = StatHatSink {
            tx: Some(tx),
            workers: Vec::with_capacity(self.workers),
            endpoint: poster.endpoint.clone(),
        };

        for id in 0..self.workers {
            let poster = Arc::clone(&poster);
            let rx = rx.clone();

            // Dropping the sink on failure closes the queue and joins any workers already spawned.
            let worker = thread::Builder::new()
                .name(format!("statler-stathat-{}", id))
                .spawn(move || run_worker(id, &poster, rx))?;
            sink.workers.push(worker);
        }

        Ok(sink)
    }
}

/// A sink that relays reports to [StatHat][stathat] through its EZ API.
///
/// Reports are queued and posted by a pool of worker threads, so callers never wait on the HTTP
/// round trip. When the queue is full, new reports are rejected. Failed posts are logged and not
/// retried.
///
/// Dropping the sink stops accepting reports and waits for the workers to post everything still
/// queued.
///
/// [stathat]: https://www.stathat.com/manual/send
pub struct StatHatSink {
    tx: Option<Sender<Stat>>,
    workers: Vec<JoinHandle<()>>,
    endpoint: String,
}

impl StatHatSink {
    /// Creates a `StatHatSink` with default settings that posts with the given EZ key.
    ///
    /// # Errors
    ///
    /// If a worker thread cannot be spawned, an error is returned.
    pub fn new<K: Into<String>>(ezkey: K) -> io::Result<StatHatSink> {
        StatHatBuilder::new(ezkey).build()
    }

    /// Creates a [`StatHatBuilder`] for the given EZ key.
    pub fn builder<K: Into<String>>(ezkey: K) -> StatHatBuilder {
        StatHatBuilder::new(ezkey)
    }

    /// Returns the number of reports waiting for a worker.
    pub fn queued(&self) -> usize {
        self.tx.as_ref().map_or(0, Sender::len)
    }

    fn enqueue(&self, stat: Stat) -> Result<(), SinkError> {
        let closed = || SinkError::Rejected { reason: "sink closed".into() };

        let tx = self.tx.as_ref().ok_or_else(closed)?;
        tx.try_send(stat).map_err(|e| match e {
            TrySendError::Full(_) => SinkError::Rejected { reason: "queue full".into() },
            TrySendError::Disconnected(_) => closed(),
        })
    }
}

impl fmt::Debug for StatHatSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatHatSink")
            .field("endpoint", &self.endpoint)
            .field("workers", &self.workers.len())
            .finish_non_exhaustive()
    }
}

impl ReportSink for StatHatSink {
    fn report_value(&self, key: &str, value: f64) -> Result<(), SinkError> {
        self.enqueue(Stat::value(key, value))
    }

    fn report_count(&self, key: &str, count: i32) -> Result<(), SinkError> {
        self.enqueue(Stat::count(key, count))
    }
}

impl Drop for StatHatSink {
    fn drop(&mut self) {
        drop(self.tx.take());

        let workers = self.workers.len();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                error!("StatHat worker panicked.");
            }
        }

        debug!(endpoint = %self.endpoint, workers, "StatHat sink stopped.");
    }
}

struct Poster {
    agent: ureq::Agent,
    endpoint: String,
    ezkey: String,
}

impl Poster {
    fn post(&self, stat: &Stat) -> Result<(), SinkError> {
        let (field, value) = match stat {
            Stat::Count { count, .. } => ("count", count.to_string()),
            Stat::Value { value, .. } => ("value", value.to_string()),
        };
        trace!(key = stat.key(), field, %value, endpoint = %self.endpoint, "Posting report.");

        let form = [("ezkey", self.ezkey.as_str()), ("stat", stat.key()), (field, value.as_str())];
        match self.agent.post(&self.endpoint).send_form(&form) {
            Ok(_) => Ok(()),
            Err(ureq::Error::Status(code, response)) => Err(SinkError::Rejected {
                reason: format!("HTTP {} {}", code, response.status_text()),
            }),
            Err(ureq::Error::Transport(e)) => Err(SinkError::Transport(Box::new(e))),
        }
    }
}

fn run_worker(id: usize, poster: &Poster, rx: Receiver<Stat>) {
    for stat in rx.iter() {
        if let Err(e) = poster.post(&stat) {
            error!(worker = id, key = stat.key(), error = %e, "Failed to post report to StatHat.");
        }
    }

    trace!(worker = id, "StatHat worker exiting.");
}
