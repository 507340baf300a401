use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;

use tokio_util::sync::CancellationToken;

use crate::client::Catalog;
use crate::domain::{Article, ItemKey, SizeId, StockSnapshot};
use crate::error::{Error, Result};

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Periodically polls the catalog for every watched (article, size) and
/// streams the resulting stock snapshots.
///
/// Each tick fetches every watched article once, on a worker pool capped at
/// `max_concurrent_fetches`. A slow or failing fetch never delays the timer or
/// other fetches; failures are logged and the item is simply polled again on
/// the next tick. An article whose previous fetch is still running is skipped.
pub struct Poller {
    catalog: Arc<dyn Catalog>,
    interval: Duration,
    snapshot_buffer: usize,
    workers: Arc<Semaphore>,
    watch_list: Arc<Mutex<BTreeSet<ItemKey>>>,
    shutdown: CancellationToken,
    started: AtomicBool,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Poller {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        interval: Duration,
        max_concurrent_fetches: usize,
        snapshot_buffer: usize,
    ) -> Self {
        Self {
            catalog,
            interval: interval.max(MIN_INTERVAL),
            snapshot_buffer: snapshot_buffer.max(1),
            workers: Arc::new(Semaphore::new(max_concurrent_fetches.max(1))),
            watch_list: Arc::new(Mutex::new(BTreeSet::new())),
            shutdown: CancellationToken::new(),
            started: AtomicBool::new(false),
            task: Mutex::new(None),
        }
    }

    /// Start watching an item. Returns `false` if it was already watched
    pub fn add_item(&self, item: &ItemKey) -> bool {
        let added = self.watch_list.lock().insert(item.clone());
        if added {
            tracing::info!("Watching {}", item);
        }
        added
    }

    /// Stop watching an item. Returns `false` if it was not watched
    pub fn remove_item(&self, item: &ItemKey) -> bool {
        let removed = self.watch_list.lock().remove(item);
        if removed {
            tracing::info!("No longer watching {}", item);
        }
        removed
    }

    pub fn is_watching(&self, item: &ItemKey) -> bool {
        self.watch_list.lock().contains(item)
    }

    pub fn watched_items(&self) -> Vec<ItemKey> {
        self.watch_list.lock().iter().cloned().collect()
    }

    /// Start the interval timer, returning the stream of stock snapshots.
    /// The first tick fires immediately. The stream ends once `stop` has completed.
    pub fn start(&self) -> Result<mpsc::Receiver<StockSnapshot>> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadyStarted("Poller"));
        }

        let (snapshots, receiver) = mpsc::channel(self.snapshot_buffer);
        let ticker = TickLoop {
            catalog: self.catalog.clone(),
            workers: self.workers.clone(),
            watch_list: self.watch_list.clone(),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            shutdown: self.shutdown.clone(),
            snapshots,
        };

        tracing::info!("Starting poller with a {:?} interval", self.interval);
        *self.task.lock() = Some(tokio::spawn(ticker.run(self.interval)));

        Ok(receiver)
    }

    /// Halt the timer and wait for in-flight fetches to finish or be abandoned.
    /// The snapshot stream is closed once this returns; calling it again is a no-op.
    pub async fn stop(&self) {
        self.shutdown.cancel();

        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::error!("Poller task failed: {}", e);
            }
            tracing::info!("Poller stopped");
        }
    }
}

/// State owned by the spawned timer task.
/// Every fetch holds a clone of `snapshots`, so the stream closes only after the
/// timer and all fetches have dropped theirs.
struct TickLoop {
    catalog: Arc<dyn Catalog>,
    workers: Arc<Semaphore>,
    watch_list: Arc<Mutex<BTreeSet<ItemKey>>>,
    in_flight: Arc<Mutex<HashSet<Article>>>,
    shutdown: CancellationToken,
    snapshots: mpsc::Sender<StockSnapshot>,
}

impl TickLoop {
    async fn run(self, period: Duration) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut fetches = JoinSet::new();

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = ticker.tick() => self.tick(&mut fetches),
                Some(joined) = fetches.join_next() => {
                    if let Err(e) = joined {
                        tracing::error!("Stock fetch task failed: {}", e);
                    }
                }
            }
        }

        // Fetches observe the cancellation, so draining them is quick
        while let Some(joined) = fetches.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Stock fetch task failed: {}", e);
            }
        }
    }

    fn tick(&self, fetches: &mut JoinSet<()>) {
        // Snapshot the watch-list so concurrent adds/removes never affect this tick
        let mut sizes_by_article: BTreeMap<Article, Vec<SizeId>> = BTreeMap::new();
        for item in self.watch_list.lock().iter() {
            sizes_by_article
                .entry(item.article.clone())
                .or_default()
                .push(item.size_id);
        }

        tracing::debug!("Poller tick: {} watched articles", sizes_by_article.len());

        for (article, sizes) in sizes_by_article {
            let Some(guard) = InFlight::claim(&self.in_flight, &article) else {
                tracing::debug!("Previous fetch of {} still running, skipping", article);
                continue;
            };

            fetches.spawn(fetch_stock(
                self.catalog.clone(),
                self.workers.clone(),
                self.shutdown.clone(),
                self.snapshots.clone(),
                article,
                sizes,
                guard,
            ));
        }
    }
}

/// Fetch the options of one article and stream the snapshots of its watched sizes
async fn fetch_stock(
    catalog: Arc<dyn Catalog>,
    workers: Arc<Semaphore>,
    shutdown: CancellationToken,
    snapshots: mpsc::Sender<StockSnapshot>,
    article: Article,
    sizes: Vec<SizeId>,
    _in_flight: InFlight,
) {
    let _permit = tokio::select! {
        _ = shutdown.cancelled() => return,
        permit = workers.acquire() => match permit {
            Ok(permit) => permit,
            Err(_) => return,
        },
    };

    let options = tokio::select! {
        _ = shutdown.cancelled() => return,
        options = catalog.options_by_article(&article) => options,
    };

    let options = match options {
        Ok(options) => options,
        Err(e) => {
            tracing::error!("Failed to fetch stock of {}: {}", article, e);
            return;
        }
    };

    for size_id in sizes {
        let Some(snapshot) = options.iter().find(|option| option.size_id == size_id) else {
            tracing::warn!("Catalog has no size {} for article {}", size_id, article);
            continue;
        };

        tracing::debug!("Stock of {}/{}: {}", article, size_id, snapshot);
        tokio::select! {
            _ = shutdown.cancelled() => return,
            sent = snapshots.send(snapshot.clone()) => {
                if sent.is_err() {
                    tracing::warn!("Snapshot stream has no consumer, dropping snapshot");
                    return;
                }
            }
        }
    }
}

/// Marks an article as being fetched until dropped
struct InFlight {
    articles: Arc<Mutex<HashSet<Article>>>,
    article: Article,
}

impl InFlight {
    fn claim(articles: &Arc<Mutex<HashSet<Article>>>, article: &Article) -> Option<Self> {
        if !articles.lock().insert(article.clone()) {
            return None;
        }

        Some(Self {
            articles: articles.clone(),
            article: article.clone(),
        })
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.articles.lock().remove(&self.article);
    }
}
