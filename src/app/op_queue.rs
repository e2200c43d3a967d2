use std::{
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Receiver, Sender},
    },
    thread,
};

use super::cache::Cache;
use crate::{
    error::LoadError,
    image_io::{
        fetch::{SourceDescriptor, SourceFetcher, fetch},
        load,
    },
    util::{DecodedImage, TargetSize},
};

/// Called from worker threads after a result is queued, so the host can schedule
/// [`PanoramaView::poll`](crate::PanoramaView::poll) on its control thread.
pub type Waker = Arc<dyn Fn() + Send + Sync>;

/// Cooperative cancellation flag shared between a request and its worker.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub struct LoadRequest {
    pub id: u64,
    pub key: String,
    pub source: SourceDescriptor,
    pub target: Option<TargetSize>,
    pub token: CancellationToken,
}

#[derive(Debug)]
enum Output {
    ReleaseFailed(u64),
    Decoded(u64, Arc<DecodedImage>),
    Failed(u64, LoadError),
}

impl Output {
    fn id(&self) -> u64 {
        match self {
            Output::ReleaseFailed(id) | Output::Decoded(id, _) | Output::Failed(id, _) => *id,
        }
    }
}

/// What the control thread has to act on after a poll.
#[derive(Debug)]
pub enum Completion {
    Display(Arc<DecodedImage>),
    Failed(LoadError),
    /// A stream could not be closed. Reported on its own, next to the load result.
    ReleaseFailed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Loading,
    Loaded,
    Failed,
    Cancelled,
}

struct Active {
    id: u64,
    token: CancellationToken,
}

/// Runs at most one active load at a time. Starting a new load cancels the previous one.
pub struct OpQueue {
    next_id: u64,
    active: Option<Active>,
    state: LoadState,
    sender: Sender<Output>,
    receiver: Receiver<Output>,
    waker: Waker,
    fetcher: Arc<dyn SourceFetcher>,
    max_payload_bytes: Option<u64>,
    pub cache: Arc<Cache>,
}

impl OpQueue {
    pub fn new(
        fetcher: Arc<dyn SourceFetcher>,
        waker: Waker,
        max_payload_bytes: Option<u64>,
    ) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            next_id: 0,
            active: None,
            state: LoadState::Idle,
            sender,
            receiver,
            waker,
            fetcher,
            max_payload_bytes,
            cache: Arc::new(Cache::new()),
        }
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn working(&self) -> bool {
        self.active.is_some()
    }

    /// Supersedes any active load and starts `source` on a worker thread.
    pub fn queue(
        &mut self,
        key: String,
        source: SourceDescriptor,
        target: Option<TargetSize>,
    ) -> io::Result<u64> {
        self.cancel();

        self.next_id += 1;
        let request = LoadRequest {
            id: self.next_id,
            key,
            source,
            target,
            token: CancellationToken::new(),
        };
        let id = request.id;
        let token = request.token.clone();

        let fetcher = self.fetcher.clone();
        let cache = self.cache.clone();
        let sender = self.sender.clone();
        let waker = self.waker.clone();
        let limit = self.max_payload_bytes;

        thread::Builder::new()
            .name(format!("pano-load-{id}"))
            .spawn(move || {
                let send = |output: Output| {
                    if sender.send(output).is_ok() {
                        waker();
                    }
                };
                run(&request, fetcher.as_ref(), &cache, limit, &send);
            })?;

        self.active = Some(Active { id, token });
        self.state = LoadState::Loading;
        Ok(id)
    }

    pub fn cancel(&mut self) {
        if let Some(active) = self.active.take() {
            log::debug!("Cancelling load #{}", active.id);
            active.token.cancel();
            self.state = LoadState::Cancelled;
        }
    }

    /// Marks the view failed without running a load.
    pub fn fail(&mut self) {
        self.cancel();
        self.state = LoadState::Failed;
    }

    /// Drains queued results, skipping those of superseded requests.
    /// Must be called on the control thread.
    pub fn poll(&mut self) -> Option<Completion> {
        loop {
            let output = self.receiver.try_recv().ok()?;
            let id = output.id();

            let current = self
                .active
                .as_ref()
                .is_some_and(|active| active.id == id && !active.token.is_cancelled());
            if !current {
                log::debug!("Discarding result of superseded load #{id}");
                continue;
            }

            match output {
                Output::ReleaseFailed(_) => return Some(Completion::ReleaseFailed),
                Output::Decoded(_, image) => {
                    self.active = None;
                    self.state = LoadState::Loaded;
                    return Some(Completion::Display(image));
                }
                Output::Failed(_, error) => {
                    self.active = None;
                    if error.is_cancelled() {
                        self.state = LoadState::Cancelled;
                        continue;
                    }
                    self.state = LoadState::Failed;
                    return Some(Completion::Failed(error));
                }
            }
        }
    }
}

impl Drop for OpQueue {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn run(
    request: &LoadRequest,
    fetcher: &dyn SourceFetcher,
    cache: &Cache,
    limit: Option<u64>,
    send: &dyn Fn(Output),
) {
    if request.token.is_cancelled() {
        return;
    }

    let result = cache.get_or_compute(&request.key, || {
        let fetched = fetch(fetcher, &request.source, limit);
        if fetched.close_error.is_some() {
            send(Output::ReleaseFailed(request.id));
        }
        let bytes = fetched.bytes?;

        if request.token.is_cancelled() {
            return Err(LoadError::Cancelled);
        }
        Ok(load::decode(&bytes, request.target)?)
    });

    if request.token.is_cancelled() {
        log::debug!("Load #{} was superseded", request.id);
        return;
    }

    match result {
        Ok(image) => send(Output::Decoded(request.id, image)),
        Err(error) => {
            log::error!("Could not load file: {error}");
            send(Output::Failed(request.id, error));
        }
    }
}
