//! Background image fetching.
//!
//! A fetch runs on its own thread and reports back over a channel that the
//! owning document drains on its own thread. Results are only applied when
//! they belong to the locator the document currently shows, which neutralizes
//! late completions from earlier requests.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender, channel};
use std::thread;
use std::time::Duration;

use kurbo::Size;
use thiserror::Error;
use url::Url;

/// Schemes a locator may use.
pub const SUPPORTED_SCHEMES: [&str; 3] = ["file", "http", "https"];

/// Background fetch errors.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Unsupported scheme: {0}")]
    UnsupportedScheme(String),
    #[error("Not a local file: {0}")]
    InvalidPath(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP status {0}")]
    Status(u16),
    #[error("Image decode error: {0}")]
    Decode(#[from] image::ImageError),
    #[error("Fetch was superseded")]
    Cancelled,
}

/// Resolves a locator to raw bytes.
pub trait ByteFetcher: Send + Sync {
    fn fetch(&self, locator: &Url) -> Result<Vec<u8>, FetchError>;
}

/// Fetches `file://` locators from disk and `http(s)://` locators over the network.
#[derive(Debug, Clone, Default)]
pub struct UrlFetcher {
    timeout: Option<Duration>,
}

impl UrlFetcher {
    /// Create a fetcher without a timeout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Give up on network fetches after `timeout`.
    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

impl ByteFetcher for UrlFetcher {
    fn fetch(&self, locator: &Url) -> Result<Vec<u8>, FetchError> {
        match locator.scheme() {
            "file" => {
                let path = locator
                    .to_file_path()
                    .map_err(|_| FetchError::InvalidPath(locator.to_string()))?;
                Ok(std::fs::read(path)?)
            }
            "http" | "https" => {
                let client = reqwest::blocking::Client::builder()
                    .timeout(self.timeout)
                    .build()?;
                let response = client.get(locator.clone()).send()?;
                let status = response.status();
                if !status.is_success() {
                    return Err(FetchError::Status(status.as_u16()));
                }
                Ok(response.bytes()?.to_vec())
            }
            other => Err(FetchError::UnsupportedScheme(other.to_string())),
        }
    }
}

/// Unwrap image-search result links to the image they point at.
///
/// A locator with an `imgurl=<url>` query parameter is replaced by the embedded
/// URL. Anything else is returned unchanged.
pub fn image_url(locator: Url) -> Url {
    let embedded = locator
        .query_pairs()
        .find(|(key, _)| key == "imgurl")
        .and_then(|(_, value)| Url::parse(&value).ok());
    embedded.unwrap_or(locator)
}

/// Interpret dropped text as a background locator.
pub fn parse_locator(text: &str) -> Option<Url> {
    let url = Url::parse(text.trim()).ok()?;
    if !SUPPORTED_SCHEMES.contains(&url.scheme()) {
        return None;
    }
    Some(image_url(url))
}

/// A decoded background image.
#[derive(Clone)]
pub struct BackgroundImage {
    locator: Url,
    pixels: Arc<image::RgbaImage>,
}

impl BackgroundImage {
    /// Decode PNG, JPEG or WebP bytes.
    pub fn decode(locator: Url, bytes: &[u8]) -> Result<Self, FetchError> {
        let decoded = image::load_from_memory(bytes)?;
        Ok(Self {
            locator,
            pixels: Arc::new(decoded.to_rgba8()),
        })
    }

    /// The locator this image was decoded from.
    pub fn locator(&self) -> &Url {
        &self.locator
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Pixel extent as a size.
    pub fn size(&self) -> Size {
        Size::new(f64::from(self.width()), f64::from(self.height()))
    }

    pub fn pixels(&self) -> &image::RgbaImage {
        &self.pixels
    }
}

impl fmt::Debug for BackgroundImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackgroundImage")
            .field("locator", &self.locator.as_str())
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

/// Progress of the background fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchState {
    /// No background requested.
    Idle,
    Fetching(Url),
    Resolved(Url),
    /// The last fetch failed. No retry happens until a new request.
    Failed(Url),
}

impl FetchState {
    pub fn is_fetching(&self) -> bool {
        matches!(self, FetchState::Fetching(_))
    }
}

/// Result sent back from a fetch thread.
struct FetchOutcome {
    generation: u64,
    locator: Url,
    result: Result<BackgroundImage, FetchError>,
}

/// Owns the decoded-image slot and the in-flight fetches.
pub struct BackgroundFetcher {
    fetcher: Arc<dyn ByteFetcher>,
    state: FetchState,
    image: Option<BackgroundImage>,
    /// Bumped every time the image slot changes.
    revision: u64,
    /// Bumped on every request; only the latest one's result is applied.
    generation: u64,
    /// Cancellation flag of the most recent fetch.
    cancel: Option<Arc<AtomicBool>>,
    result_tx: Sender<FetchOutcome>,
    result_rx: Receiver<FetchOutcome>,
}

impl BackgroundFetcher {
    pub fn new(fetcher: Arc<dyn ByteFetcher>) -> Self {
        let (result_tx, result_rx) = channel();
        Self {
            fetcher,
            state: FetchState::Idle,
            image: None,
            revision: 0,
            generation: 0,
            cancel: None,
            result_tx,
            result_rx,
        }
    }

    pub fn state(&self) -> &FetchState {
        &self.state
    }

    pub fn image(&self) -> Option<&BackgroundImage> {
        self.image.as_ref()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Start fetching `locator`, superseding any earlier request.
    ///
    /// The image slot is cleared immediately so a stale image is never shown
    /// while the new one loads.
    pub fn request(&mut self, locator: Option<&Url>) {
        if self.image.take().is_some() {
            self.revision += 1;
        }
        if let Some(previous) = self.cancel.take() {
            previous.store(true, Ordering::Relaxed);
        }
        self.generation += 1;

        let Some(locator) = locator else {
            self.state = FetchState::Idle;
            return;
        };

        let cancelled = Arc::new(AtomicBool::new(false));
        let worker_cancelled = cancelled.clone();
        let fetcher = self.fetcher.clone();
        let result_tx = self.result_tx.clone();
        let target = locator.clone();
        let generation = self.generation;

        let spawned = thread::Builder::new()
            .name("background-fetch".to_string())
            .spawn(move || {
                log::debug!("Fetching background {}", target);
                let result = fetcher.fetch(&target).and_then(|bytes| {
                    if worker_cancelled.load(Ordering::Relaxed) {
                        return Err(FetchError::Cancelled);
                    }
                    BackgroundImage::decode(target.clone(), &bytes)
                });
                // The owner may already be gone
                let _ = result_tx.send(FetchOutcome {
                    generation,
                    locator: target,
                    result,
                });
            });

        match spawned {
            Ok(_) => {
                self.cancel = Some(cancelled);
                self.state = FetchState::Fetching(locator.clone());
            }
            Err(e) => {
                log::warn!("Could not start background fetch for {}: {}", locator, e);
                self.state = FetchState::Failed(locator.clone());
            }
        }
    }

    /// Apply every finished fetch without blocking.
    ///
    /// `current` is the locator the document shows right now. Returns the
    /// number of results received, applied or not.
    pub fn poll(&mut self, current: Option<&Url>) -> usize {
        let mut handled = 0;
        while let Ok(outcome) = self.result_rx.try_recv() {
            self.apply(outcome, current);
            handled += 1;
        }
        handled
    }

    /// Block up to `timeout` for at least one result, then drain the rest.
    pub fn wait(&mut self, timeout: Duration, current: Option<&Url>) -> usize {
        match self.result_rx.recv_timeout(timeout) {
            Ok(outcome) => {
                self.apply(outcome, current);
                1 + self.poll(current)
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => 0,
        }
    }

    fn apply(&mut self, outcome: FetchOutcome, current: Option<&Url>) {
        let awaited = outcome.generation == self.generation
            && matches!(&self.state, FetchState::Fetching(l) if *l == outcome.locator);
        let superseded = matches!(outcome.result, Err(FetchError::Cancelled));
        if !awaited || superseded || current != Some(&outcome.locator) {
            log::debug!("Discarding stale background result for {}", outcome.locator);
            return;
        }

        self.cancel = None;
        match outcome.result {
            Ok(image) => {
                log::info!(
                    "Background {} loaded ({}x{})",
                    outcome.locator,
                    image.width(),
                    image.height()
                );
                self.image = Some(image);
                self.revision += 1;
                self.state = FetchState::Resolved(outcome.locator);
            }
            Err(e) => {
                log::warn!("Background {} failed: {}", outcome.locator, e);
                self.state = FetchState::Failed(outcome.locator);
            }
        }
    }
}

impl fmt::Debug for BackgroundFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackgroundFetcher")
            .field("state", &self.state)
            .field("image", &self.image)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::io::Cursor;
    use std::sync::Mutex;

    /// Encode a blank PNG of the given size.
    pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let mut bytes = Vec::new();
        image::RgbaImage::new(width, height)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    /// A fetcher whose fetches block until the test releases them.
    #[derive(Default)]
    pub(crate) struct GatedFetcher {
        gates: Mutex<HashMap<String, Receiver<Result<Vec<u8>, FetchError>>>>,
    }

    impl GatedFetcher {
        /// Register `locator`; the returned sender completes its fetch.
        pub(crate) fn gate(&self, locator: &str) -> Sender<Result<Vec<u8>, FetchError>> {
            let (tx, rx) = channel();
            self.gates.lock().unwrap().insert(locator.to_string(), rx);
            tx
        }
    }

    impl ByteFetcher for GatedFetcher {
        fn fetch(&self, locator: &Url) -> Result<Vec<u8>, FetchError> {
            let gate = self.gates.lock().unwrap().remove(locator.as_str());
            match gate {
                Some(rx) => rx.recv().unwrap_or(Err(FetchError::Cancelled)),
                None => Err(FetchError::Status(404)),
            }
        }
    }

    /// A fetcher that hands out completions in call order, whatever the
    /// locator. Each call reports on `started` before blocking.
    pub(crate) struct QueuedFetcher {
        gates: Mutex<VecDeque<Receiver<Result<Vec<u8>, FetchError>>>>,
        started: Mutex<Sender<Url>>,
    }

    impl QueuedFetcher {
        pub(crate) fn new() -> (Self, Receiver<Url>) {
            let (started_tx, started_rx) = channel();
            let fetcher = Self {
                gates: Mutex::new(VecDeque::new()),
                started: Mutex::new(started_tx),
            };
            (fetcher, started_rx)
        }

        /// Queue a gate for the next fetch call.
        pub(crate) fn gate(&self) -> Sender<Result<Vec<u8>, FetchError>> {
            let (tx, rx) = channel();
            self.gates.lock().unwrap().push_back(rx);
            tx
        }
    }

    impl ByteFetcher for QueuedFetcher {
        fn fetch(&self, locator: &Url) -> Result<Vec<u8>, FetchError> {
            let gate = self.gates.lock().unwrap().pop_front();
            let _ = self.started.lock().unwrap().send(locator.clone());
            match gate {
                Some(rx) => rx.recv().unwrap_or(Err(FetchError::Cancelled)),
                None => Err(FetchError::Status(404)),
            }
        }
    }

    const WAIT: Duration = Duration::from_secs(5);

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_resolves_current_request() {
        let fetcher = Arc::new(GatedFetcher::default());
        let release = fetcher.gate("https://example.com/a.png");
        let mut background = BackgroundFetcher::new(fetcher);

        let a = url("https://example.com/a.png");
        background.request(Some(&a));
        assert_eq!(background.state(), &FetchState::Fetching(a.clone()));

        release.send(Ok(png_bytes(4, 2))).unwrap();
        assert_eq!(background.wait(WAIT, Some(&a)), 1);

        let image = background.image().unwrap();
        assert_eq!((image.width(), image.height()), (4, 2));
        assert_eq!(image.locator(), &a);
        assert_eq!(background.state(), &FetchState::Resolved(a));
        assert_eq!(background.revision(), 1);
    }

    #[test]
    fn test_stale_result_discarded() {
        let fetcher = Arc::new(GatedFetcher::default());
        let release_a = fetcher.gate("https://example.com/a.png");
        let release_b = fetcher.gate("https://example.com/b.png");
        let mut background = BackgroundFetcher::new(fetcher);

        let a = url("https://example.com/a.png");
        let b = url("https://example.com/b.png");
        background.request(Some(&a));
        background.request(Some(&b));

        release_a.send(Ok(png_bytes(4, 2))).unwrap();
        assert_eq!(background.wait(WAIT, Some(&b)), 1);
        assert!(background.image().is_none());
        assert_eq!(background.state(), &FetchState::Fetching(b.clone()));

        release_b.send(Ok(png_bytes(8, 8))).unwrap();
        assert_eq!(background.wait(WAIT, Some(&b)), 1);
        assert_eq!(background.image().unwrap().locator(), &b);
    }

    #[test]
    fn test_request_none_clears_slot() {
        let fetcher = Arc::new(GatedFetcher::default());
        let release = fetcher.gate("https://example.com/a.png");
        let mut background = BackgroundFetcher::new(fetcher);

        let a = url("https://example.com/a.png");
        background.request(Some(&a));
        release.send(Ok(png_bytes(1, 1))).unwrap();
        background.wait(WAIT, Some(&a));
        assert!(background.image().is_some());

        background.request(None);
        assert!(background.image().is_none());
        assert_eq!(background.state(), &FetchState::Idle);
        assert_eq!(background.revision(), 2);
    }

    #[test]
    fn test_failure_leaves_slot_empty() {
        let fetcher = Arc::new(GatedFetcher::default());
        let release = fetcher.gate("https://example.com/a.png");
        let mut background = BackgroundFetcher::new(fetcher);

        let a = url("https://example.com/a.png");
        background.request(Some(&a));
        release.send(Ok(b"definitely not an image".to_vec())).unwrap();
        background.wait(WAIT, Some(&a));

        assert!(background.image().is_none());
        assert_eq!(background.state(), &FetchState::Failed(a));
    }

    #[test]
    fn test_poll_without_results() {
        let mut background = BackgroundFetcher::new(Arc::new(GatedFetcher::default()));
        assert_eq!(background.poll(None), 0);
        assert_eq!(background.wait(Duration::from_millis(10), None), 0);
    }

    #[test]
    fn test_image_url_unwraps_search_links() {
        let link = url(
            "https://www.google.com/imgres?imgurl=https%3A%2F%2Fexample.com%2Fcat.jpg&imgrefurl=x",
        );
        assert_eq!(image_url(link).as_str(), "https://example.com/cat.jpg");

        let plain = url("https://example.com/dog.png?size=large");
        assert_eq!(image_url(plain.clone()), plain);
    }

    #[test]
    fn test_parse_locator() {
        assert!(parse_locator("https://example.com/a.png").is_some());
        assert!(parse_locator("  file:///tmp/a.png\n").is_some());
        assert!(parse_locator("😀").is_none());
        assert!(parse_locator("mailto:someone@example.com").is_none());
        assert!(parse_locator("").is_none());
    }

    #[test]
    fn test_url_fetcher_reads_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bg.png");
        std::fs::write(&path, png_bytes(3, 5)).unwrap();

        let locator = Url::from_file_path(&path).unwrap();
        let bytes = UrlFetcher::new().fetch(&locator).unwrap();
        let image = BackgroundImage::decode(locator, &bytes).unwrap();
        assert_eq!(image.size(), Size::new(3.0, 5.0));
    }

    #[test]
    fn test_url_fetcher_rejects_unknown_scheme() {
        let result = UrlFetcher::new().fetch(&url("ftp://example.com/a.png"));
        assert!(matches!(result, Err(FetchError::UnsupportedScheme(s)) if s == "ftp"));
    }

    #[test]
    fn test_rerequest_of_same_locator_applies_latest() {
        let (queued, started) = QueuedFetcher::new();
        let queued = Arc::new(queued);
        let first = queued.gate();
        let second = queued.gate();
        let a = url("https://example.com/a.png");
        let mut fetcher = BackgroundFetcher::new(queued);

        fetcher.request(Some(&a));
        started.recv_timeout(WAIT).unwrap();
        fetcher.request(Some(&a));
        started.recv_timeout(WAIT).unwrap();

        // The superseded fetch completes first and must not settle the request.
        first.send(Ok(png_bytes(2, 2))).unwrap();
        assert_eq!(fetcher.wait(WAIT, Some(&a)), 1);
        assert!(fetcher.image().is_none());
        assert_eq!(fetcher.state(), &FetchState::Fetching(a.clone()));

        second.send(Ok(png_bytes(3, 3))).unwrap();
        assert_eq!(fetcher.wait(WAIT, Some(&a)), 1);
        assert_eq!(fetcher.image().unwrap().size(), Size::new(3.0, 3.0));
        assert_eq!(fetcher.state(), &FetchState::Resolved(a));
    }

    #[test]
    fn test_round_trip_to_earlier_locator_ignores_old_fetch() {
        let (queued, started) = QueuedFetcher::new();
        let queued = Arc::new(queued);
        let first = queued.gate();
        let _middle = queued.gate();
        let last = queued.gate();
        let a = url("https://example.com/a.png");
        let b = url("https://example.com/b.png");
        let mut fetcher = BackgroundFetcher::new(queued);

        fetcher.request(Some(&a));
        started.recv_timeout(WAIT).unwrap();
        fetcher.request(Some(&b));
        started.recv_timeout(WAIT).unwrap();
        fetcher.request(Some(&a));
        started.recv_timeout(WAIT).unwrap();

        first.send(Err(FetchError::Status(500))).unwrap();
        fetcher.wait(WAIT, Some(&a));
        assert_eq!(fetcher.state(), &FetchState::Fetching(a.clone()));

        last.send(Ok(png_bytes(4, 1))).unwrap();
        fetcher.wait(WAIT, Some(&a));
        assert_eq!(fetcher.image().unwrap().width(), 4);
    }
}
