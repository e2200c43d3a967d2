#![allow(dead_code)]

use std::{
    cell::RefCell,
    collections::HashMap,
    io::{self, Cursor, Read},
    rc::Rc,
    sync::{
        Arc, Mutex,
        mpsc::{self, Receiver, SyncSender},
    },
    thread,
    time::{Duration, Instant},
};

use image::{DynamicImage, ImageFormat};
use panorama_view::{
    DecodedImage, DisplayOptions, FetchError, LoaderConfig, PanoramaView, PanoramaWidget,
    SourceDescriptor, SourceFetcher, SourceStream, ViewEvent, ViewId, Waker,
};

pub fn png(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    DynamicImage::new_rgb8(width, height)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

pub fn source_name(source: &SourceDescriptor) -> String {
    match source {
        SourceDescriptor::LocalFile(path) => path.display().to_string(),
        SourceDescriptor::RemoteUrl(url) => url.to_string(),
        SourceDescriptor::InlinePayload(_) => "inline".to_owned(),
    }
}

struct Stream {
    bytes: Cursor<Vec<u8>>,
    fail_close: bool,
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.bytes.read(buf)
    }
}

impl SourceStream for Stream {
    fn close(self: Box<Self>) -> io::Result<()> {
        if self.fail_close {
            Err(io::Error::other("connection reset while closing"))
        } else {
            Ok(())
        }
    }
}

/// Serves an 8x4 PNG for every source (16x8 for names containing "slow").
/// Sources can be gated so their open blocks until released.
#[derive(Default)]
pub struct FakeSource {
    pub opened: Mutex<Vec<SourceDescriptor>>,
    pub gates: Mutex<HashMap<String, Receiver<()>>>,
    pub fail_close: bool,
    pub garbage: bool,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gate(&self, name: &str) -> SyncSender<()> {
        let (tx, rx) = mpsc::sync_channel(1);
        self.gates.lock().unwrap().insert(name.to_owned(), rx);
        tx
    }

    pub fn opened(&self) -> Vec<SourceDescriptor> {
        self.opened.lock().unwrap().clone()
    }

    pub fn open_count(&self, name: &str) -> usize {
        self.opened()
            .iter()
            .filter(|source| source_name(source) == name)
            .count()
    }
}

impl SourceFetcher for FakeSource {
    fn open(&self, source: &SourceDescriptor) -> Result<Box<dyn SourceStream>, FetchError> {
        let name = source_name(source);
        self.opened.lock().unwrap().push(source.clone());

        let gate = self.gates.lock().unwrap().remove(&name);
        if let Some(gate) = gate {
            let _ = gate.recv();
        }

        let bytes = if self.garbage {
            b"not an image".to_vec()
        } else if name.contains("slow") {
            png(16, 8)
        } else {
            png(8, 4)
        };

        Ok(Box::new(Stream {
            bytes: Cursor::new(bytes),
            fail_close: self.fail_close,
        }))
    }
}

#[derive(Default)]
pub struct WidgetLog {
    pub shown: Vec<((u32, u32), DisplayOptions)>,
    pub touch_tracking: Option<bool>,
    pub embedded: bool,
    pub shut_down: bool,
}

pub struct FakeWidget(pub Rc<RefCell<WidgetLog>>);

impl PanoramaWidget for FakeWidget {
    fn load_image_from_bitmap(&mut self, image: Arc<DecodedImage>, options: DisplayOptions) {
        self.0.borrow_mut().shown.push((image.dimensions(), options));
    }

    fn set_touch_tracking_enabled(&mut self, enabled: bool) {
        self.0.borrow_mut().touch_tracking = Some(enabled);
    }

    fn configure_embedded(&mut self) {
        self.0.borrow_mut().embedded = true;
    }

    fn shutdown(&mut self) {
        self.0.borrow_mut().shut_down = true;
    }
}

pub struct Harness {
    pub view: PanoramaView,
    pub widget: Rc<RefCell<WidgetLog>>,
    pub events: Rc<RefCell<Vec<ViewEvent>>>,
}

impl Harness {
    pub fn new(fetcher: Arc<dyn SourceFetcher>) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();

        let widget = Rc::new(RefCell::new(WidgetLog::default()));
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink_events = events.clone();
        let waker: Waker = Arc::new(|| {});

        let view = PanoramaView::with_fetcher(
            ViewId(1),
            Box::new(FakeWidget(widget.clone())),
            Box::new(move |_: ViewId, event: ViewEvent| sink_events.borrow_mut().push(event)),
            fetcher,
            &LoaderConfig::default(),
            waker,
        );

        Self {
            view,
            widget,
            events,
        }
    }

    pub fn shown(&self) -> usize {
        self.widget.borrow().shown.len()
    }

    pub fn events(&self) -> Vec<ViewEvent> {
        self.events.borrow().clone()
    }

    /// Polls the view until `done` holds.
    pub fn drive(&mut self, done: impl Fn(&Harness) -> bool) {
        let deadline = Instant::now() + Duration::from_secs(20);
        loop {
            self.view.poll();
            if done(self) {
                return;
            }
            assert!(Instant::now() < deadline, "view never settled");
            thread::sleep(Duration::from_millis(5));
        }
    }

    /// Polls for a while to let stray results arrive.
    pub fn settle(&mut self) {
        for _ in 0..20 {
            self.view.poll();
            thread::sleep(Duration::from_millis(5));
        }
    }
}
