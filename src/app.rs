use std::sync::Arc;

use serde::Deserialize;

pub mod cache;
pub mod op_queue;
use op_queue::{Completion, LoadState, OpQueue, Waker};

pub mod preferences;
use preferences::LoaderConfig;

pub mod widget;
use widget::{EventSink, PanoramaWidget, ViewEvent, ViewId};

use crate::{
    error::ConfigError,
    image_io::fetch::{Fetcher, SourceDescriptor, SourceFetcher},
    util::{DisplayOptions, InputType, TargetSize},
};

pub const REACT_CLASS: &str = "PanoramaView";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// A batch of declarative property changes. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewProps {
    pub image_url: Option<String>,
    pub image_data: Option<String>,
    pub dimensions: Option<Dimensions>,
    pub input_type: Option<String>,
    pub enable_touch_tracking: Option<bool>,
}

/// Creates view instances that share one transport and one waker.
pub struct ViewManager {
    next_id: u32,
    config: LoaderConfig,
    fetcher: Arc<dyn SourceFetcher>,
    waker: Waker,
}

impl ViewManager {
    pub fn new(config: LoaderConfig, waker: Waker) -> Self {
        let fetcher = Arc::new(Fetcher::new(&config));
        Self::with_fetcher(config, fetcher, waker)
    }

    pub fn with_fetcher(
        config: LoaderConfig,
        fetcher: Arc<dyn SourceFetcher>,
        waker: Waker,
    ) -> Self {
        Self {
            next_id: 0,
            config,
            fetcher,
            waker,
        }
    }

    pub fn name(&self) -> &'static str {
        REACT_CLASS
    }

    pub fn exported_event_names(&self) -> [&'static str; 2] {
        ViewEvent::ALL.map(|event| event.name())
    }

    pub fn create_view_instance(
        &mut self,
        widget: Box<dyn PanoramaWidget>,
        sink: Box<dyn EventSink>,
    ) -> PanoramaView {
        self.next_id += 1;
        PanoramaView::with_fetcher(
            ViewId(self.next_id),
            widget,
            sink,
            self.fetcher.clone(),
            &self.config,
            self.waker.clone(),
        )
    }
}

/// One panorama view: its configured properties, its cache and its single active load.
///
/// Every method runs on the control thread. Background work reports back through the
/// waker; the host then calls [`poll`](Self::poll).
pub struct PanoramaView {
    id: ViewId,
    widget: Box<dyn PanoramaWidget>,
    sink: Box<dyn EventSink>,
    op_queue: OpQueue,
    image_url: Option<String>,
    image_data: Option<String>,
    target: Option<TargetSize>,
    options: DisplayOptions,
    dirty: bool,
    committed: bool,
    destroyed: bool,
}

impl PanoramaView {
    pub fn new(
        id: ViewId,
        widget: Box<dyn PanoramaWidget>,
        sink: Box<dyn EventSink>,
        config: &LoaderConfig,
        waker: Waker,
    ) -> Self {
        let fetcher = Arc::new(Fetcher::new(config));
        Self::with_fetcher(id, widget, sink, fetcher, config, waker)
    }

    pub fn with_fetcher(
        id: ViewId,
        mut widget: Box<dyn PanoramaWidget>,
        sink: Box<dyn EventSink>,
        fetcher: Arc<dyn SourceFetcher>,
        config: &LoaderConfig,
        waker: Waker,
    ) -> Self {
        widget.configure_embedded();
        Self {
            id,
            widget,
            sink,
            op_queue: OpQueue::new(fetcher, waker, config.max_payload_bytes),
            image_url: None,
            image_data: None,
            target: None,
            options: DisplayOptions::default(),
            dirty: false,
            committed: false,
            destroyed: false,
        }
    }

    pub fn id(&self) -> ViewId {
        self.id
    }

    pub fn state(&self) -> LoadState {
        self.op_queue.state()
    }

    pub fn display_options(&self) -> DisplayOptions {
        self.options
    }

    pub fn target_size(&self) -> Option<TargetSize> {
        self.target
    }

    pub fn cached_images(&self) -> usize {
        self.op_queue.cache.len()
    }

    pub fn set_image_url(&mut self, value: Option<&str>) {
        log::info!("Image source: {value:?}");
        if self.image_url.as_deref() == value {
            return;
        }
        self.image_url = value.map(str::to_owned);
        self.dirty = true;
    }

    pub fn set_image_data(&mut self, value: Option<&str>) {
        log::info!("Image data: {} chars", value.map_or(0, str::len));
        if self.image_data.as_deref() == value {
            return;
        }
        self.image_data = value.map(str::to_owned);
        self.dirty = true;
    }

    /// Takes effect on the next load. A load that is still running is restarted on
    /// commit so it decodes against the new size.
    pub fn set_dimensions(&mut self, width: u32, height: u32) {
        log::info!("Image dimensions: {width}, {height}");
        let target = TargetSize::new(width, height);
        if self.target != target && self.state() == LoadState::Loading {
            self.dirty = true;
        }
        self.target = target;
    }

    pub fn set_input_type(&mut self, input_type: &str) {
        let input_type = InputType::from_name(input_type);
        if self.options.input_type != input_type {
            self.options.input_type = input_type;
            self.dirty = true;
        }
    }

    pub fn set_enable_touch_tracking(&mut self, enabled: bool) {
        self.widget.set_touch_tracking_enabled(enabled);
    }

    /// Applies a property batch and commits it.
    pub fn apply_props(&mut self, props: &ViewProps) {
        if let Some(url) = &props.image_url {
            self.set_image_url(Some(url.as_str()));
        }
        if let Some(data) = &props.image_data {
            self.set_image_data(Some(data.as_str()));
        }
        if let Some(dimensions) = props.dimensions {
            self.set_dimensions(dimensions.width, dimensions.height);
        }
        if let Some(input_type) = &props.input_type {
            self.set_input_type(input_type);
        }
        if let Some(enabled) = props.enable_touch_tracking {
            self.set_enable_touch_tracking(enabled);
        }
        self.on_after_update_transaction();
    }

    /// Commits property changes. Starts a load when the source or the display
    /// options changed since the last commit; otherwise does nothing.
    pub fn on_after_update_transaction(&mut self) {
        if self.destroyed {
            return;
        }
        if self.committed && !self.dirty {
            log::debug!("{}: nothing changed, keeping current image", self.id);
            return;
        }
        self.committed = true;
        self.dirty = false;
        self.start_load();
    }

    /// Starts a load for the current properties even if nothing changed.
    pub fn reload(&mut self) {
        if self.destroyed {
            return;
        }
        self.committed = true;
        self.dirty = false;
        self.start_load();
    }

    fn start_load(&mut self) {
        // a url wins over inline data
        let (key, source) = if let Some(url) = &self.image_url {
            (url.clone(), SourceDescriptor::from_image_url(url))
        } else if let Some(data) = &self.image_data {
            (data.clone(), SourceDescriptor::from_image_data(data))
        } else {
            log::error!("{}: {}", self.id, ConfigError::NoSourceProvided);
            self.op_queue.fail();
            self.emit(ViewEvent::ImageLoadingFailed);
            return;
        };

        if let Err(err) = self.op_queue.queue(key, source, self.target) {
            log::error!("{}: could not start loader: {err}", self.id);
            self.op_queue.fail();
            self.emit(ViewEvent::ImageLoadingFailed);
        }
    }

    /// Applies finished background work. Call on the control thread after a wake.
    pub fn poll(&mut self) {
        while let Some(completion) = self.op_queue.poll() {
            match completion {
                Completion::Display(image) => {
                    self.widget.load_image_from_bitmap(image, self.options);
                }
                Completion::Failed(error) => {
                    log::error!("{}: could not load image: {error}", self.id);
                    self.emit(ViewEvent::ImageLoadingFailed);
                }
                Completion::ReleaseFailed => self.emit(ViewEvent::ImageLoadingFailed),
            }
        }
    }

    /// Widget callback: the handed buffer is on screen.
    pub fn on_load_success(&mut self) {
        log::info!("{}: image loaded", self.id);
        self.emit(ViewEvent::ImageLoaded);
    }

    /// Widget callback: the widget rejected the handed buffer.
    pub fn on_load_error(&mut self, message: &str) {
        log::error!("{}: error loading panorama: {message}", self.id);
        self.emit(ViewEvent::ImageLoadingFailed);
    }

    /// Cancels the active load, closes the cache and shuts the widget down.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        self.op_queue.cancel();
        self.op_queue.cache.close();
        log::info!("{}: shutting widget down", self.id);
        self.widget.shutdown();
    }

    fn emit(&self, event: ViewEvent) {
        self.sink.receive_event(self.id, event);
    }
}

impl Drop for PanoramaView {
    fn drop(&mut self) {
        self.destroy();
    }
}
