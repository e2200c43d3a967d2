use std::{fmt, sync::Arc};

use crate::util::{DecodedImage, DisplayOptions};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewId(pub u32);

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "view#{}", self.0)
    }
}

/// Terminal notifications delivered to the application. Both carry an empty payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewEvent {
    ImageLoaded,
    ImageLoadingFailed,
}

impl ViewEvent {
    pub const ALL: [ViewEvent; 2] = [ViewEvent::ImageLoadingFailed, ViewEvent::ImageLoaded];

    /// Registration name used by the host's event system.
    pub fn name(&self) -> &'static str {
        match self {
            ViewEvent::ImageLoaded => "onImageLoaded",
            ViewEvent::ImageLoadingFailed => "onImageLoadingFailed",
        }
    }
}

/// The native panorama renderer. Owned and driven by the control thread.
///
/// After `load_image_from_bitmap` the widget reports back through
/// [`PanoramaView::on_load_success`](crate::PanoramaView::on_load_success) or
/// [`PanoramaView::on_load_error`](crate::PanoramaView::on_load_error).
pub trait PanoramaWidget {
    fn load_image_from_bitmap(&mut self, image: Arc<DecodedImage>, options: DisplayOptions);

    fn set_touch_tracking_enabled(&mut self, enabled: bool);

    /// Embedded display mode with the stereo, transition, info and fullscreen buttons hidden.
    fn configure_embedded(&mut self) {}

    fn shutdown(&mut self) {}
}

/// Receives events for a specific view instance.
pub trait EventSink {
    fn receive_event(&self, view: ViewId, event: ViewEvent);
}

impl<F> EventSink for F
where
    F: Fn(ViewId, ViewEvent),
{
    fn receive_event(&self, view: ViewId, event: ViewEvent) {
        self(view, event)
    }
}
