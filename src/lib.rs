//! Image acquisition for a native panorama view.
//!
//! A [`PanoramaView`] takes declarative properties (image url or inline base64
//! data, target dimensions, input layout), fetches and decodes the image on a
//! worker thread, downsamples it by a power of two to fit the target, caches the
//! result per view and hands it to a [`PanoramaWidget`]. Outcomes reach the
//! application as `onImageLoaded` / `onImageLoadingFailed` through an [`EventSink`].

pub mod app;
pub mod error;
pub mod image_io;
pub mod util;

pub use app::{
    Dimensions, PanoramaView, ViewManager, ViewProps,
    cache::Cache,
    op_queue::{CancellationToken, LoadState, Waker},
    preferences::LoaderConfig,
    widget::{EventSink, PanoramaWidget, ViewEvent, ViewId},
};
pub use error::{ConfigError, DecodeError, FetchError, LoadError};
pub use image_io::{
    fetch::{Fetcher, SourceDescriptor, SourceFetcher, SourceStream},
    load::{decode, sample_factor},
};
pub use util::{DecodedImage, DisplayOptions, InputType, TargetSize};
