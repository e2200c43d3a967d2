use std::{
    fs::File,
    io::{self, Cursor, Read},
    path::PathBuf,
    sync::{Mutex, PoisonError},
    time::Duration,
};

use base64::{
    Engine,
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};
use reqwest::blocking::{Client, Response};
use url::Url;

use crate::{app::preferences::LoaderConfig, error::FetchError};

const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Where the bytes of an image come from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceDescriptor {
    LocalFile(PathBuf),
    RemoteUrl(Url),
    InlinePayload(String),
}

impl SourceDescriptor {
    /// No scheme or `file:` reads from disk, anything else goes over the network.
    pub fn from_image_url(value: &str) -> Self {
        match Url::parse(value) {
            Ok(url) if url.scheme() == "file" => {
                let path = url
                    .to_file_path()
                    .unwrap_or_else(|_| PathBuf::from(url.path()));
                Self::LocalFile(path)
            }
            // `C:\pano.jpg` parses with a one letter scheme
            Ok(url) if url.scheme().len() == 1 => Self::LocalFile(PathBuf::from(value)),
            Ok(url) => Self::RemoteUrl(url),
            Err(_) => Self::LocalFile(PathBuf::from(value)),
        }
    }

    pub fn from_image_data(payload: &str) -> Self {
        Self::InlinePayload(payload.to_owned())
    }

    fn describe(&self) -> String {
        match self {
            Self::LocalFile(path) => path.display().to_string(),
            Self::RemoteUrl(url) => url.to_string(),
            Self::InlinePayload(payload) => format!("<inline payload, {} chars>", payload.len()),
        }
    }

    fn stream_error(&self, error: io::Error) -> FetchError {
        match self {
            Self::RemoteUrl(url) => FetchError::network(url.as_str(), error),
            Self::LocalFile(path) => FetchError::Io {
                path: path.clone(),
                source: error,
            },
            Self::InlinePayload(_) => FetchError::Io {
                path: PathBuf::from("<inline>"),
                source: error,
            },
        }
    }
}

/// An open byte stream that must be closed explicitly once drained.
pub trait SourceStream: Read + Send {
    fn close(self: Box<Self>) -> io::Result<()>;
}

impl SourceStream for File {
    fn close(self: Box<Self>) -> io::Result<()> {
        drop(self);
        Ok(())
    }
}

impl SourceStream for Response {
    fn close(self: Box<Self>) -> io::Result<()> {
        drop(self);
        Ok(())
    }
}

impl SourceStream for Cursor<Vec<u8>> {
    fn close(self: Box<Self>) -> io::Result<()> {
        Ok(())
    }
}

/// Opens the transport for a source. Runs on worker threads only.
pub trait SourceFetcher: Send + Sync {
    fn open(&self, source: &SourceDescriptor) -> Result<Box<dyn SourceStream>, FetchError>;
}

/// The bytes of a drained source plus the outcome of releasing its stream.
#[derive(Debug)]
pub struct Fetched {
    pub bytes: Result<Vec<u8>, FetchError>,
    pub close_error: Option<io::Error>,
}

/// Drains `source` completely. The stream is closed on every path that opened one.
pub fn fetch(
    fetcher: &dyn SourceFetcher,
    source: &SourceDescriptor,
    limit: Option<u64>,
) -> Fetched {
    let mut stream = match fetcher.open(source) {
        Ok(stream) => stream,
        Err(error) => {
            return Fetched {
                bytes: Err(error),
                close_error: None,
            };
        }
    };

    let mut bytes = Vec::new();
    let read = match limit {
        Some(limit) => (&mut stream).take(limit.saturating_add(1)).read_to_end(&mut bytes),
        None => stream.read_to_end(&mut bytes),
    };

    let bytes = match read {
        Ok(_) => match limit {
            Some(limit) if bytes.len() as u64 > limit => Err(source.stream_error(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("payload exceeds {limit} bytes"),
            ))),
            _ => Ok(bytes),
        },
        Err(error) => Err(source.stream_error(error)),
    };

    let close_error = stream.close().err();
    if let Some(error) = &close_error {
        log::error!("Could not close input stream for {}: {error}", source.describe());
    }

    Fetched { bytes, close_error }
}

/// Decodes an inline payload. Whitespace and a `data:...;base64,` prefix are tolerated.
pub fn decode_payload(payload: &str) -> Result<Vec<u8>, FetchError> {
    let body = match payload.split_once(";base64,") {
        Some((head, body)) if head.starts_with("data:") => body,
        _ => payload,
    };
    let compact: String = body.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    Ok(PAYLOAD_ENGINE.decode(compact)?)
}

/// Default transport: the file system, `reqwest` for http(s), base64 for inline data.
pub struct Fetcher {
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    user_agent: String,
    client: Mutex<Option<Client>>,
}

impl Fetcher {
    pub fn new(config: &LoaderConfig) -> Self {
        Self {
            timeout: config.network_timeout(),
            connect_timeout: config.connect_timeout(),
            user_agent: config.user_agent.clone(),
            client: Mutex::new(None),
        }
    }

    fn client(&self) -> Result<Client, reqwest::Error> {
        let mut guard = self.client.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(client) = guard.as_ref() {
            return Ok(client.clone());
        }

        let mut builder = Client::builder().user_agent(self.user_agent.clone());
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(timeout) = self.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }

        let client = builder.build()?;
        *guard = Some(client.clone());
        Ok(client)
    }
}

impl SourceFetcher for Fetcher {
    fn open(&self, source: &SourceDescriptor) -> Result<Box<dyn SourceStream>, FetchError> {
        match source {
            SourceDescriptor::LocalFile(path) => match File::open(path) {
                Ok(file) => Ok(Box::new(file)),
                Err(error) => Err(FetchError::Io {
                    path: path.clone(),
                    source: error,
                }),
            },
            SourceDescriptor::RemoteUrl(url) => {
                let client = self
                    .client()
                    .map_err(|error| FetchError::network(url.as_str(), error))?;
                let response = client
                    .get(url.clone())
                    .send()
                    .map_err(|error| FetchError::network(url.as_str(), error))?;
                log::debug!("{url} responded with {}", response.status());
                Ok(Box::new(response))
            }
            SourceDescriptor::InlinePayload(payload) => {
                Ok(Box::new(Cursor::new(decode_payload(payload)?)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    struct Leaky {
        inner: Cursor<Vec<u8>>,
    }

    impl Read for Leaky {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.inner.read(buf)
        }
    }

    impl SourceStream for Leaky {
        fn close(self: Box<Self>) -> io::Result<()> {
            Err(io::Error::other("socket already gone"))
        }
    }

    struct LeakyFetcher;

    impl SourceFetcher for LeakyFetcher {
        fn open(&self, _: &SourceDescriptor) -> Result<Box<dyn SourceStream>, FetchError> {
            Ok(Box::new(Leaky {
                inner: Cursor::new(vec![1, 2, 3]),
            }))
        }
    }

    #[test]
    fn classifies_image_urls() {
        assert_eq!(
            SourceDescriptor::from_image_url("/sdcard/pano.jpg"),
            SourceDescriptor::LocalFile(PathBuf::from("/sdcard/pano.jpg"))
        );
        assert_eq!(
            SourceDescriptor::from_image_url("pano.jpg"),
            SourceDescriptor::LocalFile(PathBuf::from("pano.jpg"))
        );
        assert!(matches!(
            SourceDescriptor::from_image_url("https://example.com/pano.jpg"),
            SourceDescriptor::RemoteUrl(url) if url.host_str() == Some("example.com")
        ));
        assert!(matches!(
            SourceDescriptor::from_image_url("C:\\images\\pano.jpg"),
            SourceDescriptor::LocalFile(_)
        ));
    }

    #[cfg(unix)]
    #[test]
    fn file_scheme_is_local() {
        assert_eq!(
            SourceDescriptor::from_image_url("file:///tmp/my%20pano.jpg"),
            SourceDescriptor::LocalFile(PathBuf::from("/tmp/my pano.jpg"))
        );
    }

    #[test]
    fn payload_tolerates_whitespace_and_data_prefix() {
        assert_eq!(decode_payload("aGVs\nbG8=").unwrap(), b"hello");
        assert_eq!(
            decode_payload("data:image/png;base64,aGVsbG8").unwrap(),
            b"hello"
        );
        assert!(matches!(
            decode_payload("not base64!"),
            Err(FetchError::Decode(_))
        ));
    }

    #[test]
    fn reads_local_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"panorama").unwrap();

        let fetcher = Fetcher::new(&LoaderConfig::default());
        let source = SourceDescriptor::LocalFile(file.path().to_path_buf());
        let fetched = fetch(&fetcher, &source, None);
        assert_eq!(fetched.bytes.unwrap(), b"panorama");
        assert!(fetched.close_error.is_none());
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Fetcher::new(&LoaderConfig::default());
        let source = SourceDescriptor::LocalFile(dir.path().join("missing.jpg"));
        let fetched = fetch(&fetcher, &source, None);
        assert!(matches!(fetched.bytes, Err(FetchError::Io { .. })));
    }

    #[test]
    fn payload_limit_is_enforced() {
        let fetcher = Fetcher::new(&LoaderConfig::default());
        let source = SourceDescriptor::from_image_data("aGVsbG8=");
        assert!(fetch(&fetcher, &source, Some(5)).bytes.is_ok());
        assert!(fetch(&fetcher, &source, Some(4)).bytes.is_err());
    }

    #[test]
    fn close_failure_is_reported_next_to_bytes() {
        let source = SourceDescriptor::from_image_url("https://example.com/pano.jpg");
        let fetched = fetch(&LeakyFetcher, &source, None);
        assert_eq!(fetched.bytes.unwrap(), vec![1, 2, 3]);
        assert!(fetched.close_error.is_some());
    }
}
