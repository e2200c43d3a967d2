#![warn(clippy::all)]

use std::{
    cell::RefCell,
    fs,
    process::ExitCode,
    rc::Rc,
    sync::{Arc, mpsc},
};

use panorama_view::{
    DecodedImage, DisplayOptions, LoaderConfig, PanoramaWidget, ViewEvent, ViewId, ViewManager,
    Waker,
};

mod cli;

enum ProbeEvent {
    Wake,
    Finished(ViewEvent),
    Exit,
}

/// Accepts every buffer it is handed.
struct HeadlessWidget {
    shown: Rc<RefCell<Option<(u32, u32)>>>,
}

impl PanoramaWidget for HeadlessWidget {
    fn load_image_from_bitmap(&mut self, image: Arc<DecodedImage>, options: DisplayOptions) {
        let (width, height) = image.native_size;
        println!(
            "decoded {width}x{height} -> {}x{} (sample factor {}, {:?}, {} bytes)",
            image.width(),
            image.height(),
            image.sample_factor,
            options.input_type,
            image.buffer().as_raw().len()
        );
        *self.shown.borrow_mut() = Some(image.dimensions());
    }

    fn set_touch_tracking_enabled(&mut self, _: bool) {}
}

fn main() -> ExitCode {
    env_logger::init();

    let matches = cli::get_clap_command().get_matches();

    let mut config = LoaderConfig::load();
    if let Some(timeout) = matches.get_one::<u64>("TIMEOUT") {
        config.network_timeout_secs = Some(*timeout);
        config.clamp();
    }

    let (sender, receiver) = mpsc::channel();

    let wake_sender = sender.clone();
    let waker: Waker = Arc::new(move || {
        let _ = wake_sender.send(ProbeEvent::Wake);
    });

    let exit_sender = sender.clone();
    if let Err(err) = ctrlc::set_handler(move || {
        let _ = exit_sender.send(ProbeEvent::Exit);
    }) {
        eprintln!("{err}");
    }

    let sink = move |_: ViewId, event: ViewEvent| {
        let _ = sender.send(ProbeEvent::Finished(event));
    };

    let shown = Rc::new(RefCell::new(None));
    let mut manager = ViewManager::new(config, waker);
    let mut view = manager.create_view_instance(
        Box::new(HeadlessWidget {
            shown: shown.clone(),
        }),
        Box::new(sink),
    );

    view.set_image_url(matches.get_one::<String>("SOURCE").map(String::as_str));
    if let Some(path) = matches.get_one::<String>("DATA") {
        match fs::read_to_string(path) {
            Ok(data) => view.set_image_data(Some(data.as_str())),
            Err(err) => {
                eprintln!("could not read {path}: {err}");
                return ExitCode::FAILURE;
            }
        }
    }

    let width = matches.get_one::<u32>("WIDTH").copied().unwrap_or_default();
    let height = matches.get_one::<u32>("HEIGHT").copied().unwrap_or_default();
    view.set_dimensions(width, height);
    view.set_input_type(if matches.get_flag("STEREO") { "stereo" } else { "mono" });
    view.on_after_update_transaction();

    loop {
        match receiver.recv() {
            Ok(ProbeEvent::Wake) => {
                view.poll();
                let shown = shown.borrow_mut().take();
                if shown.is_some() {
                    view.on_load_success();
                }
            }
            Ok(ProbeEvent::Finished(event)) => {
                println!("{}", event.name());
                return match event {
                    ViewEvent::ImageLoaded => ExitCode::SUCCESS,
                    ViewEvent::ImageLoadingFailed => ExitCode::FAILURE,
                };
            }
            Ok(ProbeEvent::Exit) | Err(_) => return ExitCode::FAILURE,
        }
    }
}
