pub fn get_clap_command() -> clap::Command {
    clap::Command::new("pano-probe")
        .about("Load a panorama source the way a view does and report the outcome")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            clap::Arg::new("SOURCE")
                .help("Image url or path to load")
                .index(1),
        )
        .arg(
            clap::Arg::new("DATA")
                .long("data")
                .value_name("FILE")
                .help("File holding a base64 encoded image, used when no SOURCE is given"),
        )
        .arg(
            clap::Arg::new("WIDTH")
                .long("width")
                .help("Target width in pixels")
                .value_parser(clap::value_parser!(u32))
                .default_value("0"),
        )
        .arg(
            clap::Arg::new("HEIGHT")
                .long("height")
                .help("Target height in pixels")
                .value_parser(clap::value_parser!(u32))
                .default_value("0"),
        )
        .arg(
            clap::Arg::new("STEREO")
                .long("stereo")
                .help("Treat the image as over-under stereo")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            clap::Arg::new("TIMEOUT")
                .long("timeout")
                .value_name("SECS")
                .help("Network timeout, overrides the stored config")
                .value_parser(clap::value_parser!(u64)),
        )
}
