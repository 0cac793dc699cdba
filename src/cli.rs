use clap::Parser;

/// Animated image viewer engine shell
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Folder of images to browse (.jpg, .jpeg, .png, .gif, .ico)
    #[arg(value_name = "FOLDER")]
    pub folder: String,

    /// Canvas width in pixels
    #[arg(long = "width", value_name = "PX", default_value = "500")]
    pub width: u32,

    /// Canvas height in pixels
    #[arg(long = "height", value_name = "PX", default_value = "500")]
    pub height: u32,

    /// Cache budget for decoded frames, in megabytes
    #[arg(long = "mem", value_name = "MB", default_value = "1024")]
    pub mem_mb: usize,

    /// Transform worker threads for animated decode
    #[arg(short = 'w', long = "workers", value_name = "N")]
    pub workers: Option<usize>,

    /// Animated file to play while a decode is in flight
    #[arg(short = 'l', long = "loading", value_name = "FILE")]
    pub loading: Option<String>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,
}
