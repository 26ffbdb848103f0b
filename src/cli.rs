use clap::Parser;
use std::path::PathBuf;

// Build version with decoder info
const VERSION_INFO: &str = const_format::concatcp!(
    env!("CARGO_PKG_VERSION"), "\n",
    "Images: image 0.25 (tga, jpeg, bmp, tiff, png, exr, hdr)\n",
    "Textures: dds (block-compressed, passthrough)\n",
    "Target: ", std::env::consts::ARCH, "-", std::env::consts::OS
);

/// Image sequence player with background prefetch
#[derive(Parser, Debug)]
#[command(author, version = VERSION_INFO, about, long_about = None)]
pub struct Args {
    /// Directory of frames, or a glob pattern (e.g. "shots/*.exr")
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Playback frame rate
    #[arg(long = "fps", value_name = "FPS", default_value = "24")]
    pub fps: f32,

    /// Decode worker threads (0 = immediate mode, decode inline)
    #[arg(short = 'w', long = "workers", value_name = "N")]
    pub workers: Option<usize>,

    /// Look-ahead buffer size in frames
    #[arg(short = 'b', long = "buffer", value_name = "N")]
    pub buffer: Option<usize>,

    /// Enable looping
    #[arg(short = 'o', long = "loop", value_name = "0|1")]
    pub loop_playback: Option<u8>,

    /// Play backwards after reaching the end of a loop (ping-pong)
    #[arg(short = 'r', long = "reverse")]
    pub reverse: bool,

    /// Playback speed multiplier
    #[arg(short = 's', long = "speed", value_name = "X")]
    pub speed: Option<f32>,

    /// Stop after this many seconds of wall time (default: one pass through the sequence)
    #[arg(long = "seconds", value_name = "S")]
    pub seconds: Option<f32>,

    /// Host tick rate in Hz
    #[arg(long = "tick-rate", value_name = "HZ", default_value = "60")]
    pub tick_rate: f32,

    /// Load DDS textures and keep them block-compressed
    #[arg(long = "compressed")]
    pub compressed: bool,

    /// Keep uploaded textures after their pixels are evicted
    #[arg(long = "persist-gpu")]
    pub persist_gpu: bool,

    /// Enable debug logging to file (default: seqplay.log)
    #[arg(short = 'l', long = "log", value_name = "LOG_FILE")]
    pub log_file: Option<Option<PathBuf>>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Custom configuration directory (overrides default platform paths)
    #[arg(short = 'c', long = "config-dir", value_name = "DIR")]
    pub config_dir: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["seqplay", "/frames"]);
        assert_eq!(args.path, PathBuf::from("/frames"));
        assert_eq!(args.fps, 24.0);
        assert_eq!(args.workers, None);
        assert!(args.log_file.is_none());
        assert_eq!(args.verbosity, 0);
    }

    #[test]
    fn test_overrides() {
        let args = Args::parse_from([
            "seqplay", "/frames", "--fps", "10", "-w", "0", "--buffer", "5", "--loop", "0",
            "--reverse", "--log", "-vv",
        ]);
        assert_eq!(args.fps, 10.0);
        assert_eq!(args.workers, Some(0));
        assert_eq!(args.buffer, Some(5));
        assert_eq!(args.loop_playback, Some(0));
        assert!(args.reverse);
        assert_eq!(args.log_file, Some(None));
        assert_eq!(args.verbosity, 2);
    }
}
