use std::fs::File;
use std::io::{self, Read};

use tracing::{debug, warn};
use wirepool_frame::{FrameConfig, FrameError, FrameReader};

use crate::cmd::DecodeArgs;
use crate::exit::{frame_error, io_error, CliError, CliResult, DATA_INVALID, SUCCESS, USAGE};
use crate::output::{print_frame, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let mut config = FrameConfig::default();
    if let Some(max) = args.max_frames_per_parse {
        config.max_frames_per_parse = usize::try_from(max)
            .map_err(|_| CliError::new(USAGE, "--max-frames-per-parse is too large"))?;
    }

    let input: Box<dyn Read> = match &args.file {
        Some(path) => Box::new(
            File::open(path)
                .map_err(|err| io_error(&format!("failed opening {}", path.display()), err))?,
        ),
        None => Box::new(io::stdin().lock()),
    };

    let mut reader = FrameReader::with_config(input, config);
    let limit = args.count.unwrap_or(usize::MAX);
    let mut printed = 0usize;

    for frame in reader.frames().take(limit) {
        let frame = frame.map_err(|err| match err {
            FrameError::ConnectionClosed => CliError::new(DATA_INVALID, "input ended mid-frame"),
            other => frame_error("decode failed", other),
        })?;
        print_frame(printed, &frame, format);
        printed += 1;
    }

    let stats = reader.stats();
    if stats.resyncs > 0 || stats.malformed_headers > 0 {
        warn!(
            resyncs = stats.resyncs,
            malformed_headers = stats.malformed_headers,
            "input contained damaged frames"
        );
    }
    debug!(frames = printed, "decode finished");

    Ok(SUCCESS)
}
