use std::fs;

use wirepool_frame::{decode_header, FrameWriter};

use crate::cmd::EncodeArgs;
use crate::exit::{frame_error, io_error, CliError, CliResult, SUCCESS, USAGE};

pub fn run(args: EncodeArgs) -> CliResult<i32> {
    let body = resolve_body(&args)?;
    let mut writer = FrameWriter::new(std::io::stdout().lock());

    let written = if args.raw_header {
        writer.send_raw(args.header.as_bytes(), &body)
    } else {
        let header = decode_header(args.header.as_bytes())
            .map_err(|err| CliError::new(USAGE, format!("--header is not a JSON object: {err}")))?;
        writer.send(&header, &body)
    };
    written.map_err(|err| frame_error("encode failed", err))?;

    writer
        .flush()
        .map_err(|err| frame_error("flush failed", err))?;
    Ok(SUCCESS)
}

fn resolve_body(args: &EncodeArgs) -> CliResult<Vec<u8>> {
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(path) = &args.file {
        return fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
    }
    Ok(Vec::new())
}
