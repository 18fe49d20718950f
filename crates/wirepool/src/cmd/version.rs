use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("wirepool {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: wirepool");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("WIREPOOL_BUILD_TARGET").unwrap_or("unknown")
    );
    println!(
        "profile: {}",
        option_env!("WIREPOOL_BUILD_PROFILE").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("features: async={}, cli=true", cfg!(feature = "async"));
    println!(
        "defaults: max_header={}, max_body={}, max_frames_per_parse={}",
        wirepool_frame::DEFAULT_MAX_HEADER,
        wirepool_frame::DEFAULT_MAX_BODY,
        wirepool_frame::DEFAULT_MAX_FRAMES_PER_PARSE
    );

    Ok(SUCCESS)
}
