use h2stream_frame::{ChannelIds, Fnv1Ids, ProtocolVersion};

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("h2stream {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    let versions: Vec<&str> = ProtocolVersion::ALL.iter().map(|v| v.as_str()).collect();

    println!("name: h2stream");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("H2STREAM_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!("protocol_versions: {}", versions.join(", "));
    println!("channel_ids: {}", Fnv1Ids.scheme());
    println!("features: mux={}, cli=true", cfg!(feature = "mux"));

    Ok(SUCCESS)
}
