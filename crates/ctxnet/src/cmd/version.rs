use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("ctxnet {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: ctxnet");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("CTXNET_BUILD_TARGET").unwrap_or("unknown")
    );
    println!(
        "features: loopback={}, async={}, cli=true",
        cfg!(feature = "loopback"),
        cfg!(feature = "async")
    );

    Ok(SUCCESS)
}
