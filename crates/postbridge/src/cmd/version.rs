use postbridge_envelope::{Method, ResponseKind};

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("postbridge {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: postbridge");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "build_target: {}",
        option_env!("POSTBRIDGE_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "features: peer={}, schema={}, cli=true",
        cfg!(feature = "peer"),
        cfg!(feature = "schema")
    );
    println!("methods: {}", join(Method::ALL.iter().map(|m| m.as_str())));
    println!(
        "response_types: {}",
        join(ResponseKind::ALL.iter().map(|k| k.as_str()))
    );

    Ok(SUCCESS)
}

fn join<'a>(names: impl Iterator<Item = &'a str>) -> String {
    names.collect::<Vec<_>>().join(", ")
}
