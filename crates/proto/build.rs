// SPDX-License-Identifier: BUSL-1.1

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tonic_prost_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_protos(&["../../proto/ratectl/v1/ratectl.proto"], &["../../proto"])?;

    println!("cargo:rerun-if-changed=../../proto/ratectl/v1/ratectl.proto");

    Ok(())
}
