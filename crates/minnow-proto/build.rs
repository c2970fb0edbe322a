//! Build script for minnow-proto
//!
//! Generates gRPC/protobuf bindings during `cargo build`.

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .type_attribute(".", "#[allow(missing_docs)]")
        .compile(
            &[
                "proto/manager.proto",
                "proto/device.proto",
                "proto/protocol.proto",
            ],
            &["proto"],
        )?;

    Ok(())
}
