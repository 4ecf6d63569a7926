fn main() -> Result<(), Box<dyn std::error::Error>> {
    if std::env::var_os("PROTOC").is_none() {
        std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);
    }

    let proto_root = "proto";
    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_protos(&[format!("{proto_root}/inference.proto")], &[proto_root])?;

    println!("cargo:rerun-if-changed={proto_root}/inference.proto");

    Ok(())
}
