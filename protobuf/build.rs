fn main() {
    println!("cargo:rerun-if-changed=./remoteexec.proto");
    tonic_build::compile_protos("./remoteexec.proto")
        .unwrap_or_else(|err| panic!("Failed to compile protos {:?}", err));
}
