fn main() {
    println!("cargo:rerun-if-changed=./videostatus.proto");
    tonic_build::compile_protos("./videostatus.proto")
        .unwrap_or_else(|err| panic!("Failed to compile protos {:?}", err));
}
