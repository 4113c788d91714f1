fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Version and build time are logged by `shoplens::init`
    built::write_built_file()
        .expect("Failed to acquire build-time information");
}
