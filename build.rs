use std::env;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=cbindgen.toml");
    println!("cargo:rerun-if-changed=wrapper.h");
    println!("cargo:rerun-if-changed=src/export.rs");

    generate_shim_header();

    // The real runtime is only linked when the `rocm` feature is on; the
    // default build is backed by the in-crate mock runtime.
    if env::var("CARGO_FEATURE_ROCM").is_ok() {
        let rocm_path = env::var("ROCM_PATH").unwrap_or_else(|_| "/opt/rocm".to_string());
        link_runtime(&rocm_path);
        generate_bindings(&rocm_path);
    }
}

/// Emit the C header for the exported shim surface.
fn generate_shim_header() {
    let crate_dir = env::var("CARGO_MANIFEST_DIR").unwrap();
    let output_dir = PathBuf::from(&crate_dir).join("include");
    std::fs::create_dir_all(&output_dir).unwrap();

    let config = cbindgen::Config::from_file("cbindgen.toml").unwrap_or_default();

    cbindgen::Builder::new()
        .with_crate(&crate_dir)
        .with_config(config)
        .with_language(cbindgen::Language::C)
        .generate()
        .expect("Unable to generate shim header")
        .write_to_file(output_dir.join("hip_shim.h"));
}

fn link_runtime(rocm_path: &str) {
    println!("cargo:rustc-link-search=native={}/lib", rocm_path);
    println!("cargo:rustc-link-lib=dylib=amdhip64");
    println!("cargo:rustc-link-lib=dylib=hipblas");
}

fn generate_bindings(rocm_path: &str) {
    let bindings = bindgen::Builder::default()
        .header("wrapper.h")
        .clang_arg(format!("-I{}/include", rocm_path))
        .clang_arg("-D__HIP_PLATFORM_AMD__")
        .parse_callbacks(Box::new(bindgen::CargoCallbacks::new()))
        .allowlist_function("hip.*")
        .allowlist_type("hip.*")
        .allowlist_var("HIP.*")
        .size_t_is_usize(true)
        .derive_default(true)
        .generate()
        .expect("Unable to generate bindings");

    let out_path = PathBuf::from(env::var("OUT_DIR").unwrap());
    bindings
        .write_to_file(out_path.join("bindings.rs"))
        .expect("Couldn't write bindings!");
}
