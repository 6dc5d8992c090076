//! Build script for the libgphoto2 backend.
//!
//! With the `gphoto2` feature enabled this generates Rust bindings from the
//! system libgphoto2 headers using bindgen and links the two libraries.
//! Without the feature nothing is generated or linked.

fn main() {
    println!("cargo:rerun-if-changed=wrapper.h");
    println!("cargo:rerun-if-env-changed=GPHOTO2_INCLUDE_DIR");

    #[cfg(feature = "gphoto2")]
    gphoto2::generate_bindings();
}

#[cfg(feature = "gphoto2")]
mod gphoto2 {
    use std::env;
    use std::path::{Path, PathBuf};

    fn include_dirs() -> Vec<String> {
        if let Ok(dir) = env::var("GPHOTO2_INCLUDE_DIR") {
            // Explicit include dir, so link by name
            println!("cargo:rustc-link-lib=gphoto2");
            println!("cargo:rustc-link-lib=gphoto2_port");
            return vec![dir];
        }

        // Try pkg-config first; it also emits the link flags
        if let Ok(lib) = pkg_config::probe_library("libgphoto2") {
            return lib
                .include_paths
                .iter()
                .map(|p| p.to_string_lossy().to_string())
                .collect();
        }

        // Fallback to standard locations
        println!("cargo:rustc-link-lib=gphoto2");
        println!("cargo:rustc-link-lib=gphoto2_port");

        let lib_paths = ["/usr/local/lib", "/usr/lib", "/usr/lib/x86_64-linux-gnu", "/opt/homebrew/lib"];
        for path in lib_paths {
            if Path::new(path).join("libgphoto2.so").exists() || Path::new(path).join("libgphoto2.dylib").exists() {
                println!("cargo:rustc-link-search=native={}", path);
                break;
            }
        }

        for path in ["/usr/local/include", "/usr/include", "/opt/homebrew/include"] {
            if Path::new(path).join("gphoto2/gphoto2.h").exists() {
                return vec![path.to_string()];
            }
        }
        vec!["/usr/local/include".to_string()]
    }

    pub fn generate_bindings() {
        let includes = include_dirs();
        for dir in &includes {
            println!("cargo:rerun-if-changed={}/gphoto2/gphoto2.h", dir);
        }

        let bindings = bindgen::Builder::default()
            .header("wrapper.h")
            .clang_args(includes.iter().map(|dir| format!("-I{}", dir)))
            .allowlist_function("gp_context_.*")
            .allowlist_function("gp_camera_.*")
            .allowlist_function("gp_abilities_list_.*")
            .allowlist_function("gp_port_info_list_.*")
            .allowlist_function("gp_port_set_timeout")
            .allowlist_function("gp_widget_.*")
            .allowlist_function("gp_setting_set")
            .allowlist_function("gp_result_as_string")
            .allowlist_function("free")
            .allowlist_type("CameraWidgetType")
            .allowlist_type("CameraEventType")
            .allowlist_var("GP_OK")
            // Keep enum variants as top-level constants over a plain integer type
            .default_enum_style(bindgen::EnumVariation::Consts)
            .derive_debug(false)
            .derive_default(true)
            .derive_copy(true)
            .generate_comments(false)
            .parse_callbacks(Box::new(bindgen::CargoCallbacks::new()))
            .generate()
            .expect("Unable to generate libgphoto2 bindings");

        let out_path = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR is set by cargo"));
        bindings
            .write_to_file(out_path.join("gphoto2_bindings.rs"))
            .expect("Couldn't write libgphoto2 bindings!");
    }
}
