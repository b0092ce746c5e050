use std::{
    env,
    path::{Path, PathBuf},
    process::Command,
};

fn main() {
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let cpp_dir = manifest_dir.join("cpp");

    println!("cargo:rerun-if-changed=cpp/yuv_ffi.h");
    println!("cargo:rerun-if-env-changed=VCPKG_ROOT");

    generate_bindings(&cpp_dir);
    link_libyuv();
}

fn generate_bindings(cpp_dir: &Path) {
    let ffi_header = cpp_dir.join("yuv_ffi.h");

    bindgen::builder()
        .header(ffi_header.to_string_lossy().to_string())
        // Packed RGB -> I420
        .allowlist_function("ABGRToI420")
        .allowlist_function("ARGB4444ToI420")
        .allowlist_function("RGB565ToI420")
        // I420 <-> NV21
        .allowlist_function("I420ToNV21")
        .allowlist_function("NV21ToI420")
        // Geometry
        .allowlist_function("I420Rotate")
        .allowlist_function("I420Mirror")
        .allowlist_function("I420Scale")
        .generate()
        .expect("Failed to generate libyuv bindings")
        .write_to_file(Path::new(&env::var_os("OUT_DIR").unwrap()).join("yuv_ffi.rs"))
        .expect("Failed to write yuv_ffi.rs");
}

fn link_libyuv() {
    if let Ok(vcpkg_root) = env::var("VCPKG_ROOT") {
        if link_vcpkg(vcpkg_root.into()) {
            return;
        }
    }

    if link_pkg_config() {
        return;
    }

    if link_system() {
        return;
    }

    panic!(
        "libyuv not found!\n\
         \n\
         Install via one of:\n\
         - vcpkg: vcpkg install libyuv && export VCPKG_ROOT=/path/to/vcpkg\n\
         - apt (Debian/Ubuntu): sudo apt install libyuv-dev\n\
         - dnf (Fedora): sudo dnf install libyuv-devel\n\
         - pacman (Arch): sudo pacman -S libyuv\n\
         \n\
         Or build yuv-bridge without the `libyuv` feature to use the software engine.\n"
    );
}

fn vcpkg_triplet() -> Option<&'static str> {
    let target_arch = env::var("CARGO_CFG_TARGET_ARCH").unwrap_or_default();
    let target_os = env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();

    let triplet = match (target_os.as_str(), target_arch.as_str()) {
        ("linux", "x86_64") => "x64-linux",
        ("linux", "aarch64") => "arm64-linux",
        ("linux", "arm") => "arm-linux",
        ("android", "aarch64") => "arm64-android",
        ("android", "arm") => "arm-neon-android",
        ("android", "x86_64") => "x64-android",
        ("windows", "x86_64") => "x64-windows-static",
        ("macos", "x86_64") => "x64-osx",
        ("macos", "aarch64") => "arm64-osx",
        _ => {
            println!(
                "cargo:warning=Unsupported vcpkg target: {}-{}",
                target_os, target_arch
            );
            return None;
        }
    };
    Some(triplet)
}

fn link_vcpkg(mut path: PathBuf) -> bool {
    let Some(triplet) = vcpkg_triplet() else {
        return false;
    };

    path.push("installed");
    path.push(triplet);
    let lib_path = path.join("lib");

    if !lib_path.exists() {
        println!(
            "cargo:warning=vcpkg libyuv not found at: {}",
            lib_path.display()
        );
        return false;
    }

    println!("cargo:rustc-link-search=native={}", lib_path.display());

    let has_static = lib_path.join("libyuv.a").exists() || lib_path.join("yuv.lib").exists();
    if has_static {
        println!("cargo:rustc-link-lib=static=yuv");
        // vcpkg builds libyuv with MJPEG support, which pulls in libjpeg
        if lib_path.join("libturbojpeg.a").exists() {
            println!("cargo:rustc-link-lib=static=turbojpeg");
        } else if lib_path.join("libjpeg.a").exists() || lib_path.join("jpeg.lib").exists() {
            println!("cargo:rustc-link-lib=static=jpeg");
        }
    } else {
        println!("cargo:rustc-link-lib=yuv");
    }
    link_cxx_runtime();

    println!("cargo:info=Using libyuv from vcpkg: {}", path.display());
    true
}

fn link_pkg_config() -> bool {
    let output = match Command::new("pkg-config").args(["--libs", "libyuv"]).output() {
        Ok(o) => o,
        Err(_) => return false,
    };

    if !output.status.success() {
        return false;
    }

    emit_link_flags(&String::from_utf8_lossy(&output.stdout));
    link_cxx_runtime();

    println!("cargo:info=Using libyuv from pkg-config (dynamic linking)");
    true
}

fn emit_link_flags(flags: &str) {
    for flag in flags.split_whitespace() {
        if let Some(dir) = flag.strip_prefix("-L") {
            println!("cargo:rustc-link-search=native={}", dir);
        } else if let Some(lib) = flag.strip_prefix("-l") {
            println!("cargo:rustc-link-lib={}", lib);
        }
    }
}

fn link_system() -> bool {
    let lib_paths = [
        "/usr/lib",
        "/usr/lib64",
        "/usr/local/lib",
        "/usr/local/lib64",
        "/usr/lib/x86_64-linux-gnu",
        "/usr/lib/aarch64-linux-gnu",
        "/usr/lib/arm-linux-gnueabihf",
    ];

    for path in &lib_paths {
        if Path::new(path).join("libyuv.so").exists() {
            println!("cargo:rustc-link-search=native={}", path);
            println!("cargo:rustc-link-lib=yuv");
            link_cxx_runtime();

            println!("cargo:info=Using system libyuv from {} (dynamic linking)", path);
            return true;
        }
    }

    false
}

fn link_cxx_runtime() {
    let target_os = env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    match target_os.as_str() {
        "linux" | "windows" => println!("cargo:rustc-link-lib=stdc++"),
        "android" => println!("cargo:rustc-link-lib=c++_shared"),
        "macos" => println!("cargo:rustc-link-lib=c++"),
        _ => {}
    }
}
