use std::env;
use std::path::PathBuf;

/// A native library silhouette links against, and how to locate it by hand.
struct NativeLibrary {
    name: &'static str,
    /// Directory under `<prefix>/share` that vcpkg creates for the port.
    vcpkg_port: &'static str,
    /// Variables that, when all set, mean the user already pointed us at it.
    overrides: &'static [&'static str],
}

const FFMPEG: NativeLibrary = NativeLibrary {
    name: "FFmpeg",
    vcpkg_port: "ffmpeg",
    overrides: &["FFMPEG_DIR"],
};

const OPENCV: NativeLibrary = NativeLibrary {
    name: "OpenCV",
    vcpkg_port: "opencv4",
    overrides: &["OPENCV_LINK_LIBS", "OPENCV_INCLUDE_PATHS"],
};

fn main() {
    for variable in [
        "FFMPEG_DIR",
        "VCPKG_ROOT",
        "VCPKGRS_TRIPLET",
        "OPENCV_LINK_LIBS",
        "OPENCV_LINK_PATHS",
        "OPENCV_INCLUDE_PATHS",
        "LIBCLANG_PATH",
    ] {
        println!("cargo:rerun-if-env-changed={variable}");
    }

    let target_os = env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    let mut libraries = vec![FFMPEG];
    if env::var_os("CARGO_FEATURE_CASCADE").is_some() {
        libraries.push(OPENCV);
        if target_os == "macos" && env::var_os("LIBCLANG_PATH").is_none() {
            println!(
                "cargo:warning=opencv generates its bindings with libclang; set LIBCLANG_PATH if it cannot find the Xcode or Homebrew LLVM."
            );
        }
    }

    // pkg-config finds both libraries on Unix; only Windows needs hints.
    if target_os == "windows" {
        for library in &libraries {
            hint_windows_location(library);
        }
    }
}

/// vcpkg install prefix for the configured triplet, if VCPKG_ROOT is set.
fn vcpkg_prefix() -> Option<PathBuf> {
    let root = env::var_os("VCPKG_ROOT")?;
    let triplet = env::var("VCPKGRS_TRIPLET").unwrap_or_else(|_| "x64-windows".to_owned());
    Some(PathBuf::from(root).join("installed").join(triplet))
}

fn hint_windows_location(library: &NativeLibrary) {
    if library
        .overrides
        .iter()
        .all(|variable| env::var_os(variable).is_some())
    {
        return;
    }

    let overrides = library.overrides.join(" and ");
    match vcpkg_prefix() {
        None => println!(
            "cargo:warning={} was not located: set {overrides}, or VCPKG_ROOT for a vcpkg install.",
            library.name
        ),
        Some(prefix) if prefix.join("share").join(library.vcpkg_port).is_dir() => println!(
            "cargo:warning=Using {} from vcpkg prefix {}.",
            library.name,
            prefix.display()
        ),
        Some(prefix) => println!(
            "cargo:warning=vcpkg port `{}` is missing under {}; run `vcpkg install {}` or set {overrides}.",
            library.vcpkg_port,
            prefix.display(),
            library.vcpkg_port
        ),
    }
}
