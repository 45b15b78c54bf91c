//! UniFFI bindings crate for the fuel library
//!
//! Wraps the fuel crate for UniFFI library-mode binding generation by
//! re-exporting its FFI module and scaffolding.
//!
//! ## Building for Android
//!
//! 1. Build the shared library per ABI (with cargo-ndk):
//!    ```bash
//!    cargo ndk -t arm64-v8a -t x86_64 build --release -p fuel-ffi
//!    ```
//!
//! 2. Generate Kotlin bindings:
//!    ```bash
//!    cargo run -p fuel-ffi --features bindgen --bin uniffi-bindgen generate \
//!        --library target/aarch64-linux-android/release/libfuel_ffi.so \
//!        --language kotlin \
//!        --out-dir generated/kotlin
//!    ```

pub use fuel::ffi::*;

// Library mode needs the scaffolding re-exported from this cdylib
fuel::uniffi_reexport_scaffolding!();
