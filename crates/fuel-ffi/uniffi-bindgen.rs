//! UniFFI bindgen binary for generating Kotlin/Swift bindings
//!
//! Usage:
//!   cargo run -p fuel-ffi --features bindgen --bin uniffi-bindgen generate \
//!       --library target/aarch64-linux-android/release/libfuel_ffi.so \
//!       --language kotlin \
//!       --out-dir generated/kotlin

fn main() {
    uniffi::uniffi_bindgen_main()
}
