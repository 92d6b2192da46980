use std::path::Path;

/// Whether a CUDA device looks usable from this process.
pub fn cuda_available() -> bool {
    cuda_available_with(
        std::env::var("CUDA_VISIBLE_DEVICES").ok().as_deref(),
        Path::new("/dev/nvidiactl").exists(),
    )
}

/// `CUDA_VISIBLE_DEVICES` wins when set; otherwise the driver node decides.
pub fn cuda_available_with(visible_devices: Option<&str>, driver_present: bool) -> bool {
    match visible_devices.map(str::trim) {
        Some("") | Some("-1") => false,
        Some(_) => true,
        None => driver_present,
    }
}
