use candle_core::Device;
use tracing::info;

/// Pick a compute device. `preference` is `auto`, `cpu`, `cuda` or `metal`;
/// accelerators fall back to CPU when unavailable or not compiled in.
pub fn select_device(preference: &str) -> Device {
    let pref = preference.to_ascii_lowercase();
    #[cfg(feature = "cuda")]
    {
        if pref == "auto" || pref == "cuda" {
            if let Ok(dev) = Device::new_cuda(0) { info!("Device: CUDA 0"); return dev; }
        }
    }
    #[cfg(feature = "metal")]
    {
        if pref == "auto" || pref == "metal" {
            if let Ok(dev) = Device::new_metal(0) { info!("Device: Metal (MPS)"); return dev; }
        }
    }
    info!(requested = %pref, "Device: CPU");
    Device::Cpu
}
