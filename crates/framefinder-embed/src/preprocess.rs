use anyhow::Result;
use candle_core::{DType, Device, Tensor};
use image::imageops::FilterType;
use image::RgbImage;

pub const BLIP_IMAGE_SIZE: u32 = 384;
const BLIP_MEAN: [f32; 3] = [0.481_454_66, 0.457_827_5, 0.408_210_73];
const BLIP_STD: [f32; 3] = [0.268_629_54, 0.261_302_58, 0.275_777_11];

fn to_chw(image: &RgbImage, size: u32) -> Result<Tensor> {
    let resized = image::imageops::resize(image, size, size, FilterType::Triangle);
    let side = size as usize;
    let t = Tensor::from_vec(resized.into_raw(), (side, side, 3), &Device::Cpu)?
        .permute((2, 0, 1))?
        .to_dtype(DType::F32)?;
    Ok(t)
}

/// `[1, 3, 384, 384]` pixels scaled to [0,1] and normalized with the BLIP mean/std.
pub fn blip_pixels(image: &RgbImage, device: &Device) -> Result<Tensor> {
    let t = (to_chw(image, BLIP_IMAGE_SIZE)? / 255.)?;
    let mean = Tensor::new(&BLIP_MEAN, &Device::Cpu)?.reshape((3, 1, 1))?;
    let std = Tensor::new(&BLIP_STD, &Device::Cpu)?.reshape((3, 1, 1))?;
    let t = t.broadcast_sub(&mean)?.broadcast_div(&std)?;
    Ok(t.unsqueeze(0)?.to_device(device)?)
}

/// `[1, 3, S, S]` pixels mapped to [-1, 1], as the CLIP vision tower expects.
pub fn clip_pixels(image: &RgbImage, size: usize, device: &Device) -> Result<Tensor> {
    let t = to_chw(image, u32::try_from(size)?)?.affine(2. / 255., -1.)?;
    Ok(t.unsqueeze(0)?.to_device(device)?)
}
