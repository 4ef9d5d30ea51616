// Decodes image files into normalized luma planes for the engine.

use crate::core_modules::luma::LumaImage;
use crate::error::Result;
use image::DynamicImage;
use log::debug;
use std::path::Path;

/// Opens any format the `image` crate can decode and converts it to luma in [0, 1].
pub fn load_luma<P: AsRef<Path>>(path: P) -> Result<LumaImage> {
    let path = path.as_ref();
    let decoded = image::open(path)?;
    debug!(
        "decoded {}: {}x{}",
        path.display(),
        decoded.width(),
        decoded.height()
    );
    luma_from_dynamic(&decoded)
}

pub fn luma_from_dynamic(image: &DynamicImage) -> Result<LumaImage> {
    let rgba = image.to_rgba8();
    LumaImage::from_rgba8(rgba.width(), rgba.height(), rgba.as_raw())
}
