use crate::imaging::RawImage;
use crate::{Error, Result};
use std::path::Path;

/// Decode an image file into `[0, 1]` floats, keeping colour when present.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<RawImage> {
    let path = path.as_ref();
    let img = image::open(path).map_err(|source| Error::ImageLoad {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(RawImage::from_dynamic(&img))
}

pub fn validate_image_size(image: &RawImage, min_size: usize) -> Result<()> {
    let (h, w) = image.shape();
    if w < min_size || h < min_size {
        return Err(Error::invalid_parameter(format!(
            "image too small: {}x{}, minimum: {}x{}",
            w, h, min_size, min_size
        )));
    }
    Ok(())
}
