use shadowcast_scene::TextureSource;

/// Decoded RGBA8 pixels, rows top to bottom.
#[derive(Debug, Clone, PartialEq)]
pub struct TexturePixels {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl TexturePixels {
    pub fn solid(color: [u8; 4]) -> Self {
        Self {
            width: 1,
            height: 1,
            rgba: color.to_vec(),
        }
    }

    /// Square checkerboard; the top-left cell uses `primary`.
    pub fn checker(size: u32, cells: u32, primary: [u8; 4], secondary: [u8; 4]) -> Self {
        let size = size.max(1);
        let cell = (size / cells.clamp(1, size)).max(1);
        let mut rgba = Vec::with_capacity((size * size * 4) as usize);
        for y in 0..size {
            for x in 0..size {
                let even = ((x / cell) + (y / cell)) % 2 == 0;
                rgba.extend_from_slice(if even { &primary } else { &secondary });
            }
        }
        Self {
            width: size,
            height: size,
            rgba,
        }
    }

    /// Pixels for sources that need no decoding; `None` for files.
    pub fn procedural(source: &TextureSource) -> Option<Self> {
        match *source {
            TextureSource::File { .. } => None,
            TextureSource::Checker {
                size,
                cells,
                primary,
                secondary,
            } => Some(Self::checker(size, cells, primary, secondary)),
            TextureSource::Solid { color } => Some(Self::solid(color)),
        }
    }
}
