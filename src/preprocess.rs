use image::{imageops::FilterType, DynamicImage};

pub const INPUT_SIZE: u32 = 224;

// ImageNet statistics.
pub const CHANNEL_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const CHANNEL_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Dense `f32` tensor in channel-first order.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    dims: Vec<usize>,
    data: Vec<f32>,
}

impl ImageTensor {
    pub fn zeros(dims: &[usize]) -> Self {
        ImageTensor {
            dims: dims.to_vec(),
            data: vec![0.0; dims.iter().product()],
        }
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Prepends a batch dimension of size 1.
    pub fn unsqueeze(mut self) -> Self {
        self.dims.insert(0, 1);
        self
    }

    /// Data reordered from `[N, C, H, W]` to `[N, H, W, C]`, with the new dims.
    pub fn to_nhwc(&self) -> (Vec<usize>, Vec<f32>) {
        let [n, c, h, w] = match self.dims[..] {
            [n, c, h, w] => [n, c, h, w],
            [c, h, w] => [1, c, h, w],
            _ => return (self.dims.clone(), self.data.clone()),
        };

        let mut out = Vec::with_capacity(self.data.len());
        for b in 0..n {
            let batch = &self.data[b * c * h * w..(b + 1) * c * h * w];
            for y in 0..h {
                for x in 0..w {
                    for ch in 0..c {
                        out.push(batch[ch * h * w + y * w + x]);
                    }
                }
            }
        }
        (vec![n, h, w, c], out)
    }
}

/// RGB, 224x224 bilinear resize, scale to [0, 1], per-channel normalize.
/// Returns a `[3, 224, 224]` tensor.
pub fn preprocess(image: &DynamicImage) -> ImageTensor {
    let rgb = image.to_rgb8();
    let resized = image::imageops::resize(&rgb, INPUT_SIZE, INPUT_SIZE, FilterType::Triangle);

    let plane = (INPUT_SIZE * INPUT_SIZE) as usize;
    let mut data = vec![0.0f32; 3 * plane];
    for (i, pixel) in resized.pixels().enumerate() {
        for c in 0..3 {
            let value = pixel[c] as f32 / 255.0;
            data[c * plane + i] = (value - CHANNEL_MEAN[c]) / CHANNEL_STD[c];
        }
    }

    ImageTensor {
        dims: vec![3, INPUT_SIZE as usize, INPUT_SIZE as usize],
        data,
    }
}
