use std::sync::{Mutex, PoisonError};

use image::RgbImage;

use super::types::{MaskCandidate, SegmentationOracle};
use crate::error::Result;
use crate::prompt::{Extent, Prompt};

/// Lock-guarded handle over one stateful oracle.
///
/// `load_image` followed by `segment` runs under a single lock acquisition,
/// so concurrent requests against different images cannot interleave.
pub struct SharedOracle {
    inner: Mutex<Box<dyn SegmentationOracle>>,
    input_size: Extent,
}

impl SharedOracle {
    pub fn new(oracle: Box<dyn SegmentationOracle>) -> Self {
        let input_size = oracle.input_size();
        Self {
            inner: Mutex::new(oracle),
            input_size,
        }
    }

    pub fn input_size(&self) -> Extent {
        self.input_size
    }

    pub fn segment_image(
        &self,
        image: &RgbImage,
        prompt: &Prompt,
        multimask: bool,
    ) -> Result<Vec<MaskCandidate>> {
        let mut oracle = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        oracle.load_image(image)?;
        let result = oracle.segment(prompt, multimask);
        oracle.reset_state();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::mask::Mask;
    use crate::prompt::{Point, PromptBuilder};
    use std::sync::Arc;

    /// Records the width of the loaded image in every mask it returns.
    struct EchoOracle {
        loaded: Option<u32>,
    }

    impl SegmentationOracle for EchoOracle {
        fn load_image(&mut self, image: &RgbImage) -> Result<()> {
            self.loaded = Some(image.width());
            Ok(())
        }

        fn segment(&mut self, _prompt: &Prompt, _multimask: bool) -> Result<Vec<MaskCandidate>> {
            std::thread::yield_now();
            let width = self
                .loaded
                .ok_or_else(|| Error::inference("echo", "no image loaded"))?;
            Ok(vec![MaskCandidate::new(
                0,
                Mask::filled(Extent::new(width, 1), true),
                1.0,
            )])
        }

        fn reset_state(&mut self) {
            self.loaded = None;
        }

        fn input_size(&self) -> Extent {
            Extent::new(64, 64)
        }
    }

    #[test]
    fn concurrent_requests_see_their_own_image() {
        let oracle = Arc::new(SharedOracle::new(Box::new(EchoOracle { loaded: None })));
        let prompt = PromptBuilder::default()
            .build(&[Point::new(1, 1)], &[], None)
            .unwrap();

        let handles: Vec<_> = (1..=8u32)
            .map(|width| {
                let oracle = Arc::clone(&oracle);
                let prompt = prompt.clone();
                std::thread::spawn(move || {
                    for _ in 0..20 {
                        let image = RgbImage::new(width, 1);
                        let candidates = oracle.segment_image(&image, &prompt, true).unwrap();
                        assert_eq!(candidates[0].mask().extent().width, width);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(oracle.input_size(), Extent::new(64, 64));
    }
}
