//! Synthetic test-pattern device.
//!
//! Stands in for a real sensor driver: produces a horizontally scrolling
//! gradient so a viewer can see motion, honors the orientation flips and
//! brightness offset, and encodes JPEG for the stream and PNG for
//! stills. Useful on machines without a camera and as the device under
//! test.

use super::device::{CameraDevice, CaptureConfig, DeviceControl, DeviceError, DeviceResult};
use bytes::Bytes;

/// Gradient generator with a per-frame phase shift.
pub struct PatternCamera {
    config: CaptureConfig,
    frame_count: u64,
}

impl PatternCamera {
    pub fn new() -> Self {
        Self {
            config: CaptureConfig::default(),
            frame_count: 0,
        }
    }

    fn render(&self, width: u32, height: u32) -> image::GrayImage {
        let phase = (self.frame_count * 8) % u64::from(width.max(1));
        // Brightness in [-1, 1] maps to a +-64 luma offset.
        let offset = (self.config.brightness * 64.0) as i32;

        image::GrayImage::from_fn(width, height, |x, y| {
            let sx = if self.config.hflip { width - 1 - x } else { x };
            let sy = if self.config.vflip { height - 1 - y } else { y };
            let shifted = (u64::from(sx) + phase) % u64::from(width);
            let ramp = (shifted * 192 / u64::from(width.max(1))) as i32;
            let band = (u64::from(sy) * 63 / u64::from(height.max(1))) as i32;
            image::Luma([(ramp + band + offset).clamp(0, 255) as u8])
        })
    }
}

impl Default for PatternCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraDevice for PatternCamera {
    fn configure(&mut self, config: &CaptureConfig) -> DeviceResult<()> {
        if config.resolution.0 == 0 || config.resolution.1 == 0 {
            return Err(DeviceError::Configure("zero resolution".to_string()));
        }
        self.config = config.clone();
        Ok(())
    }

    fn next_frame(&mut self) -> DeviceResult<Bytes> {
        let (width, height) = self.config.resolution;
        let img = self.render(width, height);
        self.frame_count += 1;

        let mut jpeg = Vec::new();
        let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut jpeg, 80);
        encoder
            .encode_image(&img)
            .map_err(|e| DeviceError::Capture(format!("jpeg encode: {}", e)))?;
        Ok(Bytes::from(jpeg))
    }

    fn capture_still(&mut self) -> DeviceResult<Bytes> {
        let (width, height) = self.config.snapshot_resolution;
        let img = self.render(width, height);

        let mut png = std::io::Cursor::new(Vec::new());
        img.write_to(&mut png, image::ImageFormat::Png)
            .map_err(|e| DeviceError::Capture(format!("png encode: {}", e)))?;
        Ok(Bytes::from(png.into_inner()))
    }

    fn set_control(&mut self, control: DeviceControl, value: f64) -> DeviceResult<()> {
        match control {
            DeviceControl::AfMode => self.config.af_mode = value as i64,
            DeviceControl::AwbMode => self.config.awb_mode = value as i64,
            DeviceControl::Brightness => {
                if !(-1.0..=1.0).contains(&value) {
                    return Err(DeviceError::Control {
                        name: control.as_str().to_string(),
                        reason: format!("{} outside [-1, 1]", value),
                    });
                }
                self.config.brightness = value;
            }
        }
        Ok(())
    }

    fn close(&mut self) {
        tracing::debug!("Pattern camera closed");
    }
}
