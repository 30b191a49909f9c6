use image::{ImageFormat, Luma};
use qrcode::{EcLevel, QrCode};
use std::io::Cursor;

use crate::error::{AppError, Result};

pub const MIN_DIMENSION: u32 = 300;

/// Renders a Pix copy-and-paste payload as a PNG QR code.
pub fn render_png(payload: &str) -> Result<Vec<u8>> {
    let code = QrCode::with_error_correction_level(payload.as_bytes(), EcLevel::M)
        .map_err(|e| AppError::QrCode(e.to_string()))?;

    let image = code
        .render::<Luma<u8>>()
        .min_dimensions(MIN_DIMENSION, MIN_DIMENSION)
        .quiet_zone(true)
        .build();

    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|e| AppError::QrCode(e.to_string()))?;

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];

    #[test]
    fn renders_a_png_of_at_least_300px() {
        let payload = "00020101021226830014br.gov.bcb.pix2561qrcodepix-h.bb.com.br/pix/v2/cobv/abc5204000053039865802BR5920Loja6008BRASILIA62070503***6304ABCD";
        let bytes = render_png(payload).unwrap();
        assert!(bytes.starts_with(PNG_MAGIC));

        let decoded = image::load_from_memory_with_format(&bytes, ImageFormat::Png).unwrap();
        assert!(decoded.width() >= MIN_DIMENSION);
        assert!(decoded.height() >= MIN_DIMENSION);
    }

    #[test]
    fn oversized_payload_is_a_qr_error() {
        let payload = "9".repeat(8000);
        assert!(matches!(render_png(&payload), Err(AppError::QrCode(_))));
    }
}
