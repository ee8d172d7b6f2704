//! Companion activation link and its scannable renderings.

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{DynamicImage, ImageOutputFormat, Luma};
use qrcode::render::unicode::Dense1x2;
use qrcode::QrCode;
use serde::Serialize;

use crate::auth::AuthError;

const QR_MIN_DIMENSION: u32 = 240;

/// Activation link plus a PNG data URL of the same link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivationCode {
    pub url: String,
    pub qr_data_url: String,
}

impl ActivationCode {
    /// Build the companion link for `user_code` and render it.
    pub fn for_user_code(companion_base_url: &str, user_code: &str) -> Result<Self, AuthError> {
        let url = activation_url(companion_base_url, user_code);
        let qr_data_url = qr_data_url(&url)?;
        Ok(Self { url, qr_data_url })
    }
}

/// `{companion}/activate?code={user_code}`
pub fn activation_url(companion_base_url: &str, user_code: &str) -> String {
    format!(
        "{}/activate?code={}",
        companion_base_url.trim_end_matches('/'),
        urlencoding::encode(user_code)
    )
}

/// Encode `payload` as a QR code and return it as a `data:image/png;base64,` URL.
pub fn qr_data_url(payload: &str) -> Result<String, AuthError> {
    let code = QrCode::new(payload.as_bytes()).map_err(|e| AuthError::Render(e.to_string()))?;
    let image = code
        .render::<Luma<u8>>()
        .min_dimensions(QR_MIN_DIMENSION, QR_MIN_DIMENSION)
        .build();
    let mut png = Vec::new();
    DynamicImage::ImageLuma8(image)
        .write_to(&mut Cursor::new(&mut png), ImageOutputFormat::Png)
        .map_err(|e| AuthError::Render(e.to_string()))?;
    Ok(format!("data:image/png;base64,{}", STANDARD.encode(png)))
}

/// Render `payload` as a QR code made of half-block characters for terminals.
pub fn qr_terminal(payload: &str) -> Result<String, AuthError> {
    let code = QrCode::new(payload.as_bytes()).map_err(|e| AuthError::Render(e.to_string()))?;
    Ok(code
        .render::<Dense1x2>()
        .dark_color(Dense1x2::Light)
        .light_color(Dense1x2::Dark)
        .build())
}
