// Fixtures shared by the unit tests of both process roles.

use crate::image_codec::{CodecError, ImageCodec, SharedImageCodec};
use crate::resize_host::listener::ResizeHost;
use crate::resize_host::worker_pool::WorkerPool;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::net::SocketAddr;
use std::num::NonZeroUsize;
use tokio::task::JoinHandle;

/// Runs a resize host on an ephemeral loopback port inside the current runtime.
pub async fn spawn_resize_host(codec: SharedImageCodec) -> (SocketAddr, JoinHandle<()>) {
    let pool = WorkerPool::new(codec, NonZeroUsize::new(4).unwrap());
    let host = ResizeHost::bind("127.0.0.1:0".parse().unwrap(), pool).unwrap();
    let addr = host.local_addr().unwrap();
    (addr, tokio::spawn(host.serve()))
}

/// Encodes a deterministic RGB gradient of the given size.
pub fn encoded_image(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let pixels = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 7 % 256) as u8, (y * 13 % 256) as u8, ((x + y) % 256) as u8])
    });
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(pixels)
        .write_to(&mut buffer, format)
        .unwrap();
    buffer.into_inner()
}

/// Builds a `multipart/form-data` body holding a single part.
/// Returns the body and the matching `Content-Type` header value.
pub fn multipart_body(
    field_name: &str,
    filename: Option<&str>,
    content_type: &str,
    data: &[u8],
) -> (Vec<u8>, String) {
    const BOUNDARY: &str = "gray-test-boundary-7MA4YWxkTrZu0gW";

    let disposition = match filename {
        Some(filename) => format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field_name, filename
        ),
        None => format!("Content-Disposition: form-data; name=\"{}\"\r\n", field_name),
    };

    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(disposition.as_bytes());
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    (body, format!("multipart/form-data; boundary={}", BOUNDARY))
}

/// Returns its input untouched; lets frame tests see exactly what the worker saw.
pub struct EchoCodec;

impl ImageCodec for EchoCodec {
    fn decode(&self, data: &[u8]) -> Result<DynamicImage, CodecError> {
        image::load_from_memory(data).map_err(CodecError::Decode)
    }

    fn to_grayscale_png(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        Ok(data.to_vec())
    }

    fn resize(&self, data: &[u8], _scale_factor: f32) -> Result<Vec<u8>, CodecError> {
        Ok(data.to_vec())
    }
}

/// Panics inside the worker when the first payload byte is `0xFF`, echoes otherwise.
pub struct PanickyCodec;

impl ImageCodec for PanickyCodec {
    fn decode(&self, data: &[u8]) -> Result<DynamicImage, CodecError> {
        image::load_from_memory(data).map_err(CodecError::Decode)
    }

    fn to_grayscale_png(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        Ok(data.to_vec())
    }

    fn resize(&self, data: &[u8], _scale_factor: f32) -> Result<Vec<u8>, CodecError> {
        if data.first() == Some(&0xFF) {
            panic!("resize blew up");
        }
        Ok(data.to_vec())
    }
}
