use super::error::FrameError;
use byteorder::{ByteOrder, NativeEndian};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Size of the `u32` payload length prefix.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Size of the request header: `f32` scale factor followed by the length prefix.
pub const REQUEST_HEADER_SIZE: usize = 4 + LENGTH_PREFIX_SIZE;

/// Largest payload either side accepts (1 GiB). Checked before allocating.
pub const MAX_PAYLOAD_SIZE: u32 = 1 << 30;

/// Request sent by the front end: resize `payload` by `scale_factor`.
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeRequestFrame {
    pub scale_factor: f32,
    pub payload: Vec<u8>,
}

/// Response sent by the resize host: the resized image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResizeResponseFrame {
    pub payload: Vec<u8>,
}

impl ResizeRequestFrame {
    pub fn new(scale_factor: f32, payload: Vec<u8>) -> Result<Self, FrameError> {
        validate_scale_factor(scale_factor)?;
        payload_length(payload.len())?;
        Ok(Self {
            scale_factor,
            payload,
        })
    }

    pub fn encode_header(&self) -> Result<[u8; REQUEST_HEADER_SIZE], FrameError> {
        validate_scale_factor(self.scale_factor)?;
        let length = payload_length(self.payload.len())?;

        let mut header = [0u8; REQUEST_HEADER_SIZE];
        NativeEndian::write_f32(&mut header[..4], self.scale_factor);
        NativeEndian::write_u32(&mut header[4..], length);
        Ok(header)
    }

    /// Writes the whole frame and flushes the writer.
    pub async fn write_to<W>(&self, writer: &mut W) -> Result<(), FrameError>
    where
        W: AsyncWrite + Unpin,
    {
        let header = self.encode_header()?;
        writer.write_all(&header).await?;
        writer.write_all(&self.payload).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Reads exactly one request frame.
    ///
    /// The scale factor and length are read in full before the payload is
    /// touched; a peer that goes away early yields [`FrameError::Truncated`].
    pub async fn read_from<R>(reader: &mut R) -> Result<Self, FrameError>
    where
        R: AsyncRead + Unpin,
    {
        let mut header = [0u8; REQUEST_HEADER_SIZE];
        read_frame_start(reader, &mut header).await?;

        let scale_factor = NativeEndian::read_f32(&header[..4]);
        validate_scale_factor(scale_factor)?;
        let length = checked_length(NativeEndian::read_u32(&header[4..]))?;

        let payload = read_payload(reader, length).await?;
        Ok(Self {
            scale_factor,
            payload,
        })
    }
}

impl ResizeResponseFrame {
    pub fn new(payload: Vec<u8>) -> Result<Self, FrameError> {
        payload_length(payload.len())?;
        Ok(Self { payload })
    }

    pub fn encode_header(&self) -> Result<[u8; LENGTH_PREFIX_SIZE], FrameError> {
        let mut header = [0u8; LENGTH_PREFIX_SIZE];
        NativeEndian::write_u32(&mut header, payload_length(self.payload.len())?);
        Ok(header)
    }

    /// Writes the whole frame and flushes the writer.
    pub async fn write_to<W>(&self, writer: &mut W) -> Result<(), FrameError>
    where
        W: AsyncWrite + Unpin,
    {
        let header = self.encode_header()?;
        writer.write_all(&header).await?;
        writer.write_all(&self.payload).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Reads exactly one response frame.
    pub async fn read_from<R>(reader: &mut R) -> Result<Self, FrameError>
    where
        R: AsyncRead + Unpin,
    {
        let mut header = [0u8; LENGTH_PREFIX_SIZE];
        read_frame_start(reader, &mut header).await?;

        let length = checked_length(NativeEndian::read_u32(&header))?;
        let payload = read_payload(reader, length).await?;
        Ok(Self { payload })
    }
}

fn validate_scale_factor(scale_factor: f32) -> Result<(), FrameError> {
    if scale_factor.is_finite() && scale_factor > 0.0 {
        Ok(())
    } else {
        Err(FrameError::InvalidScaleFactor(scale_factor))
    }
}

fn payload_length(len: usize) -> Result<u32, FrameError> {
    match u32::try_from(len) {
        Ok(length) if length <= MAX_PAYLOAD_SIZE => Ok(length),
        _ => Err(FrameError::PayloadTooLarge {
            size: len as u64,
            limit: MAX_PAYLOAD_SIZE,
        }),
    }
}

fn checked_length(length: u32) -> Result<usize, FrameError> {
    if length > MAX_PAYLOAD_SIZE {
        return Err(FrameError::PayloadTooLarge {
            size: u64::from(length),
            limit: MAX_PAYLOAD_SIZE,
        });
    }
    Ok(length as usize)
}

/// Fills the header buffer, telling a clean close apart from a partial header.
async fn read_frame_start<R>(reader: &mut R, header: &mut [u8]) -> Result<(), FrameError>
where
    R: AsyncRead + Unpin,
{
    match read_full(reader, header).await {
        Err(FrameError::Truncated { received: 0, .. }) => Err(FrameError::ConnectionClosed),
        other => other,
    }
}

async fn read_payload<R>(reader: &mut R, length: usize) -> Result<Vec<u8>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut payload = vec![0u8; length];
    read_full(reader, &mut payload).await?;
    Ok(payload)
}

async fn read_full<R>(reader: &mut R, buf: &mut [u8]) -> Result<(), FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            return Err(FrameError::Truncated {
                expected: buf.len(),
                received: filled,
            });
        }
        filled += n;
    }
    Ok(())
}
