//! Private wire protocol between the front end and the resize host.
//!
//! Every TCP connection carries exactly one exchange:
//!
//! ```text
//! request:  f32 scale_factor | u32 length | length bytes
//! response: u32 length       | length bytes
//! ```
//!
//! Numbers use the host's native byte order; both ends always run on the same
//! machine. There is no tag, version or checksum.

mod error;
mod frame;

pub use error::FrameError;
pub use frame::{ResizeRequestFrame, ResizeResponseFrame};

use std::net::{IpAddr, Ipv4Addr};

/// Address the resize host listens on unless told otherwise.
pub const DEFAULT_BACKEND_HOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// Port the resize host listens on unless told otherwise.
pub const DEFAULT_BACKEND_PORT: u16 = 9090;
