//! Wire types shared by the host-side socket server and the external bridge.
//!
//! A request frame is a single JSON object naming a command and carrying an
//! opaque parameter mapping:
//!
//! ```json
//! {"type":"move_object","params":{"name":"Cube","location":[1.0,2.0,0.0]}}
//! ```
//!
//! The host answers each request with exactly one response frame terminated by
//! a newline:
//!
//! ```json
//! {"status":"success","result":{"name":"Cube","location":[1.0,2.0,0.0]}}
//! {"status":"error","message":"Object 'Cube' not found"}
//! ```
//!
//! Frames are self-delimiting JSON values rather than newline-delimited
//! lines, so the [`codec`] module decodes them incrementally from an
//! accumulating byte buffer.

pub mod codec;
mod command;
mod response;

pub use codec::{
    DEFAULT_MAX_FRAME_BYTES, DecodedFrame, FrameDecoder, FrameError, decode_frame, encode_frame,
    write_frame,
};
pub use command::{Command, Params};
pub use response::Response;
