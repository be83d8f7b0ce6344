//! Message-related types (`Msg`, `Frame`, `FrameFlags`, `Metadata`, `Blob`).

mod blob;
mod flags;
mod frame;
mod metadata;
mod msg;

pub use blob::Blob;
pub use flags::FrameFlags;
pub use frame::Frame;
pub use metadata::{Metadata, PROPERTY_IDENTITY, PROPERTY_RESOURCE, PROPERTY_SOCKET_TYPE};
pub use msg::Msg;
