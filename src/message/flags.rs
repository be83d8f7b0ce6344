use bitflags::bitflags;

bitflags! {
    /// Flag bits of a ZMTP frame header. The bit values are the wire values.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FrameFlags: u8 {
        /// More frames of the same message follow this one.
        const MORE = 0b001;
        /// The length field is 8 bytes instead of 1.
        const LONG = 0b010;
        /// The frame carries a protocol command, not user data.
        const COMMAND = 0b100;
    }
}

impl FrameFlags {
  /// Bits 3-7 of the flags octet. A conforming peer never sets them.
  pub const RESERVED_MASK: u8 = !Self::all().bits();
}
