//! Wire protocols. Only ZMTP 3.x is implemented.

pub mod zmtp;
