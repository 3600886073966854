//! Binary encoding layer for ctxnet channels.
//!
//! [`NetBuf`] is a byte buffer that packs booleans, enum ordinals and
//! fixed-width bit fields into shared bytes. It writes signed varints with
//! the sign folded into the terminal byte, so small negative numbers stay
//! small. [`PayloadCodec`] pairs an encoder with a decoder for one payload
//! type, and [`Palette`] compresses repeated values to dense integer keys.
//!
//! A passthrough mode ([`BufConfig::passthrough`]) disables every
//! optimization for transports that manage bit layout themselves.

pub mod bits;
pub mod buf;
pub mod codec;
pub mod config;
pub mod error;
pub mod ident;
pub mod palette;
pub mod pos;
pub mod varint;

pub use bits::{bits_for_variants, NetEnum};
pub use buf::{NetBuf, SavedReaderIndex};
pub use codec::{NetPayload, PayloadCodec};
pub use config::BufConfig;
pub use error::{BufError, Result};
pub use ident::Identifier;
pub use palette::Palette;
pub use pos::{ChunkPos, GridPos};
pub use varint::{var_i32_len, MAX_VAR_INT_BYTES, MAX_VAR_LONG_BYTES};
