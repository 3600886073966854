use std::fmt;
use std::sync::Arc;

use crate::buf::NetBuf;
use crate::error::Result;

/// A value with a hand-written wire encoding.
pub trait NetPayload: Sized {
    fn encode(&self, buf: &mut NetBuf) -> Result<()>;

    fn decode(buf: &mut NetBuf) -> Result<Self>;
}

type EncodeFn<T> = dyn Fn(&mut NetBuf, &T) -> Result<()> + Send + Sync;
type DecodeFn<T> = dyn Fn(&mut NetBuf) -> Result<T> + Send + Sync;

/// An immutable encode/decode pair for one payload type.
///
/// Each codec must consume exactly the bytes it produced: payload segments
/// are concatenated without length prefixes.
pub struct PayloadCodec<T> {
    encode: Arc<EncodeFn<T>>,
    decode: Arc<DecodeFn<T>>,
}

impl<T> PayloadCodec<T> {
    /// Create a codec from an encoder and a decoder.
    pub fn new(
        encode: impl Fn(&mut NetBuf, &T) -> Result<()> + Send + Sync + 'static,
        decode: impl Fn(&mut NetBuf) -> Result<T> + Send + Sync + 'static,
    ) -> Self {
        Self {
            encode: Arc::new(encode),
            decode: Arc::new(decode),
        }
    }

    pub fn encode(&self, buf: &mut NetBuf, value: &T) -> Result<()> {
        (self.encode)(buf, value)
    }

    pub fn decode(&self, buf: &mut NetBuf) -> Result<T> {
        (self.decode)(buf)
    }
}

impl<T: NetPayload + 'static> PayloadCodec<T> {
    /// Codec backed by the type's own [`NetPayload`] implementation.
    pub fn of() -> Self {
        Self::new(|buf, value: &T| value.encode(buf), T::decode)
    }
}

impl PayloadCodec<()> {
    /// Codec for payloads that carry no bytes.
    pub fn unit() -> Self {
        Self::new(|_, _| Ok(()), |_| Ok(()))
    }
}

impl<T> Clone for PayloadCodec<T> {
    fn clone(&self) -> Self {
        Self {
            encode: Arc::clone(&self.encode),
            decode: Arc::clone(&self.decode),
        }
    }
}

impl<T> fmt::Debug for PayloadCodec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PayloadCodec")
            .field("type", &std::any::type_name::<T>())
            .finish()
    }
}
