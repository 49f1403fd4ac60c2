//! Payload contract for channel items.
//!
//! Any type carried by a port must provide a neutral value (its `Default`),
//! which storages use to clear slots after they are drained, and must be
//! cheaply clonable within a single cycle row.
//!
//! Payloads may additionally expose an item identifier. When they do, every
//! successful write reports an "item moved" notification to the channel's
//! event tap, if one is installed. The check is resolved statically through
//! the [`Payload::item_id`] hook: silent payloads keep the default
//! implementation and pay nothing.

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use crate::types::ItemId;

/// Types that can travel through a port.
///
/// # Example
///
/// ```
/// use cycleport::payload::Payload;
/// use cycleport::types::ItemId;
///
/// #[derive(Clone, Default)]
/// struct Uop {
///     id: ItemId,
///     opcode: u16,
/// }
///
/// impl Payload for Uop {
///     fn item_id(&self) -> Option<ItemId> {
///         Some(self.id)
///     }
/// }
///
/// let uop = Uop { id: 7, opcode: 3 };
/// assert_eq!(uop.item_id(), Some(7));
/// assert_eq!(0u32.item_id(), None);
/// ```
pub trait Payload: Clone + Default + Send + 'static {
    /// Returns the identifier to report when this item moves through a port,
    /// or `None` for silent payloads.
    fn item_id(&self) -> Option<ItemId> {
        None
    }
}

macro_rules! impl_silent_payload {
    ($($ty:ty),* $(,)?) => {
        $(impl Payload for $ty {})*
    };
}

impl_silent_payload!(
    (), bool, char, u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64,
    String,
);

impl<T: Clone + Send + 'static> Payload for Vec<T> {}

impl<A: Payload, B: Payload> Payload for (A, B) {}

impl<T: Payload> Payload for Option<T> {
    fn item_id(&self) -> Option<ItemId> {
        self.as_ref().and_then(Payload::item_id)
    }
}

impl<T: Payload> Payload for Box<T> {
    fn item_id(&self) -> Option<ItemId> {
        (**self).item_id()
    }
}

impl<T: Payload + Sync> Payload for Arc<T> {
    fn item_id(&self) -> Option<ItemId> {
        (**self).item_id()
    }
}

/// Identifies the payload type of an endpoint.
///
/// Two endpoints may only be connected when their tags are equal.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeTag {
    id: TypeId,
    name: &'static str,
}

impl TypeTag {
    /// Returns the tag of `T`.
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Returns the type name, for diagnostics.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}
