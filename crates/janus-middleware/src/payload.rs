//! Type-erased call messages.
//!
//! Stages see requests and responses as [`Payload`]s so a single chain can
//! wrap every method of a service. The transport adapter boxes the decoded
//! message on the way in and downcasts on the way out.

use janus_core::Status;
use std::any::{type_name, Any};
use std::fmt;

/// A message that can travel through the chain.
///
/// Implemented for every `Clone + Debug + Send + Sync + 'static` type.
pub trait Message: Any + fmt::Debug + Send + Sync {
    /// Clones into a new box.
    fn clone_boxed(&self) -> Box<dyn Message>;
    /// Borrows as `Any` for downcasting.
    fn as_any(&self) -> &dyn Any;
    /// Converts into `Any` for downcasting by value.
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;
    /// Type name of the concrete message, for diagnostics.
    fn type_name(&self) -> &'static str;
}

impl<T> Message for T
where
    T: Any + fmt::Debug + Clone + Send + Sync,
{
    fn clone_boxed(&self) -> Box<dyn Message> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }

    fn type_name(&self) -> &'static str {
        type_name::<T>()
    }
}

/// A boxed request or response message.
pub struct Payload(Box<dyn Message>);

impl Payload {
    /// Boxes a message.
    pub fn new<T: Message>(message: T) -> Self {
        Self(Box::new(message))
    }

    /// Returns `true` if the payload holds a `T`.
    pub fn is<T: Any>(&self) -> bool {
        self.0.as_any().is::<T>()
    }

    /// Borrows the message as `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref()
    }

    /// Unboxes the message as `T`.
    ///
    /// A mismatch is an `Internal` status: it means a handler produced a
    /// message the transport does not expect.
    pub fn downcast<T: Any>(self) -> Result<T, Status> {
        let found = self.0.type_name();
        self.0
            .into_any()
            .downcast::<T>()
            .map(|boxed| *boxed)
            .map_err(|_| {
                Status::internal(format!(
                    "unexpected payload type: expected {}, found {found}",
                    type_name::<T>()
                ))
            })
    }

    /// Type name of the held message.
    pub fn type_name(&self) -> &'static str {
        self.0.type_name()
    }
}

impl Clone for Payload {
    fn clone(&self) -> Self {
        Self(self.0.clone_boxed())
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}
