use std::error::Error;
use std::fmt;

macro_rules! message_error {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        pub struct $name {
            pub(crate) message: String,
        }

        impl $name {
            pub(crate) fn new(message: impl Into<String>) -> Self {
                Self {
                    message: message.into(),
                }
            }

            pub fn message(&self) -> &str {
                &self.message
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.message)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.message)
            }
        }

        impl Error for $name {}
    };
}

message_error!(
    /// Input rejected before it reached the engine.
    ValidationError
);

message_error!(
    /// Non-empty error slot returned by the engine. The message is the
    /// engine's text, unmodified.
    IqTreeError
);

message_error!(
    /// The engine broke the result envelope contract, or an envelope was
    /// converted more than once.
    ProtocolError
);

message_error!(
    /// Text returned by the engine could not be interpreted.
    ParseIqTreeError
);

message_error!(
    /// The engine library or one of its symbols could not be loaded.
    LibraryError
);
