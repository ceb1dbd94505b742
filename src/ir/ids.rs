//! Newtype IDs for the numbered entities of a COCO export.
//!
//! COCO cross-references images, categories and annotations by integer id;
//! keeping the three apart at the type level stops an annotation id from
//! landing in an `image_id` field.

use serde::Serialize;
use std::fmt;

macro_rules! export_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            #[inline]
            pub fn new(id: u64) -> Self {
                Self(id)
            }

            #[inline]
            pub fn as_u64(&self) -> u64 {
                self.0
            }

            /// The id that follows this one.
            #[inline]
            pub fn next(&self) -> Self {
                Self(self.0 + 1)
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

export_id!(
    /// Position-derived id of an image within one export.
    ImageId
);

export_id!(
    /// Sequential id of a single exported box, unique across the batch.
    AnnotationId
);

export_id!(
    /// Category id derived from a label's registry index.
    CategoryId
);
