//! # Workload Objects
//!
//! Plain byte payloads used to load the allocators. The sizes are chosen so
//! each falls into a different buddy level with a different amount of
//! internal fragmentation.
//!
//! | Object    | Bytes  | Buddy block |
//! |-----------|--------|-------------|
//! | `Cube`    | 100    | 512         |
//! | `Pyramid` | 1487   | 2048        |
//! | `Sphere`  | 10000  | 16384       |

macro_rules! workload_object {
    ($(#[$meta:meta])* $name:ident, $size:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq)]
        #[repr(transparent)]
        pub struct $name {
            bytes: [u8; $size],
        }

        impl $name {
            /// Payload size in bytes.
            pub const SIZE: usize = $size;

            /// Creates an object with every byte set to `byte`.
            #[inline]
            #[must_use]
            pub const fn filled(byte: u8) -> Self {
                Self { bytes: [byte; $size] }
            }

            /// Returns the payload.
            #[inline]
            #[must_use]
            pub const fn bytes(&self) -> &[u8] {
                &self.bytes
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::filled(0)
            }
        }

        // Payload bytes are left out of the output.
        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("size", &Self::SIZE)
                    .finish_non_exhaustive()
            }
        }
    };
}

workload_object!(
    /// Small object, served by the pool.
    Cube,
    100
);

workload_object!(
    /// Medium object.
    Pyramid,
    1487
);

workload_object!(
    /// Large object.
    Sphere,
    10_000
);

/// The three workload classes, used where a frame rotates through a mix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// See [`Cube`].
    Cube,
    /// See [`Pyramid`].
    Pyramid,
    /// See [`Sphere`].
    Sphere,
}

impl ObjectKind {
    /// All kinds, smallest first.
    pub const ALL: [Self; 3] = [Self::Cube, Self::Pyramid, Self::Sphere];

    /// Kind of the `index`-th object in a rotating mix.
    #[inline]
    #[must_use]
    pub const fn rotating(index: usize) -> Self {
        Self::ALL[index % Self::ALL.len()]
    }

    /// Payload size in bytes.
    #[inline]
    #[must_use]
    pub const fn size(self) -> usize {
        match self {
            Self::Cube => Cube::SIZE,
            Self::Pyramid => Pyramid::SIZE,
            Self::Sphere => Sphere::SIZE,
        }
    }

    /// Largest payload of any kind.
    #[must_use]
    pub const fn max_size() -> usize {
        Sphere::SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::size_of;

    #[test]
    fn test_object_sizes() {
        assert_eq!(size_of::<Cube>(), 100);
        assert_eq!(size_of::<Pyramid>(), 1487);
        assert_eq!(size_of::<Sphere>(), 10_000);
    }

    #[test]
    fn test_filled() {
        let pyramid = Pyramid::filled(7);
        assert!(pyramid.bytes().iter().all(|&b| b == 7));
        assert_eq!(Cube::default(), Cube::filled(0));
    }

    #[test]
    fn test_debug_omits_payload() {
        assert_eq!(format!("{:?}", Sphere::filled(1)), "Sphere { size: 10000, .. }");
    }

    #[test]
    fn test_rotation() {
        let kinds: Vec<_> = (0..5).map(ObjectKind::rotating).collect();
        assert_eq!(
            kinds,
            [
                ObjectKind::Cube,
                ObjectKind::Pyramid,
                ObjectKind::Sphere,
                ObjectKind::Cube,
                ObjectKind::Pyramid
            ]
        );
        assert_eq!(ObjectKind::Sphere.size(), ObjectKind::max_size());
    }
}
