//! Voxel sample types.

use std::fmt::Debug;

/// Maximum number of components per voxel.
pub const MAX_COMPONENTS: usize = 4;

/// One voxel value. Only the first `components` lanes are meaningful.
pub type Texel<T> = [T; MAX_COMPONENTS];

/// A scalar component type that can be stored in an atlas.
pub trait Sample:
    bytemuck::Pod + Copy + Default + PartialEq + PartialOrd + Debug + Send + Sync + 'static
{
    /// Widens the sample for intensity comparisons and blending.
    fn to_f64(self) -> f64;

    /// Narrows a value back to the sample type, saturating at the type bounds.
    fn from_f64(value: f64) -> Self;
}

macro_rules! impl_integer_sample {
    ($($t:ty),*) => {
        $(
            impl Sample for $t {
                fn to_f64(self) -> f64 {
                    f64::from(self)
                }

                #[allow(clippy::cast_possible_truncation)]
                fn from_f64(value: f64) -> Self {
                    // Float-to-int `as` casts saturate and map NaN to zero.
                    value.round() as $t
                }
            }
        )*
    };
}

impl_integer_sample!(u8, u16, i16);

impl Sample for f32 {
    fn to_f64(self) -> f64 {
        f64::from(self)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn from_f64(value: f64) -> Self {
        value as f32
    }
}

/// Broadcasts a scalar into every texel lane.
#[must_use]
pub fn splat<T: Sample>(value: T) -> Texel<T> {
    [value; MAX_COMPONENTS]
}

/// Pixel layout of an atlas surface, derived from the component count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// Single channel.
    R,
    /// Two channels.
    Rg,
    /// Three channels.
    Rgb,
    /// Four channels.
    Rgba,
}

impl PixelFormat {
    /// Returns the format for a component count, or `None` outside `1..=4`.
    #[must_use]
    pub fn from_components(components: u32) -> Option<Self> {
        match components {
            1 => Some(Self::R),
            2 => Some(Self::Rg),
            3 => Some(Self::Rgb),
            4 => Some(Self::Rgba),
            _ => None,
        }
    }

    /// Returns the number of channels.
    #[must_use]
    pub fn components(self) -> u32 {
        match self {
            Self::R => 1,
            Self::Rg => 2,
            Self::Rgb => 3,
            Self::Rgba => 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_saturation() {
        assert_eq!(u8::from_f64(300.0), 255);
        assert_eq!(u8::from_f64(-4.0), 0);
        assert_eq!(u8::from_f64(1.6), 2);
        assert_eq!(i16::from_f64(-40_000.0), i16::MIN);
        assert_eq!(u16::from_f64(f64::NAN), 0);
    }

    #[test]
    fn test_pixel_format() {
        assert_eq!(PixelFormat::from_components(3), Some(PixelFormat::Rgb));
        assert_eq!(PixelFormat::from_components(0), None);
        assert_eq!(PixelFormat::from_components(5), None);
        assert_eq!(PixelFormat::Rg.components(), 2);
    }
}
