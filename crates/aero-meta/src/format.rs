//! Texture and client pixel formats understood by the meta layer.
//!
//! These are semantic enums rather than raw API constants so the rest of the
//! crate can stay backend-independent.

use half::f16;

/// Components a texture image stores, independent of bit depth.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BaseFormat {
    Red,
    Rg,
    Rgb,
    Rgba,
    Alpha,
    Luminance,
    LuminanceAlpha,
    Intensity,
    DepthComponent,
    StencilIndex,
    DepthStencil,
}

impl BaseFormat {
    pub fn is_depth_or_stencil(self) -> bool {
        matches!(
            self,
            Self::DepthComponent | Self::StencilIndex | Self::DepthStencil
        )
    }

    /// Luminance-style formats read back as `L = R` rather than `L = R + G + B`.
    pub fn is_luminance_family(self) -> bool {
        matches!(
            self,
            Self::Luminance | Self::LuminanceAlpha | Self::Intensity
        )
    }
}

/// How texel values are interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DataType {
    UnsignedNormalized,
    SignedNormalized,
    Float,
    UnsignedInt,
    Int,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InternalFormat {
    Alpha8,
    Luminance8,
    LuminanceAlpha8,
    Intensity8,
    R8,
    Rg8,
    Rgb8,
    Rgba8,
    Srgb8Alpha8,
    Rgba16F,
    R32F,
    Rgba32F,
    Rgba8Ui,
    Rgba8I,
    Rgba32Ui,
    DepthComponent16,
    DepthComponent24,
    DepthComponent32F,
    Depth24Stencil8,
    Depth32FStencil8,
    StencilIndex8,
    RgbDxt1,
    RgbaDxt1,
    RgbaDxt3,
    RgbaDxt5,
    SrgbAlphaDxt5,
    RedRgtc1,
    SignedRedRgtc1,
    RgRgtc2,
    RgbaBptcUnorm,
    RgbBptcSignedFloat,
    RgbBptcUnsignedFloat,
}

impl InternalFormat {
    pub fn base_format(self) -> BaseFormat {
        use InternalFormat::*;
        match self {
            Alpha8 => BaseFormat::Alpha,
            Luminance8 => BaseFormat::Luminance,
            LuminanceAlpha8 => BaseFormat::LuminanceAlpha,
            Intensity8 => BaseFormat::Intensity,
            R8 | R32F | RedRgtc1 | SignedRedRgtc1 => BaseFormat::Red,
            Rg8 | RgRgtc2 => BaseFormat::Rg,
            Rgb8 | RgbDxt1 | RgbBptcSignedFloat | RgbBptcUnsignedFloat => BaseFormat::Rgb,
            Rgba8 | Srgb8Alpha8 | Rgba16F | Rgba32F | Rgba8Ui | Rgba8I | Rgba32Ui | RgbaDxt1
            | RgbaDxt3 | RgbaDxt5 | SrgbAlphaDxt5 | RgbaBptcUnorm => BaseFormat::Rgba,
            DepthComponent16 | DepthComponent24 | DepthComponent32F => BaseFormat::DepthComponent,
            Depth24Stencil8 | Depth32FStencil8 => BaseFormat::DepthStencil,
            StencilIndex8 => BaseFormat::StencilIndex,
        }
    }

    pub fn data_type(self) -> DataType {
        use InternalFormat::*;
        match self {
            Rgba16F | R32F | Rgba32F | DepthComponent32F | Depth32FStencil8
            | RgbBptcSignedFloat | RgbBptcUnsignedFloat => DataType::Float,
            SignedRedRgtc1 => DataType::SignedNormalized,
            Rgba8Ui | Rgba32Ui | StencilIndex8 => DataType::UnsignedInt,
            Rgba8I => DataType::Int,
            _ => DataType::UnsignedNormalized,
        }
    }

    pub fn is_compressed(self) -> bool {
        use InternalFormat::*;
        matches!(
            self,
            RgbDxt1
                | RgbaDxt1
                | RgbaDxt3
                | RgbaDxt5
                | SrgbAlphaDxt5
                | RedRgtc1
                | SignedRedRgtc1
                | RgRgtc2
                | RgbaBptcUnorm
                | RgbBptcSignedFloat
                | RgbBptcUnsignedFloat
        )
    }

    pub fn is_integer(self) -> bool {
        matches!(self, Self::Rgba8Ui | Self::Rgba8I | Self::Rgba32Ui)
    }

    pub fn is_srgb(self) -> bool {
        matches!(self, Self::Srgb8Alpha8 | Self::SrgbAlphaDxt5)
    }

    /// The same layout without sRGB encoding.
    pub fn linear(self) -> Self {
        match self {
            Self::Srgb8Alpha8 => Self::Rgba8,
            Self::SrgbAlphaDxt5 => Self::RgbaDxt5,
            other => other,
        }
    }

    /// Bytes per texel for uncompressed formats.
    pub fn texel_size(self) -> Option<usize> {
        use InternalFormat::*;
        Some(match self {
            Alpha8 | Luminance8 | Intensity8 | R8 | StencilIndex8 => 1,
            LuminanceAlpha8 | Rg8 | DepthComponent16 => 2,
            Rgb8 => 3,
            Rgba8 | Srgb8Alpha8 | Rgba8Ui | Rgba8I | R32F | DepthComponent24
            | DepthComponent32F | Depth24Stencil8 => 4,
            Rgba16F | Depth32FStencil8 => 8,
            Rgba32F | Rgba32Ui => 16,
            _ => return None,
        })
    }

    /// Pixel type used for a temporary read-back image of this format.
    pub fn temp_image_type(self) -> PixelType {
        match self.base_format() {
            BaseFormat::DepthComponent => match self.data_type() {
                DataType::Float => PixelType::Float,
                _ => PixelType::UnsignedInt,
            },
            BaseFormat::DepthStencil => match self.data_type() {
                DataType::Float => PixelType::Float32UnsignedInt248Rev,
                _ => PixelType::UnsignedInt248,
            },
            BaseFormat::StencilIndex => PixelType::UnsignedByte,
            _ => match self.data_type() {
                DataType::UnsignedNormalized => PixelType::UnsignedByte,
                DataType::UnsignedInt => PixelType::UnsignedInt,
                DataType::Int => PixelType::Int,
                DataType::SignedNormalized | DataType::Float => PixelType::Float,
            },
        }
    }
}

/// Client-side pixel layout for uploads and read-backs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Red,
    Green,
    Blue,
    Alpha,
    Rg,
    Rgb,
    Bgr,
    Rgba,
    Bgra,
    Luminance,
    LuminanceAlpha,
    RedInteger,
    RgbaInteger,
    ColorIndex,
    DepthComponent,
    StencilIndex,
    DepthStencil,
}

impl PixelFormat {
    pub fn components(self) -> usize {
        match self {
            Self::Red
            | Self::Green
            | Self::Blue
            | Self::Alpha
            | Self::Luminance
            | Self::RedInteger
            | Self::ColorIndex
            | Self::DepthComponent
            | Self::StencilIndex => 1,
            Self::Rg | Self::LuminanceAlpha | Self::DepthStencil => 2,
            Self::Rgb | Self::Bgr => 3,
            Self::Rgba | Self::Bgra | Self::RgbaInteger => 4,
        }
    }

    pub fn is_color(self) -> bool {
        !matches!(
            self,
            Self::ColorIndex | Self::DepthComponent | Self::StencilIndex | Self::DepthStencil
        )
    }

    pub fn is_integer(self) -> bool {
        matches!(self, Self::RedInteger | Self::RgbaInteger)
    }

    pub fn is_stencil(self) -> bool {
        matches!(self, Self::StencilIndex)
    }

    pub fn is_depth(self) -> bool {
        matches!(self, Self::DepthComponent)
    }

    /// Client format matching a texture's base format, used for temporary
    /// images. Luminance-style formats widen to RGBA.
    pub fn for_base_format(base: BaseFormat, integer: bool) -> Self {
        match base {
            BaseFormat::DepthComponent => Self::DepthComponent,
            BaseFormat::DepthStencil => Self::DepthStencil,
            BaseFormat::StencilIndex => Self::StencilIndex,
            BaseFormat::Red if integer => Self::RedInteger,
            _ if integer => Self::RgbaInteger,
            BaseFormat::Red => Self::Red,
            BaseFormat::Rg => Self::Rg,
            BaseFormat::Rgb => Self::Rgb,
            BaseFormat::Alpha => Self::Alpha,
            BaseFormat::Rgba
            | BaseFormat::Luminance
            | BaseFormat::LuminanceAlpha
            | BaseFormat::Intensity => Self::Rgba,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelType {
    UnsignedByte,
    Byte,
    UnsignedShort,
    Short,
    UnsignedInt,
    Int,
    HalfFloat,
    Float,
    /// Packed 24-bit depth + 8-bit stencil in one 32-bit word.
    UnsignedInt248,
    /// 32-bit float depth followed by a 32-bit word holding stencil.
    Float32UnsignedInt248Rev,
    /// One bit per pixel (glBitmap / stencil index uploads).
    Bitmap,
}

impl PixelType {
    /// Size of one component, or of the whole pixel for packed types.
    pub fn size(self) -> usize {
        match self {
            Self::UnsignedByte | Self::Byte | Self::Bitmap => 1,
            Self::UnsignedShort | Self::Short | Self::HalfFloat => 2,
            Self::UnsignedInt | Self::Int | Self::Float | Self::UnsignedInt248 => 4,
            Self::Float32UnsignedInt248Rev => 8,
        }
    }

    pub fn is_packed(self) -> bool {
        matches!(self, Self::UnsignedInt248 | Self::Float32UnsignedInt248Rev)
    }
}

/// Bytes for one pixel of `format`/`ty`. `None` for [`PixelType::Bitmap`],
/// which packs eight pixels per byte.
pub fn bytes_per_pixel(format: PixelFormat, ty: PixelType) -> Option<usize> {
    match ty {
        PixelType::Bitmap => None,
        packed if packed.is_packed() => Some(packed.size()),
        ty => Some(format.components() * ty.size()),
    }
}

/// A single texel decoded into clear values.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TexelValue {
    Color([f32; 4]),
    IntColor([i32; 4]),
    UintColor([u32; 4]),
    DepthStencil { depth: f32, stencil: u8 },
}

fn expand_base(base: BaseFormat, c: [f32; 4]) -> [f32; 4] {
    match base {
        BaseFormat::Red => [c[0], 0.0, 0.0, 1.0],
        BaseFormat::Rg => [c[0], c[1], 0.0, 1.0],
        BaseFormat::Rgb => [c[0], c[1], c[2], 1.0],
        BaseFormat::Alpha => [0.0, 0.0, 0.0, c[0]],
        BaseFormat::Luminance => [c[0], c[0], c[0], 1.0],
        BaseFormat::LuminanceAlpha => [c[0], c[0], c[0], c[1]],
        BaseFormat::Intensity => [c[0]; 4],
        _ => c,
    }
}

fn read_u32(bytes: &[u8], offset: usize) -> Option<u32> {
    let raw = bytes.get(offset..offset + 4)?;
    Some(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
}

fn read_f32(bytes: &[u8], offset: usize) -> Option<f32> {
    read_u32(bytes, offset).map(f32::from_bits)
}

/// Decode one texel of `format` (little-endian storage layout).
///
/// Returns `None` for compressed formats or when `bytes` is too short.
pub fn decode_texel(format: InternalFormat, bytes: &[u8]) -> Option<TexelValue> {
    use InternalFormat::*;
    let size = format.texel_size()?;
    let bytes = bytes.get(..size)?;
    let base = format.base_format();
    let unorm8 = |n: usize| {
        let mut c = [0.0f32; 4];
        for (dst, &b) in c.iter_mut().zip(&bytes[..n]) {
            *dst = b as f32 / 255.0;
        }
        c
    };

    Some(match format {
        Alpha8 | Luminance8 | Intensity8 | R8 => TexelValue::Color(expand_base(base, unorm8(1))),
        LuminanceAlpha8 | Rg8 => TexelValue::Color(expand_base(base, unorm8(2))),
        Rgb8 => TexelValue::Color(expand_base(base, unorm8(3))),
        Rgba8 | Srgb8Alpha8 => TexelValue::Color(unorm8(4)),
        Rgba16F => {
            let mut c = [0.0f32; 4];
            for (i, dst) in c.iter_mut().enumerate() {
                let bits = u16::from_le_bytes([bytes[i * 2], bytes[i * 2 + 1]]);
                *dst = f16::from_bits(bits).to_f32();
            }
            TexelValue::Color(c)
        }
        R32F => TexelValue::Color(expand_base(base, [read_f32(bytes, 0)?, 0.0, 0.0, 0.0])),
        Rgba32F => TexelValue::Color([
            read_f32(bytes, 0)?,
            read_f32(bytes, 4)?,
            read_f32(bytes, 8)?,
            read_f32(bytes, 12)?,
        ]),
        Rgba8Ui => TexelValue::UintColor([
            bytes[0] as u32,
            bytes[1] as u32,
            bytes[2] as u32,
            bytes[3] as u32,
        ]),
        Rgba8I => TexelValue::IntColor([
            bytes[0] as i8 as i32,
            bytes[1] as i8 as i32,
            bytes[2] as i8 as i32,
            bytes[3] as i8 as i32,
        ]),
        Rgba32Ui => TexelValue::UintColor([
            read_u32(bytes, 0)?,
            read_u32(bytes, 4)?,
            read_u32(bytes, 8)?,
            read_u32(bytes, 12)?,
        ]),
        DepthComponent16 => TexelValue::DepthStencil {
            depth: u16::from_le_bytes([bytes[0], bytes[1]]) as f32 / 65535.0,
            stencil: 0,
        },
        DepthComponent24 => TexelValue::DepthStencil {
            depth: (read_u32(bytes, 0)? & 0x00ff_ffff) as f32 / 16_777_215.0,
            stencil: 0,
        },
        DepthComponent32F => TexelValue::DepthStencil {
            depth: read_f32(bytes, 0)?,
            stencil: 0,
        },
        Depth24Stencil8 => {
            let word = read_u32(bytes, 0)?;
            TexelValue::DepthStencil {
                depth: (word >> 8) as f32 / 16_777_215.0,
                stencil: (word & 0xff) as u8,
            }
        }
        Depth32FStencil8 => TexelValue::DepthStencil {
            depth: read_f32(bytes, 0)?,
            stencil: (read_u32(bytes, 4)? & 0xff) as u8,
        },
        StencilIndex8 => TexelValue::DepthStencil {
            depth: 0.0,
            stencil: bytes[0],
        },
        _ => return None,
    })
}
