//! Quad texture coordinates for sampling a sub-rectangle of a texture image.

use crate::backend::TextureTarget;

/// Shrink factor keeping cube-map directions off face edges.
const CUBE_EDGE_SCALE: f32 = 0.9999;

/// A sub-rectangle of one image, plus the image's full extent.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TexRegion2D {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub total_width: f32,
    pub total_height: f32,
    /// Depth of a 3D image; ignored for other targets.
    pub total_depth: f32,
}

impl TexRegion2D {
    pub fn whole(width: u32, height: u32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
            total_width: width as f32,
            total_height: height as f32,
            total_depth: 1.0,
        }
    }
}

/// Four `[s, t, r, q]` coordinates in quad order: lower-left, lower-right,
/// upper-right, upper-left.
///
/// `slice` selects the 3D slice, the array layer, or for cube targets the
/// layer-face (`layer * 6 + face`).
pub fn texture_coords(target: TextureTarget, slice: u32, region: &TexRegion2D) -> [[f32; 4]; 4] {
    let (s0, s1, t0, t1) = if target == TextureTarget::Rect {
        (
            region.x,
            region.x + region.width,
            region.y,
            region.y + region.height,
        )
    } else {
        (
            region.x / region.total_width,
            (region.x + region.width) / region.total_width,
            region.y / region.total_height,
            (region.y + region.height) / region.total_height,
        )
    };
    let corners = [(s0, t0), (s1, t0), (s1, t1), (s0, t1)];

    let r = match target {
        TextureTarget::Tex3D => (slice as f32 + 0.5) / region.total_depth,
        TextureTarget::Tex2DArray => slice as f32,
        _ => 0.0,
    };

    match target {
        TextureTarget::Tex1D => corners.map(|(s, _)| [s, 0.0, 0.0, 1.0]),
        TextureTarget::Tex1DArray => corners.map(|(s, _)| [s, slice as f32, 0.0, 1.0]),
        TextureTarget::Cube | TextureTarget::CubeArray => {
            let face = slice % 6;
            let layer = (slice / 6) as f32;
            corners.map(|(s, t)| {
                let sc = (2.0 * s - 1.0) * CUBE_EDGE_SCALE;
                let tc = (2.0 * t - 1.0) * CUBE_EDGE_SCALE;
                let [x, y, z] = cube_direction(face, sc, tc);
                [x, y, z, layer]
            })
        }
        _ => corners.map(|(s, t)| [s, t, r, 1.0]),
    }
}

/// Direction vector sampling face `face` at normalized `(sc, tc)`.
fn cube_direction(face: u32, sc: f32, tc: f32) -> [f32; 3] {
    match face {
        0 => [1.0, -tc, -sc],
        1 => [-1.0, -tc, sc],
        2 => [sc, 1.0, tc],
        3 => [sc, -1.0, -tc],
        4 => [sc, -tc, 1.0],
        _ => [-sc, -tc, -1.0],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(x: f32, y: f32, w: f32, h: f32, tw: f32, th: f32) -> TexRegion2D {
        TexRegion2D {
            x,
            y,
            width: w,
            height: h,
            total_width: tw,
            total_height: th,
            total_depth: 4.0,
        }
    }

    #[test]
    fn normalized_2d_corners() {
        let c = texture_coords(TextureTarget::Tex2D, 0, &region(2.0, 4.0, 6.0, 4.0, 8.0, 16.0));
        assert_eq!(c[0], [0.25, 0.25, 0.0, 1.0]);
        assert_eq!(c[1], [1.0, 0.25, 0.0, 1.0]);
        assert_eq!(c[2], [1.0, 0.5, 0.0, 1.0]);
        assert_eq!(c[3], [0.25, 0.5, 0.0, 1.0]);
    }

    #[test]
    fn rectangle_corners_are_pixel_absolute() {
        let c = texture_coords(TextureTarget::Rect, 0, &region(3.0, 1.0, 5.0, 2.0, 64.0, 64.0));
        assert_eq!(c.map(|v| (v[0], v[1])), [(3.0, 1.0), (8.0, 1.0), (8.0, 3.0), (3.0, 3.0)]);
    }

    #[test]
    fn array_and_3d_carry_slice_in_r() {
        let r = region(0.0, 0.0, 4.0, 4.0, 4.0, 4.0);
        let c = texture_coords(TextureTarget::Tex2DArray, 3, &r);
        assert!(c.iter().all(|v| v[2] == 3.0));
        let c = texture_coords(TextureTarget::Tex3D, 1, &r);
        assert!(c.iter().all(|v| v[2] == 1.5 / 4.0));
        let c = texture_coords(TextureTarget::Tex1DArray, 2, &r);
        assert!(c.iter().all(|v| v[1] == 2.0));
    }

    #[test]
    fn cube_faces_point_along_their_axis() {
        let r = TexRegion2D::whole(16, 16);
        let major = [(0, 1.0), (1, -1.0), (2, 1.0), (3, -1.0), (4, 1.0), (5, -1.0)];
        for (face, sign) in major {
            let axis = (face / 2) as usize;
            for corner in texture_coords(TextureTarget::Cube, face, &r) {
                assert_eq!(corner[axis], sign, "face {face}");
                // Minor axes stay strictly inside the face.
                for (i, v) in corner.iter().take(3).enumerate() {
                    if i != axis {
                        assert!(v.abs() < 1.0);
                    }
                }
            }
        }
    }

    #[test]
    fn cube_array_layer_in_w() {
        let r = TexRegion2D::whole(8, 8);
        let c = texture_coords(TextureTarget::CubeArray, 6 * 2 + 4, &r);
        assert!(c.iter().all(|v| v[2] == 1.0 && v[3] == 2.0));

        let c = texture_coords(TextureTarget::Cube, 4, &r);
        assert!(c.iter().all(|v| v[3] == 0.0));
    }
}
