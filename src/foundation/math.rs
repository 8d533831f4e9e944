pub(crate) fn mul_div255_u16(x: u16, y: u16) -> u16 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u16
}

pub(crate) fn mul_div255_u8(x: u16, y: u16) -> u8 {
    mul_div255_u16(x, y) as u8
}

/// Convert straight-alpha RGBA8 into premultiplied RGBA8, in place.
pub(crate) fn premultiply_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = u16::from(px[3]);
        if a == 255 {
            continue;
        }
        px[0] = mul_div255_u8(u16::from(px[0]), a);
        px[1] = mul_div255_u8(u16::from(px[1]), a);
        px[2] = mul_div255_u8(u16::from(px[2]), a);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mul_div255_endpoints() {
        assert_eq!(mul_div255_u16(255, 255), 255);
        assert_eq!(mul_div255_u16(0, 255), 0);
        assert_eq!(mul_div255_u16(255, 0), 0);
    }

    #[test]
    fn premultiply_scales_color_by_alpha() {
        let mut px = [200u8, 100, 50, 128];
        premultiply_in_place(&mut px);
        assert_eq!(px[3], 128);
        assert!((px[0] as i32 - 100).abs() <= 1);
        assert!((px[1] as i32 - 50).abs() <= 1);
        assert!((px[2] as i32 - 25).abs() <= 1);
    }

    #[test]
    fn premultiply_opaque_is_identity() {
        let mut px = [10u8, 20, 30, 255];
        premultiply_in_place(&mut px);
        assert_eq!(px, [10, 20, 30, 255]);
    }
}
