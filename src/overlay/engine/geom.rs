use crate::error::BlockError;
use crate::overlay::{AxisBox, Quad};

/// Reduces a detector quadrilateral to an axis-aligned box clamped to the
/// canvas. Boxes left with no area are rejected.
pub fn reduce_quad(quad: &Quad, width: u32, height: u32) -> Result<AxisBox, BlockError> {
    if quad.points.is_empty() {
        return Err(BlockError::InvalidBox("no corner points".to_string()));
    }
    if quad
        .points
        .iter()
        .any(|(x, y)| !x.is_finite() || !y.is_finite())
    {
        return Err(BlockError::InvalidBox(format!(
            "non-finite corner in {:?}",
            quad.points
        )));
    }

    // Truncate toward zero, as the detector reports fractional pixels.
    let xs = quad.points.iter().map(|(x, _)| *x as i32);
    let ys = quad.points.iter().map(|(_, y)| *y as i32);
    let x1 = xs.clone().min().unwrap_or_default().max(0);
    let x2 = xs.max().unwrap_or_default().min(clamp_dim(width));
    let y1 = ys.clone().min().unwrap_or_default().max(0);
    let y2 = ys.max().unwrap_or_default().min(clamp_dim(height));

    let rect = AxisBox { x1, y1, x2, y2 };
    if rect.width() <= 0 || rect.height() <= 0 {
        return Err(BlockError::InvalidBox(format!(
            "zero width/height after clamping: {}",
            rect
        )));
    }
    Ok(rect)
}

fn clamp_dim(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad(points: &[(f32, f32)]) -> Quad {
        Quad {
            points: points.to_vec(),
        }
    }

    #[test]
    fn reduces_rotated_quad_to_bounds() {
        let rect = reduce_quad(
            &quad(&[(12.0, 5.0), (90.5, 9.0), (88.0, 40.9), (10.0, 36.0)]),
            200,
            100,
        )
        .expect("valid box");
        assert_eq!(
            rect,
            AxisBox {
                x1: 10,
                y1: 5,
                x2: 90,
                y2: 40
            }
        );
    }

    #[test]
    fn clamps_to_canvas() {
        let rect = reduce_quad(
            &quad(&[(-20.0, -5.0), (250.0, -5.0), (250.0, 130.0), (-20.0, 130.0)]),
            200,
            100,
        )
        .expect("valid box");
        assert_eq!(
            rect,
            AxisBox {
                x1: 0,
                y1: 0,
                x2: 200,
                y2: 100
            }
        );
    }

    #[test]
    fn zero_width_box_is_invalid() {
        let err = reduce_quad(
            &quad(&[(10.0, 10.0), (10.0, 10.0), (10.0, 50.0), (10.0, 50.0)]),
            200,
            100,
        )
        .unwrap_err();
        assert!(matches!(err, BlockError::InvalidBox(_)));
    }

    #[test]
    fn box_outside_canvas_is_invalid() {
        let err = reduce_quad(&quad(&[(300.0, 10.0), (340.0, 40.0)]), 200, 100).unwrap_err();
        assert!(matches!(err, BlockError::InvalidBox(_)));
    }

    #[test]
    fn non_finite_corner_is_invalid() {
        let err = reduce_quad(&quad(&[(f32::NAN, 1.0), (20.0, 20.0)]), 200, 100).unwrap_err();
        assert!(matches!(err, BlockError::InvalidBox(_)));
    }
}
