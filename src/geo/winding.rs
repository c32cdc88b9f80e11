use std::f64::consts::FRAC_PI_4;
use itertools::Itertools;

use super::Point;

/// Spherical excess contributed by the edge p0→p1, halved.
///
/// Coordinates are (longitude, latitude) in degrees.
fn edge_excess(p0: &Point, p1: &Point) -> f64 {
    let lambda0 = p0.0.to_radians();
    let lambda1 = p1.0.to_radians();
    let phi0 = p0.1.to_radians() / 2. + FRAC_PI_4;
    let phi1 = p1.1.to_radians() / 2. + FRAC_PI_4;

    let d_lambda = lambda1 - lambda0;
    let sd_lambda = if d_lambda >= 0. { 1. } else { -1. };
    let ad_lambda = sd_lambda * d_lambda;

    let k = phi0.sin() * phi1.sin();
    let u = phi0.cos() * phi1.cos() + k * ad_lambda.cos();
    let v = k * sd_lambda * ad_lambda.sin();

    v.atan2(u)
}

/// Returns the signed area of a ring on the unit sphere, in steradians:
/// positive iff the ring is clockwise.
///
/// Assumes (longitude, latitude) degrees, with north positive. That's what
/// GIS programs do with WGS84. For projected coordinates the magnitude means
/// nothing, but the sign still tells winding order for small rings.
///
/// The ring is closed implicitly: if the first and last Points differ, the
/// closing edge is added.
pub fn signed_area(ring: &[Point]) -> f64 {
    let sum: f64 = ring.iter()
        .circular_tuple_windows()
        .map(|(p0, p1)| edge_excess(p0, p1))
        .sum();

    sum * 2.
}

/// Returns true for outer rings.
///
/// A zero-area Ring is considered to be Clockwise.
pub fn ring_clockwise(ring: &[Point]) -> bool {
    signed_area(ring) >= 0.
}

/// Even-odd ray casting: does `point` fall inside `ring`?
///
/// Points exactly on an edge may go either way.
pub fn ring_contains(ring: &[Point], point: &Point) -> bool {
    let &Point(x, y) = point;
    let mut inside = false;

    for (pi, pj) in ring.iter().circular_tuple_windows() {
        let &Point(xi, yi) = pi;
        let &Point(xj, yj) = pj;

        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
    }

    inside
}

#[cfg(test)]
mod test {
    use super::*;

    fn ring(points: &[(f64, f64)]) -> Vec<Point> {
        points.iter().map(|&(x, y)| Point(x, y)).collect()
    }

    #[test]
    fn clockwise_ring_has_positive_area() {
        let r = ring(&[ (0., 0.), (0., 1.), (1., 1.), (1., 0.), (0., 0.) ]);
        assert!(signed_area(&r) > 0.);
        assert!(ring_clockwise(&r));
    }

    #[test]
    fn counter_clockwise_ring_has_negative_area() {
        let r = ring(&[ (0., 0.), (1., 0.), (1., 1.), (0., 1.), (0., 0.) ]);
        assert!(signed_area(&r) < 0.);
        assert!(!ring_clockwise(&r));
    }

    #[test]
    fn area_magnitude_is_spherical() {
        // One square degree at the equator is about 3.0461e-4 sr
        let r = ring(&[ (0., 0.), (0., 1.), (1., 1.), (1., 0.), (0., 0.) ]);
        let a = signed_area(&r);
        assert!((a - 3.0461e-4).abs() < 1e-7, "area was {}", a);
    }

    #[test]
    fn unclosed_ring_is_closed_implicitly() {
        let closed = ring(&[ (0., 0.), (0., 1.), (1., 1.), (1., 0.), (0., 0.) ]);
        let open = ring(&[ (0., 0.), (0., 1.), (1., 1.), (1., 0.) ]);
        assert!((signed_area(&closed) - signed_area(&open)).abs() < 1e-15);
    }

    #[test]
    fn degenerate_rings_are_clockwise() {
        assert!(ring_clockwise(&[]));
        assert!(ring_clockwise(&ring(&[ (3., 3.) ])));
        assert!(ring_clockwise(&ring(&[ (0., 0.), (0., 5.), (0., 0.) ])));
    }

    #[test]
    fn contains_inside_point() {
        let r = ring(&[ (0., 0.), (0., 10.), (10., 10.), (10., 0.), (0., 0.) ]);
        assert!(ring_contains(&r, &Point(5., 5.)));
        assert!(ring_contains(&r, &Point(0.5, 9.5)));
    }

    #[test]
    fn does_not_contain_outside_point() {
        let r = ring(&[ (0., 0.), (0., 10.), (10., 10.), (10., 0.), (0., 0.) ]);
        assert!(!ring_contains(&r, &Point(15., 5.)));
        assert!(!ring_contains(&r, &Point(-1., 5.)));
        assert!(!ring_contains(&r, &Point(5., 11.)));
    }

    #[test]
    fn concave_ring() {
        // A "U" shape: the notch between the arms is outside
        let r = ring(&[
            (0., 0.), (0., 10.), (3., 10.), (3., 3.), (7., 3.), (7., 10.), (10., 10.), (10., 0.), (0., 0.),
        ]);
        assert!(ring_contains(&r, &Point(1., 8.)));
        assert!(!ring_contains(&r, &Point(5., 8.)));
        assert!(ring_contains(&r, &Point(5., 1.)));
    }
}
