//! Spherical geometry kernel
//!
//! Angular distance, bearing and great-circle-plane helpers used by the
//! pair accumulator. All inputs and outputs are in degrees; trigonometry
//! runs in radians internally.

/// Two defining points closer than this (per coordinate) are treated as
/// coincident; the great-circle plane through them is then degenerate.
pub const COINCIDENT_TOL_DEG: f64 = 1.0e-4;

/// Antipode of a point. Longitude is normalized into `[0, 360)`.
pub fn antipode(lon: f64, lat: f64) -> (f64, f64) {
    ((lon + 180.0).rem_euclid(360.0), -lat)
}

/// Unit-sphere Cartesian coordinates of a (lon, lat) point.
fn lola_to_xyz(lon: f64, lat: f64) -> (f64, f64, f64) {
    let (lam, phi) = (lon.to_radians(), lat.to_radians());
    (phi.cos() * lam.cos(), phi.cos() * lam.sin(), phi.sin())
}

/// Great-circle central angle between two points, in degrees `[0, 180]`.
///
/// Symmetric in its arguments; `haversine(p, p) == 0`.
pub fn haversine(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    let (lam1, phi1) = (lon1.to_radians(), lat1.to_radians());
    let (lam2, phi2) = (lon2.to_radians(), lat2.to_radians());
    let s1 = ((phi2 - phi1) * 0.5).sin();
    let s2 = ((lam2 - lam1) * 0.5).sin();
    let a = s1 * s1 + phi1.cos() * phi2.cos() * s2 * s2;
    (2.0 * a.sqrt().min(1.0).asin()).to_degrees()
}

/// Initial bearing from (evlo, evla) toward (stlo, stla), in degrees `[0, 360)`.
///
/// Undefined at the poles; callers must not rely on its value there.
pub fn azimuth(evlo: f64, evla: f64, stlo: f64, stla: f64) -> f64 {
    let (phi1, phi2) = (evla.to_radians(), stla.to_radians());
    let dlam = (stlo - evlo).to_radians();
    let a = (phi2.cos() * dlam.sin())
        .atan2(phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * dlam.cos());
    a.to_degrees().rem_euclid(360.0)
}

/// The two antipodal poles of the great-circle plane through two points.
///
/// The first returned pole is the one with positive latitude (the northern
/// representative on a tie), the second is its antipode. If the two points
/// coincide within [`COINCIDENT_TOL_DEG`] the plane is degenerate and the
/// result is undefined; callers must substitute a third point instead.
pub fn great_circle_plane_center(
    lon1: f64,
    lat1: f64,
    lon2: f64,
    lat2: f64,
) -> ((f64, f64), (f64, f64)) {
    let (x1, y1, z1) = lola_to_xyz(lon1, lat1);
    let (x2, y2, z2) = lola_to_xyz(lon2, lat2);
    // Normal of the plane: cross product of the two position vectors.
    let (x3, y3, z3) = (y1 * z2 - y2 * z1, z1 * x2 - z2 * x1, x1 * y2 - x2 * y1);
    let lat = z3.atan2((x3 * x3 + y3 * y3).sqrt()).to_degrees();
    let lon = y3.atan2(x3).to_degrees().rem_euclid(360.0);
    if lat > 0.0 {
        ((lon, lat), antipode(lon, lat))
    } else {
        (antipode(lon, lat), (lon, lat))
    }
}

/// Signed angular distance from a point to the great-circle plane defined
/// by two points, in degrees `[-90, 90]`.
///
/// Computed as `asin(sin(d13) * sin(a13 - a12))` where `d13`/`a13` are the
/// distance/bearing from the first defining point to the query point and
/// `a12` the bearing to the second defining point. Swapping the two defining
/// points flips the sign. Returns 0 when the defining points coincide
/// within [`COINCIDENT_TOL_DEG`].
pub fn point_to_great_circle_plane(
    ptlon: f64,
    ptlat: f64,
    lon1: f64,
    lat1: f64,
    lon2: f64,
    lat2: f64,
) -> f64 {
    if (lon1 - lon2).abs() < COINCIDENT_TOL_DEG && (lat1 - lat2).abs() < COINCIDENT_TOL_DEG {
        return 0.0;
    }
    let d13 = haversine(lon1, lat1, ptlon, ptlat).to_radians();
    let a13 = azimuth(lon1, lat1, ptlon, ptlat).to_radians();
    let a12 = azimuth(lon1, lat1, lon2, lat2).to_radians();
    (d13.sin() * (a13 - a12).sin()).asin().to_degrees()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn haversine_quarter_circle() {
        assert_abs_diff_eq!(haversine(0.0, 0.0, 0.0, 90.0), 90.0, epsilon = 1e-9);
        assert_abs_diff_eq!(haversine(0.0, 0.0, 90.0, 0.0), 90.0, epsilon = 1e-9);
    }

    #[test]
    fn haversine_symmetric_and_zero_on_self() {
        let d1 = haversine(10.0, 20.0, 130.0, -45.0);
        let d2 = haversine(130.0, -45.0, 10.0, 20.0);
        assert_abs_diff_eq!(d1, d2, epsilon = 1e-9);
        assert_abs_diff_eq!(haversine(33.0, -7.5, 33.0, -7.5), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn azimuth_cardinal_directions() {
        assert_abs_diff_eq!(azimuth(0.0, 0.0, 0.0, 90.0), 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(azimuth(0.0, 0.0, 90.0, 0.0), 90.0, epsilon = 1e-9);
        assert_abs_diff_eq!(azimuth(0.0, 0.0, 0.0, -90.0), 180.0, epsilon = 1e-9);
        assert_abs_diff_eq!(azimuth(0.0, 0.0, -90.0, 0.0), 270.0, epsilon = 1e-9);
    }

    #[test]
    fn antipode_round_trip() {
        let (lo, la) = antipode(10.0, 30.0);
        assert_abs_diff_eq!(lo, 190.0, epsilon = 1e-12);
        assert_abs_diff_eq!(la, -30.0, epsilon = 1e-12);
        let (lo2, la2) = antipode(lo, la);
        assert_abs_diff_eq!(lo2, 10.0, epsilon = 1e-12);
        assert_abs_diff_eq!(la2, 30.0, epsilon = 1e-12);
    }

    #[test]
    fn plane_center_poles_are_antipodal() {
        let ((lo_n, la_n), (lo_s, la_s)) = great_circle_plane_center(0.0, 10.0, 90.0, 20.0);
        assert!(la_n >= 0.0);
        let (alo, ala) = antipode(lo_n, la_n);
        assert_abs_diff_eq!(alo, lo_s, epsilon = 1e-9);
        assert_abs_diff_eq!(ala, la_s, epsilon = 1e-9);
    }

    #[test]
    fn equator_plane_center_is_a_pole() {
        // Two equatorial points define the equator; its pole is at +/-90 lat.
        let ((_, la_n), _) = great_circle_plane_center(0.0, 0.0, 90.0, 0.0);
        assert_abs_diff_eq!(la_n, 90.0, epsilon = 1e-9);
    }

    #[test]
    fn point_to_plane_small_offset() {
        // A point 1 degree north of the equatorial plane.
        let d = point_to_great_circle_plane(0.0, 1.0, 0.0, 0.0, 90.0, 0.0);
        assert_abs_diff_eq!(d, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn point_to_plane_antisymmetric_in_defining_points() {
        let d1 = point_to_great_circle_plane(5.0, 7.0, 0.0, 0.0, 40.0, 10.0);
        let d2 = point_to_great_circle_plane(5.0, 7.0, 40.0, 10.0, 0.0, 0.0);
        assert_abs_diff_eq!(d1, -d2, epsilon = 1e-9);
    }

    #[test]
    fn point_to_plane_coincident_points_is_zero() {
        let d = point_to_great_circle_plane(5.0, 7.0, 10.0, 10.0, 10.0, 10.0);
        assert_abs_diff_eq!(d, 0.0, epsilon = 1e-12);
    }
}
