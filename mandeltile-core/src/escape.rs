/// Squared bailout radius. An orbit with `|z|² > 4` never returns.
pub const ESCAPE_RADIUS_SQ: f64 = 4.0;

/// Returns `true` if `c` lies inside the main cardioid.
///
/// Closed-form check that skips iterating a large share of interior
/// points at low zoom.
#[inline]
fn in_cardioid(re: f64, im: f64) -> bool {
    let im2 = im * im;
    let q = (re - 0.25) * (re - 0.25) + im2;
    q * (q + (re - 0.25)) <= 0.25 * im2
}

/// Returns `true` if `c` lies inside the period-2 bulb.
#[inline]
fn in_period2_bulb(re: f64, im: f64) -> bool {
    (re + 1.0) * (re + 1.0) + im * im <= 0.0625
}

/// Escape-time iteration count for the point `c = x + yi`.
///
/// The orbit starts at `z = c` and is tested before each step, so a point
/// already outside the bailout radius reports `0`. Points that never escape
/// report `max_iterations`, which callers treat as interior.
#[inline]
pub fn escape_count(x: f64, y: f64, max_iterations: u32) -> u32 {
    if in_cardioid(x, y) || in_period2_bulb(x, y) {
        return max_iterations;
    }

    let (mut re, mut im) = (x, y);
    for n in 0..max_iterations {
        let rr = re * re;
        let ii = im * im;
        if rr + ii > ESCAPE_RADIUS_SQ {
            return n;
        }
        im = 2.0 * re * im + y;
        re = rr - ii + x;
    }
    max_iterations
}
