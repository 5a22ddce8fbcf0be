// dd-core/src/units.rs

use uom::si::f64::{Force as UomForce, Length as UomLength, Ratio as UomRatio};

// Public canonical unit types (SI, f64)
pub type Force = UomForce;
pub type Length = UomLength;
pub type Ratio = UomRatio;

/// Floating point type used for every decoded parameter.
pub type Real = f64;

/// Forming parameters are recorded in millimetres.
#[inline]
pub fn mm(v: f64) -> Length {
    use uom::si::length::millimeter;
    Length::new::<millimeter>(v)
}

/// Blank holder forces are recorded in kilonewtons.
#[inline]
pub fn kn(v: f64) -> Force {
    use uom::si::force::kilonewton;
    Force::new::<kilonewton>(v)
}

#[inline]
pub fn unitless(v: f64) -> Ratio {
    use uom::si::ratio::ratio;
    Ratio::new::<ratio>(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_smoke() {
        use uom::si::force::newton;
        use uom::si::length::meter;

        assert!((mm(40.0).get::<meter>() - 0.04).abs() < 1e-12);
        assert!((kn(250.0).get::<newton>() - 250_000.0).abs() < 1e-6);
        let _r = unitless(0.5);
    }
}
