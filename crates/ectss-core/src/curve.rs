//! Short-Weierstrass curve group arithmetic
//!
//! Field and point operations over a caller-supplied prime-order curve
//! y^2 = x^3 + ax + b (mod p). All arithmetic is done on 256-bit unsigned
//! integers with Montgomery reduction; point operations use the affine
//! chord-and-tangent formulas. Scalar arithmetic (everything except the
//! x-coordinate extraction used for ECDSA `r` values) is mod the group
//! order n.

use crate::error::{Error, Result};
use crypto_bigint::modular::runtime_mod::{DynResidue, DynResidueParams};
use crypto_bigint::{Encoding, Integer, NonZero, RandomMod, U256};
use rand_core::CryptoRngCore;
use serde::{Deserialize, Serialize};

/// Unsigned integer type backing field elements and scalars.
pub type Uint = U256;

/// A point on the curve, or the point at infinity.
///
/// The identity is the additive neutral element and is deliberately *not*
/// a member of the curve for [`CurveParams::is_on_curve`]; callers must
/// special-case it before membership checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Point {
    /// The point at infinity
    Identity,
    /// An affine point with coordinates reduced mod p
    Affine { x: Uint, y: Uint },
}

impl Point {
    /// Create an affine point from reduced coordinates.
    pub fn affine(x: Uint, y: Uint) -> Self {
        Point::Affine { x, y }
    }

    /// The x-coordinate, or `None` for the identity.
    pub fn x(&self) -> Option<&Uint> {
        match self {
            Point::Identity => None,
            Point::Affine { x, .. } => Some(x),
        }
    }

    /// Whether this is the point at infinity.
    pub fn is_identity(&self) -> bool {
        matches!(self, Point::Identity)
    }
}

/// Domain parameters of a short-Weierstrass curve group.
#[derive(Debug, Clone)]
pub struct CurveParams {
    /// Prime modulus of the base field
    pub p: Uint,
    /// Curve coefficient a
    pub a: Uint,
    /// Curve coefficient b
    pub b: Uint,
    /// Generator of the prime-order subgroup
    pub g: Point,
    /// Order of the subgroup generated by g (prime)
    pub n: Uint,
    /// Cofactor
    pub h: Uint,
}

impl CurveParams {
    /// Create curve parameters, validating the generator and moduli.
    ///
    /// p and n must be odd primes (primality itself is the caller's
    /// responsibility; oddness is required by the Montgomery arithmetic
    /// and is checked here), a and b must be reduced mod p, and g must be
    /// a non-identity point on the curve.
    pub fn new(p: Uint, a: Uint, b: Uint, g: Point, n: Uint, h: Uint) -> Result<Self> {
        if p == Uint::ZERO || !bool::from(p.is_odd()) {
            return Err(Error::InvalidConfig("Field modulus must be odd".into()));
        }
        if n == Uint::ZERO || !bool::from(n.is_odd()) {
            return Err(Error::InvalidConfig("Group order must be odd".into()));
        }
        if a >= p || b >= p {
            return Err(Error::InvalidConfig(
                "Curve coefficients must be reduced mod p".into(),
            ));
        }
        let params = Self { p, a, b, g, n, h };
        if g.is_identity() || !params.is_on_curve(&g) {
            return Err(Error::InvalidConfig(
                "Generator is not a point on the curve".into(),
            ));
        }
        Ok(params)
    }

    /// The secp256k1 parameters.
    pub fn secp256k1() -> Self {
        let p = Uint::from_be_hex(
            "fffffffffffffffffffffffffffffffffffffffffffffffffffffffefffffc2f",
        );
        let n = Uint::from_be_hex(
            "fffffffffffffffffffffffffffffffebaaedce6af48a03bbfd25e8cd0364141",
        );
        let g = Point::affine(
            Uint::from_be_hex(
                "79be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798",
            ),
            Uint::from_be_hex(
                "483ada7726a3c4655da4fbfc0e1108a8fd17b448a68554199c47d08ffb10d4b8",
            ),
        );
        Self::new(p, Uint::ZERO, Uint::from_u64(7), g, n, Uint::ONE)
            .expect("secp256k1 parameters are valid")
    }

    /// Check whether a point satisfies the curve equation.
    ///
    /// The identity is never on the curve, and neither is a point with a
    /// coordinate outside [0, p).
    pub fn is_on_curve(&self, point: &Point) -> bool {
        let Point::Affine { x, y } = point else {
            return false;
        };
        if x >= &self.p || y >= &self.p {
            return false;
        }
        let fp = DynResidueParams::new(&self.p);
        let x = DynResidue::new(x, fp);
        let y = DynResidue::new(y, fp);
        let a = DynResidue::new(&self.a, fp);
        let b = DynResidue::new(&self.b, fp);
        let lhs = y * y;
        let rhs = x * x * x + a * x + b;
        lhs.retrieve() == rhs.retrieve()
    }

    /// Chord-and-tangent point addition.
    ///
    /// Returns the other operand unchanged if either input is the
    /// identity, and the identity when the slope denominator is not
    /// invertible mod p (point-inverse cancellation, or doubling a point
    /// with y = 0). Non-identity inputs off the curve are rejected.
    pub fn add_points(&self, p1: &Point, p2: &Point) -> Result<Point> {
        let (Point::Affine { x: x1, y: y1 }, Point::Affine { x: x2, y: y2 }) = (p1, p2) else {
            return Ok(if p1.is_identity() { *p2 } else { *p1 });
        };
        if !self.is_on_curve(p1) || !self.is_on_curve(p2) {
            return Err(Error::InvalidPoint);
        }

        let fp = DynResidueParams::new(&self.p);
        let x1 = DynResidue::new(x1, fp);
        let y1 = DynResidue::new(y1, fp);
        let x2 = DynResidue::new(x2, fp);
        let y2 = DynResidue::new(y2, fp);

        let (num, den) = if p1 == p2 {
            // Tangent slope (3x^2 + a) / 2y
            let a = DynResidue::new(&self.a, fp);
            let three = DynResidue::new(&Uint::from_u64(3), fp);
            let two = DynResidue::new(&Uint::from_u64(2), fp);
            (three * x1 * x1 + a, two * y1)
        } else {
            // Chord slope (y2 - y1) / (x2 - x1)
            (y2 - y1, x2 - x1)
        };
        if den.retrieve() == Uint::ZERO {
            return Ok(Point::Identity);
        }

        // Fermat inversion; p is prime
        let exp = self.p.wrapping_sub(&Uint::from_u64(2));
        let slope = num * den.pow(&exp);
        let x3 = slope * slope - x1 - x2;
        let y3 = slope * (x1 - x3) - y1;
        Ok(Point::affine(x3.retrieve(), y3.retrieve()))
    }

    /// Additive inverse of a point.
    pub fn negate_point(&self, point: &Point) -> Point {
        match point {
            Point::Identity => Point::Identity,
            Point::Affine { x, y } => Point::affine(*x, y.neg_mod(&self.p)),
        }
    }

    /// p1 - p2.
    pub fn subtract_points(&self, p1: &Point, p2: &Point) -> Result<Point> {
        self.add_points(p1, &self.negate_point(p2))
    }

    /// Binary double-and-add scalar multiplication, from the most
    /// significant bit of k. Requires 0 < k < n.
    pub fn multiply_point(&self, k: &Uint, point: &Point) -> Result<Point> {
        if k == &Uint::ZERO || k >= &self.n {
            return Err(Error::ScalarOutOfRange);
        }
        if point.is_identity() {
            return Ok(Point::Identity);
        }
        if !self.is_on_curve(point) {
            return Err(Error::InvalidPoint);
        }

        let bytes = k.to_be_bytes();
        let top = highest_set_bit(&bytes).expect("k is nonzero");
        let mut acc = *point;
        for i in (0..top).rev() {
            acc = self.add_points(&acc, &acc)?;
            if bit(&bytes, i) {
                acc = self.add_points(&acc, point)?;
            }
        }
        Ok(acc)
    }

    /// Like [`multiply_point`](Self::multiply_point), but maps a zero
    /// scalar to the identity instead of erroring. Used where a linear
    /// combination may legitimately have a vanishing term.
    pub fn multiply_point_or_identity(&self, k: &Uint, point: &Point) -> Result<Point> {
        let k = self.scalar_reduce(k);
        if k == Uint::ZERO {
            return Ok(Point::Identity);
        }
        self.multiply_point(&k, point)
    }

    /// a + b mod n. Operands must be reduced.
    pub fn scalar_add(&self, a: &Uint, b: &Uint) -> Uint {
        a.add_mod(b, &self.n)
    }

    /// a - b mod n. Operands must be reduced.
    pub fn scalar_sub(&self, a: &Uint, b: &Uint) -> Uint {
        a.sub_mod(b, &self.n)
    }

    /// a * b mod n.
    pub fn scalar_mul(&self, a: &Uint, b: &Uint) -> Uint {
        let params = DynResidueParams::new(&self.n);
        (DynResidue::new(a, params) * DynResidue::new(b, params)).retrieve()
    }

    /// -a mod n. The operand must be reduced.
    pub fn scalar_neg(&self, a: &Uint) -> Uint {
        a.neg_mod(&self.n)
    }

    /// Multiplicative inverse mod n (Fermat; n is prime), or `None` for a
    /// scalar congruent to zero.
    pub fn scalar_invert(&self, a: &Uint) -> Option<Uint> {
        let a = self.scalar_reduce(a);
        if a == Uint::ZERO {
            return None;
        }
        let params = DynResidueParams::new(&self.n);
        let exp = self.n.wrapping_sub(&Uint::from_u64(2));
        Some(DynResidue::new(&a, params).pow(&exp).retrieve())
    }

    /// Reduce an arbitrary 256-bit value mod n.
    pub fn scalar_reduce(&self, value: &Uint) -> Uint {
        let params = DynResidueParams::new(&self.n);
        DynResidue::new(value, params).retrieve()
    }

    /// Interpret a 32-byte message digest as a scalar mod n.
    pub fn scalar_from_digest(&self, digest: &[u8; 32]) -> Uint {
        self.scalar_reduce(&Uint::from_be_bytes(*digest))
    }

    /// Uniformly random scalar in (0, n).
    pub fn random_scalar(&self, rng: &mut impl CryptoRngCore) -> Uint {
        let order = Option::<NonZero<Uint>>::from(NonZero::new(self.n))
            .expect("group order is nonzero");
        loop {
            let candidate = Uint::random_mod(rng, &order);
            if candidate != Uint::ZERO {
                return candidate;
            }
        }
    }
}

/// Index of the highest set bit (counting from the least significant).
fn highest_set_bit(bytes: &[u8; 32]) -> Option<usize> {
    for (i, byte) in bytes.iter().enumerate() {
        if *byte != 0 {
            return Some((31 - i) * 8 + (7 - byte.leading_zeros() as usize));
        }
    }
    None
}

/// Bit i of a big-endian byte array, counting from the least significant.
fn bit(bytes: &[u8; 32], i: usize) -> bool {
    (bytes[31 - i / 8] >> (i % 8)) & 1 == 1
}

#[cfg(test)]
mod tests {
    use super::*;

    /// y^2 = x^3 + 2x + 2 over F_17, generator (5, 1) of order 19.
    fn toy_curve() -> CurveParams {
        CurveParams::new(
            Uint::from_u64(17),
            Uint::from_u64(2),
            Uint::from_u64(2),
            Point::affine(Uint::from_u64(5), Uint::from_u64(1)),
            Uint::from_u64(19),
            Uint::ONE,
        )
        .unwrap()
    }

    #[test]
    fn generator_is_on_curve() {
        let curve = CurveParams::secp256k1();
        assert!(curve.is_on_curve(&curve.g));
        assert!(toy_curve().is_on_curve(&toy_curve().g));
    }

    #[test]
    fn identity_is_not_on_curve() {
        let curve = toy_curve();
        assert!(!curve.is_on_curve(&Point::Identity));
    }

    #[test]
    fn identity_is_neutral() {
        let curve = toy_curve();
        let g = curve.g;
        assert_eq!(curve.add_points(&g, &Point::Identity).unwrap(), g);
        assert_eq!(curve.add_points(&Point::Identity, &g).unwrap(), g);
        assert_eq!(
            curve
                .add_points(&Point::Identity, &Point::Identity)
                .unwrap(),
            Point::Identity
        );
    }

    #[test]
    fn addition_is_closed() {
        let curve = toy_curve();
        let g = curve.g;
        let mut acc = g;
        for _ in 0..20 {
            acc = curve.add_points(&acc, &g).unwrap();
            assert!(acc.is_identity() || curve.is_on_curve(&acc));
        }
    }

    #[test]
    fn point_plus_inverse_is_identity() {
        let curve = toy_curve();
        let p = curve
            .multiply_point(&Uint::from_u64(5), &curve.g)
            .unwrap();
        let neg = curve.negate_point(&p);
        assert_eq!(curve.add_points(&p, &neg).unwrap(), Point::Identity);
        assert_eq!(curve.subtract_points(&p, &p).unwrap(), Point::Identity);
    }

    #[test]
    fn off_curve_point_is_rejected() {
        let curve = toy_curve();
        let bogus = Point::affine(Uint::from_u64(3), Uint::from_u64(3));
        assert!(!curve.is_on_curve(&bogus));
        assert!(matches!(
            curve.add_points(&bogus, &curve.g),
            Err(Error::InvalidPoint)
        ));
        assert!(matches!(
            curve.multiply_point(&Uint::from_u64(2), &bogus),
            Err(Error::InvalidPoint)
        ));
    }

    #[test]
    fn scalar_multiply_matches_repeated_addition() {
        let curve = toy_curve();
        let g = curve.g;
        let mut acc = g;
        for k in 2..19u64 {
            acc = curve.add_points(&acc, &g).unwrap();
            let product = curve.multiply_point(&Uint::from_u64(k), &g).unwrap();
            assert_eq!(product, acc, "k = {k}");
        }
    }

    #[test]
    fn scalar_multiply_rejects_out_of_range() {
        let curve = toy_curve();
        assert!(matches!(
            curve.multiply_point(&Uint::ZERO, &curve.g),
            Err(Error::ScalarOutOfRange)
        ));
        assert!(matches!(
            curve.multiply_point(&Uint::from_u64(19), &curve.g),
            Err(Error::ScalarOutOfRange)
        ));
    }

    #[test]
    fn order_times_generator_wraps_to_identity() {
        // (n-1)G + G = identity on both the toy curve and secp256k1
        for curve in [toy_curve(), CurveParams::secp256k1()] {
            let n_minus_1 = curve.n.wrapping_sub(&Uint::ONE);
            let almost = curve.multiply_point(&n_minus_1, &curve.g).unwrap();
            assert_eq!(
                curve.add_points(&almost, &curve.g).unwrap(),
                Point::Identity
            );
        }
    }

    #[test]
    fn negate_identity_is_identity() {
        let curve = toy_curve();
        assert_eq!(curve.negate_point(&Point::Identity), Point::Identity);
    }

    #[test]
    fn scalar_arithmetic_mod_n() {
        let curve = toy_curve();
        let a = Uint::from_u64(12);
        let b = Uint::from_u64(15);
        assert_eq!(curve.scalar_add(&a, &b), Uint::from_u64(8)); // 27 mod 19
        assert_eq!(curve.scalar_sub(&a, &b), Uint::from_u64(16)); // -3 mod 19
        assert_eq!(curve.scalar_mul(&a, &b), Uint::from_u64(9)); // 180 mod 19
        assert_eq!(curve.scalar_neg(&a), Uint::from_u64(7));

        let inv = curve.scalar_invert(&a).unwrap();
        assert_eq!(curve.scalar_mul(&a, &inv), Uint::ONE);
        assert!(curve.scalar_invert(&Uint::ZERO).is_none());
        assert!(curve.scalar_invert(&Uint::from_u64(19)).is_none());
    }

    #[test]
    fn digest_reduces_mod_n() {
        let curve = CurveParams::secp256k1();
        let digest = [0xffu8; 32];
        let scalar = curve.scalar_from_digest(&digest);
        assert!(scalar < curve.n);
    }

    #[test]
    fn random_scalar_is_in_range() {
        let curve = CurveParams::secp256k1();
        let mut rng = rand::rngs::OsRng;
        for _ in 0..16 {
            let k = curve.random_scalar(&mut rng);
            assert!(k != Uint::ZERO && k < curve.n);
        }
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        // generator off the curve
        assert!(CurveParams::new(
            Uint::from_u64(17),
            Uint::from_u64(2),
            Uint::from_u64(2),
            Point::affine(Uint::from_u64(3), Uint::from_u64(3)),
            Uint::from_u64(19),
            Uint::ONE,
        )
        .is_err());
        // even modulus
        assert!(CurveParams::new(
            Uint::from_u64(16),
            Uint::from_u64(2),
            Uint::from_u64(2),
            Point::affine(Uint::from_u64(5), Uint::from_u64(1)),
            Uint::from_u64(19),
            Uint::ONE,
        )
        .is_err());
    }
}
