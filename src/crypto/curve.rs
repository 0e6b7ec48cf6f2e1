//! secp256k1 point and scalar plumbing.
//!
//! The point at infinity encodes as all-zero coordinates, which is never a
//! valid affine point, so decoding rejects it along with off-curve input.

use crate::crypto::hash::keccak256;
use crate::types::{CurvePoint, Hash};
use k256::elliptic_curve::ops::Reduce;
use k256::elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use k256::elliptic_curve::{Field, PrimeField};
use k256::{AffinePoint, EncodedPoint, FieldBytes, ProjectivePoint, Scalar, U256};

/// Decode raw coordinates into a curve point.
///
/// Returns `None` for coordinates that are not on the curve.
#[must_use]
pub fn decode_point(point: &CurvePoint) -> Option<ProjectivePoint> {
    let encoded = EncodedPoint::from_affine_coordinates(
        &FieldBytes::clone_from_slice(&point.x),
        &FieldBytes::clone_from_slice(&point.y),
        false,
    );
    Option::<AffinePoint>::from(AffinePoint::from_encoded_point(&encoded))
        .map(ProjectivePoint::from)
}

/// Encode a curve point as raw coordinates.
#[must_use]
pub fn encode_point(point: &ProjectivePoint) -> CurvePoint {
    let encoded = point.to_affine().to_encoded_point(false);
    match (encoded.x(), encoded.y()) {
        (Some(x), Some(y)) => {
            let mut out = CurvePoint::default();
            out.x.copy_from_slice(x);
            out.y.copy_from_slice(y);
            out
        }
        _ => CurvePoint::default(),
    }
}

/// Whether the coordinates name a point on the curve.
#[must_use]
pub fn is_on_curve(point: &CurvePoint) -> bool {
    decode_point(point).is_some()
}

/// Hash arbitrary bytes to a scalar (keccak reduced mod the group order).
#[must_use]
pub fn hash_to_scalar(data: &[u8]) -> Scalar {
    let digest = keccak256(data);
    <Scalar as Reduce<U256>>::reduce_bytes(&FieldBytes::clone_from_slice(&digest))
}

/// Parse a canonical scalar encoding.
#[must_use]
pub fn scalar_from_bytes(bytes: &Hash) -> Option<Scalar> {
    Option::from(Scalar::from_repr(FieldBytes::clone_from_slice(bytes)))
}

/// Canonical scalar encoding.
#[must_use]
pub fn scalar_to_bytes(scalar: &Scalar) -> Hash {
    let mut out = [0u8; 32];
    out.copy_from_slice(&scalar.to_repr());
    out
}

/// `scalar · G` as raw coordinates.
#[must_use]
pub fn mul_base(scalar: &Scalar) -> CurvePoint {
    encode_point(&(ProjectivePoint::GENERATOR * scalar))
}

/// Secret scalar held by a party for key-reveal encryption.
#[derive(Clone)]
pub struct SecretKey(Scalar);

impl SecretKey {
    /// Derive a secret deterministically from seed bytes.
    ///
    /// Returns `None` in the negligible case that the seed hashes to zero.
    #[must_use]
    pub fn from_seed(seed: &[u8]) -> Option<Self> {
        let scalar = hash_to_scalar(seed);
        if bool::from(scalar.is_zero()) {
            None
        } else {
            Some(Self(scalar))
        }
    }

    /// Public point `sk · G`.
    #[must_use]
    pub fn public_point(&self) -> CurvePoint {
        mul_base(&self.0)
    }

    pub(crate) fn scalar(&self) -> &Scalar {
        &self.0
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretKey(..)")
    }
}
