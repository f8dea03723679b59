//! Commutative card cipher.
//!
//! Every peer holds an SRA-style exponent pair `(e, d)` over one shared
//! 128-bit prime `p` with `e · d ≡ 1 (mod p − 1)`. Because all peers share
//! the modulus, encryption layers commute: `E_a(E_b(x)) = E_b(E_a(x))`, so a
//! peer can peel its own layer off a card no matter in which order the
//! layers were applied.

use num_bigint::{BigInt, BigUint};
use num_traits::{One, Signed, Zero};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// The modulus every peer encrypts under. Hard-coded: the protocol has no
/// parameter negotiation.
static SHARED_PRIME: LazyLock<BigUint> = LazyLock::new(|| {
    BigUint::parse_bytes(b"C7970CEDCC5226685694605929849D3D", 16)
        .expect("shared prime literal parses")
});

#[must_use]
pub fn shared_prime() -> &'static BigUint {
    &SHARED_PRIME
}

/// One peer's exponent pair for the current deal.
#[derive(Clone, Serialize, Deserialize)]
pub struct CardCipher {
    enc: BigUint,
    dec: BigUint,
    prime: BigUint,
}

impl CardCipher {
    /// Generate a fresh pair under the shared prime. Exponents without an
    /// inverse mod `p − 1` are silently re-drawn.
    pub fn generate<R: RngCore>(rng: &mut R) -> Self {
        Self::generate_under(rng, shared_prime().clone())
    }

    fn generate_under<R: RngCore>(rng: &mut R, prime: BigUint) -> Self {
        let phi = &prime - BigUint::one();
        loop {
            let enc = random_below(rng, &phi);
            if enc <= BigUint::one() {
                continue;
            }
            if let Some(dec) = mod_inverse(&enc, &phi) {
                return Self { enc, dec, prime };
            }
        }
    }

    /// Apply this peer's encryption layer to a card slot.
    #[must_use]
    pub fn encrypt(&self, data: &[u8]) -> Vec<u8> {
        BigUint::from_bytes_be(data)
            .modpow(&self.enc, &self.prime)
            .to_bytes_be()
    }

    /// Peel this peer's layer off a card slot.
    #[must_use]
    pub fn decrypt(&self, data: &[u8]) -> Vec<u8> {
        BigUint::from_bytes_be(data)
            .modpow(&self.dec, &self.prime)
            .to_bytes_be()
    }

    /// Whether a received slot is a valid ciphertext under the shared prime.
    #[must_use]
    pub fn accepts(&self, data: &[u8]) -> bool {
        !data.is_empty() && BigUint::from_bytes_be(data) < self.prime
    }
}

impl std::fmt::Debug for CardCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print the exponents.
        write!(f, "CardCipher({} bits)", self.prime.bits())
    }
}

/// Uniform draw from `[0, bound)` by rejection sampling.
fn random_below<R: RngCore>(rng: &mut R, bound: &BigUint) -> BigUint {
    let mut buf = vec![0u8; bound.to_bytes_be().len()];
    let top_bits = {
        let rem = bound.bits() % 8;
        if rem == 0 { 8 } else { rem }
    };
    let mask = 0xffu8 >> (8 - top_bits);
    loop {
        rng.fill_bytes(&mut buf);
        buf[0] &= mask;
        let candidate = BigUint::from_bytes_be(&buf);
        if &candidate < bound {
            return candidate;
        }
    }
}

/// Modular inverse via the extended Euclidean algorithm; `None` when
/// `gcd(a, modulus) != 1`.
fn mod_inverse(a: &BigUint, modulus: &BigUint) -> Option<BigUint> {
    let (x, _, gcd) = extended_gcd(BigInt::from(a.clone()), BigInt::from(modulus.clone()));
    if !gcd.is_one() {
        return None;
    }
    let m = BigInt::from(modulus.clone());
    let mut inv = x % &m;
    if inv.is_negative() {
        inv += &m;
    }
    inv.to_biguint()
}

/// Extended Euclidean algorithm: returns `(x, y, gcd)` with
/// `a·x + b·y = gcd(a, b)`.
fn extended_gcd(a: BigInt, b: BigInt) -> (BigInt, BigInt, BigInt) {
    let (mut old_r, mut r) = (a, b);
    let (mut old_s, mut s) = (BigInt::one(), BigInt::zero());
    let (mut old_t, mut t) = (BigInt::zero(), BigInt::one());

    while !r.is_zero() {
        let q = &old_r / &r;
        (old_r, r) = (r.clone(), old_r - &q * r);
        (old_s, s) = (s.clone(), old_s - &q * s);
        (old_t, t) = (t.clone(), old_t - &q * t);
    }
    (old_s, old_t, old_r)
}
