// Galois field GF(256)
//------------------------------------------------------------------------------

// Field generated by x^8 + x^4 + x^3 + x^2 + 1.
const PRIMITIVE: u16 = 0x11D;

const EXP: [u8; 256] = {
    let mut exp = [0u8; 256];
    let mut v: u16 = 1;
    let mut i = 0;
    while i < 256 {
        exp[i] = v as u8;
        v <<= 1;
        if v & 0x100 != 0 {
            v ^= PRIMITIVE;
        }
        i += 1;
    }
    exp
};

const LOG: [u8; 256] = {
    let mut log = [0u8; 256];
    let mut i = 0;
    while i < 255 {
        log[EXP[i] as usize] = i as u8;
        i += 1;
    }
    log
};

/// GF(256) element with the field ops the codec needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gf(pub u8);

impl Gf {
    pub const ZERO: Gf = Gf(0);
    pub const ONE: Gf = Gf(1);

    #[inline]
    pub fn exp(power: usize) -> Gf {
        Gf(EXP[power % 255])
    }

    #[inline]
    pub fn log(self) -> usize {
        debug_assert!(self.0 != 0, "Log of zero");

        LOG[self.0 as usize] as usize
    }

    #[inline]
    pub fn mul(self, rhs: Gf) -> Gf {
        if self.0 == 0 || rhs.0 == 0 {
            return Gf::ZERO;
        }
        Gf::exp(self.log() + rhs.log())
    }

    #[inline]
    pub fn inv(self) -> Gf {
        debug_assert!(self.0 != 0, "Inverse of zero");

        Gf::exp(255 - self.log())
    }

    #[inline]
    pub fn add(self, rhs: Gf) -> Gf {
        Gf(self.0 ^ rhs.0)
    }
}

// Reed-Solomon encoder
//------------------------------------------------------------------------------

/// Computes `ec_len` parity codewords for `data` by polynomial division
/// against the generator with roots a^0..a^(ec_len-1).
pub fn rs_compute_ec(data: &[u8], ec_len: usize) -> Vec<u8> {
    debug_assert!(ec_len > 0, "No EC codewords requested");

    // Build the generator product term by term.
    let mut gen = vec![Gf::ONE];
    for i in 0..ec_len {
        let root = Gf::exp(i);
        let mut next = vec![Gf::ZERO; gen.len() + 1];
        for (j, &c) in gen.iter().enumerate() {
            next[j] = next[j].add(c.mul(root));
            next[j + 1] = next[j + 1].add(c);
        }
        gen = next;
    }
    // gen is lowest-degree-first after the loop above; divide with the
    // highest coefficient leading.
    gen.reverse();

    let mut rem = vec![Gf::ZERO; ec_len];
    for &d in data {
        let factor = Gf(d).add(rem[0]);
        rem.rotate_left(1);
        rem[ec_len - 1] = Gf::ZERO;
        for (r, &g) in rem.iter_mut().zip(gen[1..].iter()) {
            *r = r.add(factor.mul(g));
        }
    }
    rem.into_iter().map(|g| g.0).collect()
}

// Reed-Solomon decoder
//------------------------------------------------------------------------------

/// Corrects up to `ec_len / 2` byte errors in `codewords` in place. Returns
/// the number of errors fixed, or a checksum failure when the word is beyond
/// repair.
pub fn rs_correct(codewords: &mut [u8], ec_len: usize) -> crate::error::ScanResult<usize> {
    use crate::error::ScanError;

    let n = codewords.len();
    debug_assert!(ec_len < n, "EC length exceeds codeword count: {ec_len} >= {n}");

    // Syndromes S_i = R(a^i).
    let mut syndromes = vec![Gf::ZERO; ec_len];
    let mut has_error = false;
    for (i, s) in syndromes.iter_mut().enumerate() {
        let mut acc = Gf::ZERO;
        for &c in codewords.iter() {
            acc = acc.mul(Gf::exp(i)).add(Gf(c));
        }
        *s = acc;
        has_error |= acc != Gf::ZERO;
    }
    if !has_error {
        return Ok(0);
    }

    // Berlekamp-Massey for the error locator sigma.
    let mut sigma = vec![Gf::ONE];
    let mut prev_sigma = vec![Gf::ONE];
    let mut l = 0usize;
    let mut m = 1usize;
    let mut b = Gf::ONE;
    for step in 0..ec_len {
        let mut delta = syndromes[step];
        for i in 1..=l.min(sigma.len() - 1) {
            delta = delta.add(sigma[i].mul(syndromes[step - i]));
        }
        if delta == Gf::ZERO {
            m += 1;
        } else if 2 * l <= step {
            let tmp = sigma.clone();
            let coeff = delta.mul(b.inv());
            if sigma.len() < prev_sigma.len() + m {
                sigma.resize(prev_sigma.len() + m, Gf::ZERO);
            }
            for (i, &p) in prev_sigma.iter().enumerate() {
                sigma[i + m] = sigma[i + m].add(coeff.mul(p));
            }
            l = step + 1 - l;
            prev_sigma = tmp;
            b = delta;
            m = 1;
        } else {
            let coeff = delta.mul(b.inv());
            if sigma.len() < prev_sigma.len() + m {
                sigma.resize(prev_sigma.len() + m, Gf::ZERO);
            }
            for (i, &p) in prev_sigma.iter().enumerate() {
                sigma[i + m] = sigma[i + m].add(coeff.mul(p));
            }
            m += 1;
        }
    }
    if l * 2 > ec_len {
        return Err(ScanError::Checksum);
    }

    // Chien search over field elements for roots of sigma.
    let mut error_positions = Vec::with_capacity(l);
    for i in 0..255usize {
        let x = Gf::exp(i);
        let mut acc = Gf::ZERO;
        // Evaluate sigma at x^-1 scaled: sigma(x) with x = a^-i locates an
        // error at position i from the end.
        let x_inv = x.inv();
        let mut pow = Gf::ONE;
        for &c in sigma.iter() {
            acc = acc.add(c.mul(pow));
            pow = pow.mul(x_inv);
        }
        if acc == Gf::ZERO {
            // Root at X = a^-i means error location a^i, codeword index
            // n - 1 - i.
            if i >= n {
                return Err(ScanError::Checksum);
            }
            error_positions.push(i);
        }
    }
    if error_positions.len() != l {
        return Err(ScanError::Checksum);
    }

    // Forney: magnitude e_j = X_j * omega(X_j^-1) / sigma'(X_j^-1), with
    // omega = S * sigma mod x^ec_len.
    let mut omega = vec![Gf::ZERO; ec_len];
    for (i, o) in omega.iter_mut().enumerate() {
        let mut acc = Gf::ZERO;
        for j in 0..=i.min(sigma.len() - 1) {
            acc = acc.add(sigma[j].mul(syndromes[i - j]));
        }
        *o = acc;
    }

    for &pos in &error_positions {
        let x = Gf::exp(pos);
        let x_inv = x.inv();

        let mut omega_val = Gf::ZERO;
        let mut pow = Gf::ONE;
        for &c in omega.iter() {
            omega_val = omega_val.add(c.mul(pow));
            pow = pow.mul(x_inv);
        }

        // Formal derivative keeps odd-degree terms only: sigma'(y) =
        // sum over odd deg of c * y^(deg - 1), evaluated at y = x_inv.
        let mut sigma_deriv = Gf::ZERO;
        for (deg, &c) in sigma.iter().enumerate() {
            if deg % 2 == 1 {
                let mut p = Gf::ONE;
                for _ in 0..deg - 1 {
                    p = p.mul(x_inv);
                }
                sigma_deriv = sigma_deriv.add(c.mul(p));
            }
        }
        if sigma_deriv == Gf::ZERO {
            return Err(ScanError::Checksum);
        }

        let magnitude = x.mul(omega_val).mul(sigma_deriv.inv());
        codewords[n - 1 - pos] ^= magnitude.0;
    }

    // Recheck all syndromes after correction.
    for i in 0..ec_len {
        let mut acc = Gf::ZERO;
        for &c in codewords.iter() {
            acc = acc.mul(Gf::exp(i)).add(Gf(c));
        }
        if acc != Gf::ZERO {
            return Err(ScanError::Checksum);
        }
    }
    Ok(error_positions.len())
}

#[cfg(test)]
mod gf_tests {
    use super::*;

    #[test]
    fn test_exp_log_inverse_of_each_other() {
        for i in 1..=255u16 {
            let g = Gf(i as u8);
            assert_eq!(Gf::exp(g.log()), g);
        }
    }

    #[test]
    fn test_mul_inv() {
        for i in 1..=255u16 {
            let g = Gf(i as u8);
            assert_eq!(g.mul(g.inv()), Gf::ONE);
        }
        assert_eq!(Gf(0).mul(Gf(37)), Gf::ZERO);
    }
}
