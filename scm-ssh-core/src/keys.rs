use num_bigint::BigInt;

pub const KEY_TYPE_RSA: &str = "ssh-rsa";
pub const KEY_TYPE_DSA: &str = "ssh-dss";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeyType {
    Rsa,
    Dsa,
}

impl KeyType {
    pub fn from_name(name: &str) -> Option<KeyType> {
        match name {
            KEY_TYPE_RSA => Some(KeyType::Rsa),
            KEY_TYPE_DSA => Some(KeyType::Dsa),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            KeyType::Rsa => KEY_TYPE_RSA,
            KeyType::Dsa => KEY_TYPE_DSA,
        }
    }
}

impl std::fmt::Display for KeyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// An SSH public key reduced to the numbers that define it.
///
/// Equality compares exactly those numbers: modulus and exponent for RSA,
/// the public value together with all domain parameters for DSA. Keys of
/// different algorithms are never equal.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum SshPublicKey {
    Rsa {
        modulus: BigInt,
        public_exponent: BigInt,
    },
    Dsa {
        p: BigInt,
        q: BigInt,
        g: BigInt,
        y: BigInt,
    },
}

impl SshPublicKey {
    pub fn key_type(&self) -> KeyType {
        match self {
            SshPublicKey::Rsa { .. } => KeyType::Rsa,
            SshPublicKey::Dsa { .. } => KeyType::Dsa,
        }
    }

    /// Size of the defining modulus (`n` for RSA, `p` for DSA) in bits.
    pub fn bits(&self) -> u64 {
        match self {
            SshPublicKey::Rsa { modulus, .. } => modulus.bits(),
            SshPublicKey::Dsa { p, .. } => p.bits(),
        }
    }
}

impl std::fmt::Debug for SshPublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SshPublicKey::Rsa {
                modulus,
                public_exponent,
            } => f
                .debug_struct("Rsa")
                .field("modulus", &modulus.to_str_radix(16))
                .field("public_exponent", &public_exponent.to_str_radix(16))
                .finish(),
            SshPublicKey::Dsa { y, .. } => f
                .debug_struct("Dsa")
                .field("bits", &self.bits())
                .field("y", &y.to_str_radix(16))
                .finish(),
        }
    }
}

/// Whether `presented` and `candidate` are the same key.
pub fn matches(presented: &SshPublicKey, candidate: &SshPublicKey) -> bool {
    match (presented, candidate) {
        (
            SshPublicKey::Rsa {
                modulus: n1,
                public_exponent: e1,
            },
            SshPublicKey::Rsa {
                modulus: n2,
                public_exponent: e2,
            },
        ) => n1 == n2 && e1 == e2,
        (
            SshPublicKey::Dsa {
                p: p1,
                q: q1,
                g: g1,
                y: y1,
            },
            SshPublicKey::Dsa {
                p: p2,
                q: q2,
                g: g2,
                y: y2,
            },
        ) => y1 == y2 && p1 == p2 && q1 == q2 && g1 == g2,
        _ => false,
    }
}

pub fn contains<'a, I>(keys: I, key: &SshPublicKey) -> bool
where
    I: IntoIterator<Item = &'a SshPublicKey>,
{
    keys.into_iter().any(|k| matches(key, k))
}
