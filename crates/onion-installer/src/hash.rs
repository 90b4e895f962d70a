use crate::error::InstallerError;
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

const CHUNK_SIZE: usize = 1024 * 1024;

pub struct HashVerifier;

impl HashVerifier {
    pub fn sha256_of_file(path: &Path) -> Result<String, InstallerError> {
        let mut file = std::fs::File::open(path)?;
        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; CHUNK_SIZE];

        loop {
            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }

        Ok(hex::encode(hasher.finalize()))
    }

    pub fn verify(path: &Path, want_hex: &str) -> Result<bool, InstallerError> {
        let got = Self::sha256_of_file(path)?;
        Ok(got.eq_ignore_ascii_case(want_hex))
    }
}
