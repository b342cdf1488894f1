use crate::errors::CoreError;
use super::encryption::KdfParams;

/// Magic bytes identifying a TradeWallet backup.
pub const MAGIC: &[u8; 4] = b"TWLT";

/// Current backup format version.
pub const CURRENT_VERSION: u16 = 1;

/// Fixed header size:
/// magic(4) + version(2) + kdf_params(12) + salt(16) + nonce(12) + ciphertext_len(8) = 54
pub const HEADER_SIZE: usize = 54;

/// Header of an encrypted backup.
///
/// ```text
/// [TWLT: 4B] [version: 2B LE] [memory_cost: 4B LE] [time_cost: 4B LE]
/// [parallelism: 4B LE] [salt: 16B] [nonce: 12B] [ciphertext_len: 8B LE]
/// [ciphertext: variable]
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupHeader {
    pub version: u16,
    pub kdf_params: KdfParams,
    pub salt: [u8; 16],
    pub nonce: [u8; 12],
    pub ciphertext_len: u64,
}

impl BackupHeader {
    /// Header plus ciphertext as one buffer.
    pub fn frame(&self, ciphertext: &[u8]) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_SIZE + ciphertext.len());
        buf.extend_from_slice(MAGIC);
        buf.extend_from_slice(&self.version.to_le_bytes());
        buf.extend_from_slice(&self.kdf_params.memory_cost.to_le_bytes());
        buf.extend_from_slice(&self.kdf_params.time_cost.to_le_bytes());
        buf.extend_from_slice(&self.kdf_params.parallelism.to_le_bytes());
        buf.extend_from_slice(&self.salt);
        buf.extend_from_slice(&self.nonce);
        buf.extend_from_slice(&self.ciphertext_len.to_le_bytes());
        buf.extend_from_slice(ciphertext);
        buf
    }

    /// Parse and validate a framed backup, returning the header and the
    /// ciphertext slice. Trailing bytes after the ciphertext are ignored.
    pub fn parse(data: &[u8]) -> Result<(Self, &[u8]), CoreError> {
        if data.len() < HEADER_SIZE {
            return Err(CoreError::InvalidFileFormat(
                "Data too small to be a TradeWallet backup".into(),
            ));
        }
        if &data[0..4] != MAGIC {
            return Err(CoreError::InvalidFileFormat(
                "Invalid magic bytes: not a TradeWallet backup".into(),
            ));
        }

        let mut reader = HeaderReader { data, offset: 4 };

        let version = u16::from_le_bytes(reader.take()?);
        if version == 0 || version > CURRENT_VERSION {
            return Err(CoreError::UnsupportedVersion(version));
        }

        let kdf_params = KdfParams {
            memory_cost: u32::from_le_bytes(reader.take()?),
            time_cost: u32::from_le_bytes(reader.take()?),
            parallelism: u32::from_le_bytes(reader.take()?),
        };
        // Crafted headers must not be able to request huge Argon2 costs.
        kdf_params.validate()?;

        let salt: [u8; 16] = reader.take()?;
        let nonce: [u8; 12] = reader.take()?;
        let ciphertext_len = u64::from_le_bytes(reader.take()?);

        let body = &data[reader.offset..];
        let len = usize::try_from(ciphertext_len).map_err(|_| {
            CoreError::InvalidFileFormat(format!("Ciphertext length {ciphertext_len} too large"))
        })?;
        if body.len() < len {
            return Err(CoreError::InvalidFileFormat(format!(
                "Backup truncated: expected {} bytes of ciphertext, got {}",
                ciphertext_len,
                body.len()
            )));
        }

        let header = Self {
            version,
            kdf_params,
            salt,
            nonce,
            ciphertext_len,
        };
        Ok((header, &body[..len]))
    }
}

struct HeaderReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl HeaderReader<'_> {
    fn take<const N: usize>(&mut self) -> Result<[u8; N], CoreError> {
        let end = self.offset + N;
        let bytes: [u8; N] = self
            .data
            .get(self.offset..end)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| {
                CoreError::InvalidFileFormat(format!("Header field at offset {} is truncated", self.offset))
            })?;
        self.offset = end;
        Ok(bytes)
    }
}
