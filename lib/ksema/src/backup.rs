//! Backup container and backup file codecs
//!
//! The appliance returns exported key material as a length-prefixed binary container:
//!
//! ```text
//! u16 header_len | header | u16 exported_len | exported [| u16 exported2_len | exported2]
//! ```
//!
//! All lengths are big-endian. The trailing block is present only for key-pair
//! exporting sessions. On disk each export becomes a two-line text file
//! (`header\nexported`); the secondary export goes to a `priv`-prefixed sibling.

use std::path::{Path, PathBuf};

use crate::error::KsemaError;

pub const SECONDARY_FILE_PREFIX: &str = "priv";

/// Bounds-checked reader over a container buffer.
struct ContainerReader<'a> {
    buf: &'a [u8],
}

impl<'a> ContainerReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn take(&mut self, field: &'static str, needed: usize) -> Result<&'a [u8], KsemaError> {
        if needed > self.buf.len() {
            return Err(KsemaError::ContainerOverrun {
                field,
                needed,
                remaining: self.buf.len(),
            });
        }
        let (head, tail) = self.buf.split_at(needed);
        self.buf = tail;
        Ok(head)
    }

    fn read_u16(&mut self, field: &'static str) -> Result<u16, KsemaError> {
        let bytes = self.take(field, 2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn read_field(&mut self, field: &'static str) -> Result<String, KsemaError> {
        let len = self.read_u16(field)? as usize;
        let bytes = self.take(field, len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| KsemaError::InvalidUtf8(field))
    }

    fn finish(self) -> Result<(), KsemaError> {
        if !self.buf.is_empty() {
            return Err(KsemaError::TrailingBytes(self.buf.len()));
        }
        Ok(())
    }
}

/// Decoded backup container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupContainer {
    pub header: String,
    pub exported: String,
    /// Second half of a key pair, for key-pair exporting sessions only.
    pub secondary: Option<String>,
}

impl BackupContainer {
    /// Parse a container. `key_pair` selects whether the secondary block is expected.
    pub fn parse(bytes: &[u8], key_pair: bool) -> Result<Self, KsemaError> {
        let mut reader = ContainerReader::new(bytes);
        let header = reader.read_field("header")?;
        let exported = reader.read_field("exported")?;
        let secondary = if key_pair {
            Some(reader.read_field("secondary export")?)
        } else {
            None
        };
        reader.finish()?;

        Ok(Self {
            header,
            exported,
            secondary,
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, KsemaError> {
        let mut out = Vec::new();
        write_field(&mut out, "header", self.header.as_bytes())?;
        write_field(&mut out, "exported", self.exported.as_bytes())?;
        if let Some(secondary) = &self.secondary {
            write_field(&mut out, "secondary export", secondary.as_bytes())?;
        }
        Ok(out)
    }

    pub fn primary_file(&self) -> BackupFile {
        BackupFile {
            header: self.header.clone(),
            exported: self.exported.clone(),
        }
    }

    pub fn secondary_file(&self) -> Option<BackupFile> {
        self.secondary.as_ref().map(|exported| BackupFile {
            header: self.header.clone(),
            exported: exported.clone(),
        })
    }

    /// Write the primary file to `target` and the secondary file, if any, beside it.
    /// Returns the paths written.
    pub fn write_files(&self, target: &Path) -> Result<Vec<PathBuf>, KsemaError> {
        let secondary = match self.secondary_file() {
            Some(file) => Some((secondary_path(target)?, file)),
            None => None,
        };

        self.primary_file().write(target)?;
        let mut written = vec![target.to_path_buf()];

        if let Some((path, file)) = secondary {
            file.write(&path)?;
            written.push(path);
        }

        Ok(written)
    }
}

fn write_field(out: &mut Vec<u8>, field: &'static str, bytes: &[u8]) -> Result<(), KsemaError> {
    let len = u16::try_from(bytes.len()).map_err(|_| KsemaError::FieldTooLong {
        field,
        len: bytes.len(),
    })?;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(bytes);
    Ok(())
}

/// Path of the secondary export: the target's file name prefixed with `priv`.
pub fn secondary_path(target: &Path) -> Result<PathBuf, KsemaError> {
    let file_name = target.file_name().ok_or_else(|| {
        KsemaError::Config(format!("backup path has no file name: {}", target.display()))
    })?;
    let mut name = std::ffi::OsString::from(SECONDARY_FILE_PREFIX);
    name.push(file_name);
    Ok(target.with_file_name(name))
}

/// Two-line backup file: header, then exported key material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupFile {
    pub header: String,
    pub exported: String,
}

impl BackupFile {
    /// Split on the first newline. A file without one is rejected.
    pub fn parse(contents: &[u8]) -> Result<Self, KsemaError> {
        let newline = contents
            .iter()
            .position(|b| *b == b'\n')
            .ok_or(KsemaError::InvalidBackupFile)?;
        let (header, rest) = contents.split_at(newline);

        Ok(Self {
            header: String::from_utf8(header.to_vec())
                .map_err(|_| KsemaError::InvalidUtf8("backup header"))?,
            exported: String::from_utf8(rest[1..].to_vec())
                .map_err(|_| KsemaError::InvalidUtf8("backup export"))?,
        })
    }

    pub fn read(path: &Path) -> Result<Self, KsemaError> {
        let contents = std::fs::read(path)?;
        Self::parse(&contents)
    }

    pub fn to_text(&self) -> String {
        format!("{}\n{}", self.header, self.exported)
    }

    pub fn write(&self, path: &Path) -> Result<(), KsemaError> {
        std::fs::write(path, self.to_text())?;
        Ok(())
    }

    /// Bytes sent back on restore. The header stays local.
    pub fn restore_payload(&self) -> Vec<u8> {
        self.exported.as_bytes().to_vec()
    }
}
