use bstr::BString;

use crate::ObjectError;

/// POSIX type mask (`S_IFMT`).
const TYPE_MASK: u32 = 0o170000;
/// Any-executable permission bits.
const EXEC_BITS: u32 = 0o111;

/// File mode of a tree or index entry.
///
/// Only five values are meaningful to this database; anything else in a
/// tree object is a corruption. `matches` classifies raw stat-style mode
/// integers, ignoring permission bits beyond what distinguishes the kinds
/// (index readers rely on this).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileMode {
    /// Regular file (100644).
    Regular,
    /// Executable file (100755).
    Executable,
    /// Symbolic link (120000).
    Symlink,
    /// Subdirectory (040000).
    Tree,
    /// Absent entry (0).
    Missing,
}

impl FileMode {
    /// Parse from ASCII octal bytes as stored in tree objects.
    ///
    /// Only the known mode values are accepted.
    pub fn from_octal_bytes(s: &[u8]) -> Result<Self, ObjectError> {
        let raw = parse_octal(s).ok_or_else(|| ObjectError::InvalidMode(BString::from(s)))?;
        match raw {
            0o100644 => Ok(Self::Regular),
            0o100755 => Ok(Self::Executable),
            0o120000 => Ok(Self::Symlink),
            0o040000 => Ok(Self::Tree),
            0 => Ok(Self::Missing),
            _ => Err(ObjectError::InvalidMode(BString::from(s))),
        }
    }

    /// The canonical octal wire form, without leading zeros.
    pub fn as_octal_bytes(&self) -> &'static [u8] {
        match self {
            Self::Regular => b"100644",
            Self::Executable => b"100755",
            Self::Symlink => b"120000",
            Self::Tree => b"40000",
            Self::Missing => b"0",
        }
    }

    /// The numeric mode bits.
    pub fn bits(&self) -> u32 {
        match self {
            Self::Regular => 0o100644,
            Self::Executable => 0o100755,
            Self::Symlink => 0o120000,
            Self::Tree => 0o040000,
            Self::Missing => 0,
        }
    }

    /// Whether a raw mode integer is of this kind.
    ///
    /// Permission bits other than the executable bits are ignored, so
    /// `0o100664` still matches `Regular`.
    pub fn matches(&self, mode_bits: u32) -> bool {
        match self {
            Self::Regular => {
                mode_bits & TYPE_MASK == 0o100000 && mode_bits & EXEC_BITS == 0
            }
            Self::Executable => {
                mode_bits & TYPE_MASK == 0o100000 && mode_bits & EXEC_BITS != 0
            }
            Self::Symlink => mode_bits & TYPE_MASK == 0o120000,
            Self::Tree => mode_bits & TYPE_MASK == 0o040000,
            Self::Missing => mode_bits == 0,
        }
    }

    /// Is this a tree (directory) mode?
    pub fn is_tree(&self) -> bool {
        matches!(self, Self::Tree)
    }

    /// Is this a blob (file) mode?
    pub fn is_blob(&self) -> bool {
        matches!(self, Self::Regular | Self::Executable)
    }
}

/// Parse an octal ASCII string to u32.
fn parse_octal(s: &[u8]) -> Option<u32> {
    if s.is_empty() {
        return None;
    }
    let mut val: u32 = 0;
    for &b in s {
        if !(b'0'..=b'7').contains(&b) {
            return None;
        }
        val = val.checked_mul(8)?.checked_add(u32::from(b - b'0'))?;
    }
    Some(val)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn octal_roundtrip() {
        for mode in [
            FileMode::Regular,
            FileMode::Executable,
            FileMode::Symlink,
            FileMode::Tree,
            FileMode::Missing,
        ] {
            let parsed = FileMode::from_octal_bytes(mode.as_octal_bytes()).unwrap();
            assert_eq!(parsed, mode);
        }
    }

    #[test]
    fn leading_zero_form_parses() {
        // Some writers emit the zero-padded tree mode.
        assert_eq!(FileMode::from_octal_bytes(b"040000").unwrap(), FileMode::Tree);
    }

    #[test]
    fn unknown_modes_rejected() {
        assert!(FileMode::from_octal_bytes(b"160000").is_err());
        assert!(FileMode::from_octal_bytes(b"100600").is_err());
        assert!(FileMode::from_octal_bytes(b"").is_err());
        assert!(FileMode::from_octal_bytes(b"10x644").is_err());
    }

    #[test]
    fn matches_ignores_permission_noise() {
        assert!(FileMode::Regular.matches(0o100644));
        assert!(FileMode::Regular.matches(0o100664));
        assert!(!FileMode::Regular.matches(0o100755));

        assert!(FileMode::Executable.matches(0o100755));
        assert!(FileMode::Executable.matches(0o100744));
        assert!(!FileMode::Executable.matches(0o100644));

        assert!(FileMode::Symlink.matches(0o120000));
        assert!(FileMode::Tree.matches(0o040000));
        assert!(FileMode::Tree.matches(0o040755));
        assert!(FileMode::Missing.matches(0));
        assert!(!FileMode::Missing.matches(0o100644));
    }

    #[test]
    fn kind_predicates() {
        assert!(FileMode::Tree.is_tree());
        assert!(FileMode::Regular.is_blob());
        assert!(FileMode::Executable.is_blob());
        assert!(!FileMode::Symlink.is_blob());
        assert!(!FileMode::Missing.is_tree());
    }
}
