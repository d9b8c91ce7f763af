//! Architecture identification and properties.

/// Supported decoding modes of the x86 family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Architecture {
    /// 32-bit x86 (IA-32, protected mode)
    #[default]
    X86,
    /// x86-64 / AMD64 (long mode)
    X86_64,
}

impl Architecture {
    /// Returns the architecture for a 64-bit or 32-bit mode flag.
    pub fn from_mode(is_64: bool) -> Self {
        if is_64 {
            Self::X86_64
        } else {
            Self::X86
        }
    }

    /// Parses an architecture name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "x86" | "i386" | "i686" | "ia32" | "x86_32" => Some(Self::X86),
            "x86_64" | "x86-64" | "amd64" | "x64" => Some(Self::X86_64),
            _ => None,
        }
    }

    /// Returns whether this is a 64-bit architecture.
    pub fn is_64bit(&self) -> bool {
        matches!(self, Self::X86_64)
    }

    /// Returns the name of this architecture.
    pub fn name(&self) -> &'static str {
        match self {
            Self::X86_64 => "x86_64",
            Self::X86 => "x86",
        }
    }
}

impl std::fmt::Display for Architecture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name() {
        assert_eq!(Architecture::from_name("AMD64"), Some(Architecture::X86_64));
        assert_eq!(Architecture::from_name("i386"), Some(Architecture::X86));
        assert_eq!(Architecture::from_name("arm64"), None);
    }

    #[test]
    fn test_mode_flag() {
        assert_eq!(Architecture::from_mode(true), Architecture::X86_64);
        assert!(!Architecture::from_mode(false).is_64bit());
        assert_eq!(Architecture::default(), Architecture::X86);
    }
}
