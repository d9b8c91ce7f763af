//! Decoder configuration.

use ia32dec_core::Architecture;

/// Options applied when constructing a decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderConfig {
    /// Initial decoding mode. Can be changed later with `set_mode`.
    pub architecture: Architecture,
    /// Virtual address of the first byte of the bound buffer.
    pub base_address: u64,
    /// Leave operands unresolved until `complete` is called.
    pub defer_operands: bool,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            architecture: Architecture::X86,
            base_address: 0,
            defer_operands: true,
        }
    }
}

impl DecoderConfig {
    /// Creates a configuration for the given architecture.
    pub fn new(architecture: Architecture) -> Self {
        Self {
            architecture,
            ..Self::default()
        }
    }

    pub fn with_architecture(mut self, architecture: Architecture) -> Self {
        self.architecture = architecture;
        self
    }

    pub fn with_base_address(mut self, base_address: u64) -> Self {
        self.base_address = base_address;
        self
    }

    /// Resolve operands during `decode` instead of on demand.
    pub fn eager(mut self) -> Self {
        self.defer_operands = false;
        self
    }

    pub fn with_deferred_operands(mut self, defer: bool) -> Self {
        self.defer_operands = defer;
        self
    }
}
