#![no_main]

use ia32dec_disasm::{Architecture, Disassembler, X86Decoder};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // First byte picks the mode, the rest is code
    let Some((&mode, code)) = data.split_first() else {
        return;
    };
    let arch = Architecture::from_mode(mode & 1 == 1);

    // Single decode + completion must never panic
    let decoder = X86Decoder::detached(arch);
    if let Ok(mut insn) = decoder.decode_at(code, 0x1000) {
        assert!(insn.size <= code.len());
        decoder
            .complete(&mut insn)
            .expect("validated instruction failed to complete");
        let _ = insn.to_string();
    }

    // Cursor walk over the whole input
    let mut decoder = X86Decoder::new(code, arch);
    let mut count = 0;
    for result in decoder.instructions() {
        if result.is_err() || count >= 100 {
            break;
        }
        count += 1;
    }

    // Linear sweep with resynchronisation
    if code.len() >= 16 {
        let _ = decoder.disassemble_block(code, 0x1000);
    }
});
