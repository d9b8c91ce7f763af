//! Integration tests for the decoder's public contract: cursor movement,
//! end-of-stream reporting, mode switching and deferred completion.

use ia32dec_core::{register::x86, ControlFlow, Operand, OperandKind, Register};
use ia32dec_disasm::{
    make_decoder, Architecture, DecodeError, DecoderConfig, Disassembler, Instruction,
    X86Decoder,
};

/// push rbp; mov rbp, rsp; sub rsp, 0x20; mov eax, 1; leave; ret
const PROLOGUE_64: &[u8] = &[
    0x55, // push rbp
    0x48, 0x89, 0xe5, // mov rbp, rsp
    0x48, 0x83, 0xec, 0x20, // sub rsp, 0x20
    0xb8, 0x01, 0x00, 0x00, 0x00, // mov eax, 1
    0xc9, // leave
    0xc3, // ret
];

fn completed(decoder: &X86Decoder<'_>, mut insn: Instruction) -> Instruction {
    decoder.complete(&mut insn).unwrap();
    insn
}

#[test]
fn single_instruction_consumes_whole_buffer() {
    let cases: &[(Architecture, &[u8])] = &[
        (Architecture::X86_64, &[0x48, 0x89, 0xe5]),
        (Architecture::X86_64, &[0x48, 0x8b, 0x04, 0x25, 0x28, 0x00, 0x00, 0x00]),
        (Architecture::X86, &[0x8b, 0x44, 0x24, 0x04]),
        (Architecture::X86, &[0x66, 0xb8, 0x34, 0x12]),
        (Architecture::X86, &[0xe9, 0x00, 0x00, 0x00, 0x00]),
    ];

    for (arch, bytes) in cases {
        let mut decoder = X86Decoder::new(bytes, *arch);
        let insn = decoder.decode().unwrap();
        assert_eq!(insn.size, bytes.len(), "{bytes:02x?}");
        assert_eq!(decoder.position(), bytes.len());
        assert!(decoder.is_at_end());
    }
}

#[test]
fn empty_and_exhausted_buffers_report_end() {
    let mut decoder = X86Decoder::new(&[], Architecture::X86);
    let err = decoder.decode().unwrap_err();
    assert!(err.is_end_of_buffer());
    assert_eq!(decoder.position(), 0);

    let code = [0xc3];
    let mut decoder = X86Decoder::new(&code, Architecture::X86);
    decoder.decode().unwrap();
    for _ in 0..3 {
        assert!(decoder.decode().unwrap_err().is_end_of_buffer());
        assert_eq!(decoder.position(), 1);
    }

    // No buffer at all
    let mut decoder = X86Decoder::default();
    assert_eq!(decoder.architecture(), Architecture::X86);
    assert!(decoder.decode().unwrap_err().is_end_of_buffer());
}

#[test]
fn failed_decode_leaves_cursor_in_place() {
    // nop, then a call whose displacement is cut off
    let code = [0x90, 0xe8, 0x00, 0x01];
    let mut decoder = X86Decoder::new(&code, Architecture::X86_64);
    decoder.decode().unwrap();

    let err = decoder.decode().unwrap_err();
    assert_eq!(err, DecodeError::truncated(1, 5, 3));
    assert_eq!(decoder.position(), 1);

    // The sentinel view collapses the error
    assert!(decoder.decode().ok().is_none());
}

#[test]
fn complete_is_idempotent() {
    let mut decoder = X86Decoder::new(PROLOGUE_64, Architecture::X86_64);
    while let Ok(mut insn) = decoder.decode() {
        assert!(!insn.is_complete());
        decoder.complete(&mut insn).unwrap();
        let first = insn.clone();
        decoder.complete(&mut insn).unwrap();
        decoder.complete(&mut insn).unwrap();
        assert_eq!(first, insn);
    }
}

#[test]
fn mode_changes_how_rex_bytes_decode() {
    let bytes = [0x48, 0x89, 0xe5];

    let mut decoder = X86Decoder::detached(Architecture::X86);
    let insn32 = completed(&decoder, decoder.decode_at(&bytes, 0).unwrap());
    assert_eq!(insn32.mnemonic, "dec");
    assert_eq!(insn32.size, 1);

    decoder.set_mode(true);
    let insn64 = completed(&decoder, decoder.decode_at(&bytes, 0).unwrap());
    assert_eq!(insn64.mnemonic, "mov");
    assert_eq!(insn64.size, 3);
    assert_eq!(insn64.write_set(), vec![Register::gpr(x86::RBP, 64)]);

    // 41 50: inc ecx; push eax  vs  push r8
    let bytes = [0x41, 0x50];
    decoder.set_mode(false);
    assert_eq!(decoder.decode_at(&bytes, 0).unwrap().mnemonic, "inc");
    decoder.set_mode(true);
    let push = completed(&decoder, decoder.decode_at(&bytes, 0).unwrap());
    assert_eq!(push.size, 2);
    assert_eq!(
        push.operands().unwrap()[0].operand,
        Operand::reg(Register::gpr(x86::R8, 64))
    );
}

#[test]
fn concatenated_instructions_decode_in_sequence() {
    let mut decoder = X86Decoder::new(PROLOGUE_64, Architecture::X86_64);
    let mut sizes = Vec::new();
    loop {
        match decoder.decode() {
            Ok(insn) => sizes.push(insn.size),
            Err(err) => {
                assert!(err.is_end_of_buffer());
                break;
            }
        }
    }
    assert_eq!(sizes, vec![1, 3, 4, 5, 1, 1]);
    assert_eq!(sizes.iter().sum::<usize>(), PROLOGUE_64.len());
}

#[test]
fn instruction_iterator_stops_at_end_and_fuses() {
    let mut decoder = X86Decoder::new(PROLOGUE_64, Architecture::X86_64);
    let mnemonics: Vec<String> = decoder
        .instructions()
        .map(|insn| insn.unwrap().mnemonic)
        .collect();
    assert_eq!(mnemonics, ["push", "mov", "sub", "mov", "leave", "ret"]);

    // Stops after the first invalid instruction
    let code = [0x90, 0x06, 0x90];
    let mut decoder = X86Decoder::new(&code, Architecture::X86_64);
    let mut iter = decoder.instructions();
    assert!(iter.next().unwrap().is_ok());
    assert!(iter.next().unwrap().is_err());
    assert!(iter.next().is_none());
}

#[test]
fn truncated_fields_fail_without_reading_past_the_end() {
    let decoder = X86Decoder::detached(Architecture::X86_64);
    let full = [0x48, 0x8b, 0x84, 0x24, 0x00, 0x01, 0x00, 0x00]; // mov rax, [rsp + 0x100]
    assert!(decoder.decode_at(&full, 0).is_ok());
    for len in 0..full.len() {
        let err = decoder.decode_at(&full[..len], 0).unwrap_err();
        match len {
            0 => assert!(err.is_end_of_buffer()),
            _ => assert!(matches!(err, DecodeError::Truncated { available, .. } if available == len)),
        }
    }

    // Immediate cut short
    let err = decoder.decode_at(&[0x48, 0x81, 0xc4, 0x00, 0x01], 0).unwrap_err();
    assert_eq!(err, DecodeError::truncated(0, 7, 5));
}

#[test]
fn decode_at_is_independent_of_bound_state() {
    let mut decoder = X86Decoder::new(PROLOGUE_64, Architecture::X86_64);
    decoder.decode().unwrap();
    let position = decoder.position();

    let other = [0xe8, 0x10, 0x00, 0x00, 0x00];
    let call = decoder.decode_at(&other, 0x40_0000).unwrap();
    assert_eq!(call.address, 0x40_0000);
    assert!(matches!(call.control_flow, ControlFlow::Call { target: 0x40_0015, .. }));
    assert_eq!(decoder.position(), position);

    // The cursor picks up where it left off
    assert_eq!(decoder.decode().unwrap().mnemonic, "mov");
}

#[test]
fn deferred_skeleton_knows_kinds_before_completion() {
    let decoder = X86Decoder::detached(Architecture::X86_64);
    let insn = decoder.decode_at(&[0x48, 0x83, 0x7d, 0xf0, 0x0a], 0).unwrap();
    assert!(insn.operands().is_none());
    assert!(insn.read_set().is_empty());
    assert_eq!(
        insn.operand_kinds(),
        vec![OperandKind::Memory, OperandKind::Immediate]
    );

    let insn = completed(&decoder, insn);
    assert!(insn
        .to_string()
        .ends_with("cmp qword ptr [rbp - 0x10], 0xa"));
    assert_eq!(insn.read_set(), vec![Register::gpr(x86::RBP, 64)]);
    assert!(insn.write_set().is_empty());
}

#[test]
fn eager_config_and_base_address() {
    let config = DecoderConfig::new(Architecture::X86_64)
        .with_base_address(0x40_1000)
        .eager();
    let mut decoder = X86Decoder::with_config(PROLOGUE_64, config);
    let first = decoder.decode().unwrap();
    assert!(first.is_complete());
    assert_eq!(first.address, 0x40_1000);
    assert_eq!(decoder.decode().unwrap().address, 0x40_1001);
    assert_eq!(decoder.current_address(), 0x40_1004);
}

#[test]
fn rebind_resets_cursor() {
    let first = [0x90, 0x90];
    let second = [0xc3];
    let mut decoder = X86Decoder::new(&first, Architecture::X86);
    decoder.decode().unwrap();
    decoder.rebind(&second);
    assert_eq!(decoder.position(), 0);
    assert_eq!(decoder.decode().unwrap().mnemonic, "ret");
}

#[test]
fn variant_set_dispatches_by_architecture() {
    let mut decoder = make_decoder(Architecture::X86_64, Some(PROLOGUE_64));
    assert_eq!(decoder.max_instruction_size(), 15);
    assert!(!decoder.is_fixed_width());
    let results = decoder.disassemble_block(PROLOGUE_64, 0);
    assert!(results.iter().all(Result::is_ok));
    assert_eq!(results.len(), 6);
    assert_eq!(decoder.decode().unwrap().mnemonic, "push");
}
