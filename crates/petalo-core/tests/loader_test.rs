mod common;

use common::RecordingSampler;
use petalo_core::resolve_instrument;
use petalo_ports::sampler::SamplerError;
use petalo_ports::types::{BankAddress, InstrumentAddress, ProgramIndex, SoundbankFormat};
use pretty_assertions::assert_eq;
use std::path::Path;

fn program(value: i64) -> ProgramIndex {
    ProgramIndex::try_from(value).unwrap()
}

#[test]
fn gm_bank_wins_without_trying_custom_bank() {
    let sampler = RecordingSampler::resolving(&[121, 0]);
    let resolved = resolve_instrument(
        sampler.as_ref(),
        Path::new("bank.sf2"),
        SoundbankFormat::Sf2,
        program(3),
        &BankAddress::default_fallback(),
    )
    .unwrap();

    assert_eq!(resolved.info.address.bank, BankAddress::GM_MELODIC);
    assert!(resolved.skipped.is_empty());
    assert_eq!(sampler.load_attempts().len(), 1);
}

#[test]
fn custom_bank_is_tried_after_gm_bank_fails() {
    let sampler = RecordingSampler::resolving(&[0]);
    let resolved = resolve_instrument(
        sampler.as_ref(),
        Path::new("bank.sf2"),
        SoundbankFormat::Sf2,
        program(5),
        &BankAddress::default_fallback(),
    )
    .unwrap();

    assert_eq!(
        sampler.load_attempts(),
        vec![
            InstrumentAddress {
                program: program(5),
                bank: BankAddress::GM_MELODIC
            },
            InstrumentAddress {
                program: program(5),
                bank: BankAddress::CUSTOM
            },
        ]
    );
    assert_eq!(resolved.info.address.bank, BankAddress::CUSTOM);
    assert_eq!(resolved.skipped.len(), 1);
    assert_eq!(resolved.skipped[0].bank, BankAddress::GM_MELODIC);
}

#[test]
fn exhausted_search_keeps_every_failure() {
    let sampler = RecordingSampler::resolving(&[]);
    let err = resolve_instrument(
        sampler.as_ref(),
        Path::new("bank.sf2"),
        SoundbankFormat::Sf2,
        program(7),
        &BankAddress::default_fallback(),
    )
    .unwrap_err();

    assert_eq!(err.program, program(7));
    let banks: Vec<BankAddress> = err.attempts.iter().map(|a| a.bank).collect();
    assert_eq!(banks, vec![BankAddress::GM_MELODIC, BankAddress::CUSTOM]);
    assert_eq!(
        err.attempts[1].reason,
        SamplerError::InstrumentNotFound(InstrumentAddress {
            program: program(7),
            bank: BankAddress::CUSTOM
        })
    );
    let message = err.to_string();
    assert!(message.contains("msb 121 lsb 0"), "{message}");
    assert!(message.contains("msb 0 lsb 0"), "{message}");
}

#[test]
fn custom_candidate_order_is_respected() {
    let sampler = RecordingSampler::resolving(&[0, 8]);
    let candidates = [BankAddress { msb: 8, lsb: 0 }, BankAddress::CUSTOM];
    let resolved = resolve_instrument(
        sampler.as_ref(),
        Path::new("bank.sf2"),
        SoundbankFormat::Sf2,
        program(0),
        &candidates,
    )
    .unwrap();
    assert_eq!(resolved.info.address.bank.msb, 8);
}

#[test]
fn empty_candidate_list_fails_cleanly() {
    let sampler = RecordingSampler::resolving(&[0]);
    let err = resolve_instrument(
        sampler.as_ref(),
        Path::new("bank.sf2"),
        SoundbankFormat::Sf2,
        program(0),
        &[],
    )
    .unwrap_err();
    assert!(err.attempts.is_empty());
    assert!(sampler.load_attempts().is_empty());
}
