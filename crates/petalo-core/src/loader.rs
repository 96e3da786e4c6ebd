use petalo_ports::sampler::{InstrumentInfo, SamplerError, SamplerPort};
use petalo_ports::types::{BankAddress, InstrumentAddress, ProgramIndex, SoundbankFormat};
use std::fmt;
use std::path::Path;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttemptFailure {
    pub bank: BankAddress,
    pub reason: SamplerError,
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.bank, self.reason)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("no instrument loaded for program {program} ({})", describe(.attempts))]
pub struct InstrumentLoadError {
    pub program: ProgramIndex,
    /// Every failed candidate, in the order it was tried.
    pub attempts: Vec<AttemptFailure>,
}

fn describe(attempts: &[AttemptFailure]) -> String {
    if attempts.is_empty() {
        return "no bank candidates".to_string();
    }
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedInstrument {
    pub info: InstrumentInfo,
    /// Candidates that failed before the winning one.
    pub skipped: Vec<AttemptFailure>,
}

/// Try each bank candidate in order until the sampler accepts one.
pub fn resolve_instrument(
    sampler: &dyn SamplerPort,
    path: &Path,
    format: SoundbankFormat,
    program: ProgramIndex,
    candidates: &[BankAddress],
) -> Result<ResolvedInstrument, InstrumentLoadError> {
    let mut attempts = Vec::with_capacity(candidates.len());

    for &bank in candidates {
        let address = InstrumentAddress { program, bank };
        match sampler.load_instrument(path, format, address) {
            Ok(info) => {
                tracing::info!(%address, instrument = %info.name, "soundbank instrument loaded");
                return Ok(ResolvedInstrument {
                    info,
                    skipped: attempts,
                });
            }
            Err(reason) => {
                tracing::debug!(%address, "bank candidate failed: {}", reason);
                attempts.push(AttemptFailure { bank, reason });
            }
        }
    }

    let err = InstrumentLoadError { program, attempts };
    tracing::warn!("{}", err);
    Err(err)
}
