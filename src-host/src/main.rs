use clap::Parser;
use petalo_core::{MethodCall, MethodResponse, MidiPlugin};
use petalo_infra_audio_cpal::CpalAudioOutputPort;
use petalo_infra_storage_fs::{FsSoundbankStore, FsStorage};
use petalo_infra_synth_rustysynth::RustySynthSampler;
use petalo_ports::audio::AudioOutputPort;
use petalo_ports::storage::StoragePort;
use petalo_ports::types::ProgramIndex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::error::Error;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(
    version,
    about = "Hosts the Petalo sampler plugin on a JSON-lines method channel (stdin/stdout)."
)]
struct Cli {
    /// Settings file to use instead of the per-user config location.
    #[arg(long)]
    settings: Option<PathBuf>,
    /// SoundFont or DLS file to load before accepting calls.
    #[arg(long)]
    soundfont: Option<PathBuf>,
    /// Program index for --soundfont.
    #[arg(long, default_value_t = 0)]
    program: i64,
    /// Print the available audio outputs as JSON and exit.
    #[arg(long)]
    list_devices: bool,
    /// Do not start the audio engine; useful for exercising the channel without a device.
    #[arg(long)]
    dry_run: bool,
}

#[derive(Deserialize)]
struct Request {
    #[serde(default)]
    id: Option<Value>,
    #[serde(flatten)]
    call: MethodCall,
}

#[derive(Serialize)]
struct Reply {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<Value>,
    #[serde(flatten)]
    response: MethodResponse,
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let storage = match cli.settings.clone() {
        Some(path) => FsStorage::with_settings_path(path),
        None => FsStorage::default(),
    };
    let settings = storage.load_settings().unwrap_or_else(|err| {
        tracing::warn!(path = %storage.settings_path().display(), "using default settings: {}", err);
        Default::default()
    });

    let output = CpalAudioOutputPort::new();
    if cli.list_devices {
        let devices = output.list_outputs()?;
        println!("{}", serde_json::to_string_pretty(&devices)?);
        return Ok(());
    }

    let sampler = Arc::new(RustySynthSampler::new(settings.sample_rate_hz));
    let plugin = MidiPlugin::new(
        Box::new(output),
        sampler,
        Box::new(FsSoundbankStore::from_settings(&settings)),
        &settings,
    );

    if !cli.dry_run {
        // non-fatal: the caller can retry with `startEngine`
        if let Err(err) = plugin.start() {
            tracing::warn!("continuing without audio output: {}", err);
        }
    }

    if let Some(path) = cli.soundfont.as_ref() {
        let bytes = fs::read(path)?;
        let program = ProgramIndex::try_from(cli.program)?;
        match plugin.load_soundfont(&bytes, program) {
            Ok(message) => tracing::info!(path = %path.display(), "{}", message),
            Err(err) => tracing::error!(path = %path.display(), code = err.code(), "{}", err),
        }
    }

    serve(&plugin)?;

    plugin.dispose();
    Ok(())
}

/// Answer one JSON reply per input line until stdin closes.
fn serve(plugin: &MidiPlugin) -> io::Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();

    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let reply = match serde_json::from_str::<Request>(&line) {
            Ok(request) => Reply {
                id: request.id,
                response: plugin.handle(request.call),
            },
            Err(err) => Reply {
                id: None,
                response: MethodResponse::Error {
                    code: "INVALID_ARGUMENT".to_string(),
                    message: format!("malformed request: {err}"),
                    details: None,
                },
            },
        };

        let encoded = serde_json::to_string(&reply).map_err(io::Error::other)?;
        writeln!(stdout, "{}", encoded)?;
        stdout.flush()?;
    }

    tracing::info!("method channel closed");
    Ok(())
}
