use crate::plugin::{MidiPlugin, PluginError};
use petalo_ports::types::{MidiNote, ProgramIndex, Velocity};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// A call as it arrives over the method channel: a name plus loosely typed arguments.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MethodCall {
    pub method: String,
    #[serde(default)]
    pub arguments: Value,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, arguments: Value) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MethodResponse {
    Ok {
        value: Value,
    },
    Error {
        code: String,
        message: String,
        details: Option<Value>,
    },
    NotImplemented,
}

impl MethodResponse {
    pub fn ok(value: impl Into<Value>) -> Self {
        MethodResponse::Ok {
            value: value.into(),
        }
    }

    pub fn error_code(&self) -> Option<&str> {
        match self {
            MethodResponse::Error { code, .. } => Some(code),
            _ => None,
        }
    }
}

impl From<PluginError> for MethodResponse {
    fn from(err: PluginError) -> Self {
        let details = match &err {
            PluginError::InstrumentLoad(load) => Some(Value::Array(
                load.attempts
                    .iter()
                    .map(|attempt| {
                        json!({
                            "bankMSB": attempt.bank.msb,
                            "bankLSB": attempt.bank.lsb,
                            "reason": attempt.reason.to_string(),
                        })
                    })
                    .collect(),
            )),
            PluginError::OutOfRange(range) => Some(json!({
                "field": range.field,
                "value": range.value,
            })),
            _ => None,
        };
        MethodResponse::Error {
            code: err.code().to_string(),
            message: err.to_string(),
            details,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    LoadSoundfont { data: Vec<u8>, program: ProgramIndex },
    LoadInstrument { program: ProgramIndex },
    PlayMidiNote { note: MidiNote, velocity: Velocity },
    StopMidiNote { note: MidiNote },
    StopAllMidiNotes,
    StartEngine,
    Dispose,
}

impl Command {
    /// Parse a raw call. `Ok(None)` means the method is unknown.
    pub fn parse(call: MethodCall) -> Result<Option<Command>, PluginError> {
        let mut args = match call.arguments {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(PluginError::InvalidArgument(format!(
                    "arguments must be a map, got {}",
                    type_name(&other)
                )))
            }
        };

        let command = match call.method.as_str() {
            "loadSoundfont" => {
                let data = take_bytes(&mut args, "sf2Data")?;
                let program = match take_int(&mut args, "instrumentIndex")? {
                    Some(index) => ProgramIndex::try_from(index)?,
                    None => ProgramIndex::ZERO,
                };
                Command::LoadSoundfont { data, program }
            }
            "loadInstrument" => Command::LoadInstrument {
                program: ProgramIndex::try_from(require_int(&mut args, "instrumentIndex")?)?,
            },
            "playMidiNote" => Command::PlayMidiNote {
                note: MidiNote::try_from(require_int(&mut args, "note")?)?,
                velocity: Velocity::try_from(require_int(&mut args, "velocity")?)?,
            },
            "stopMidiNote" => Command::StopMidiNote {
                note: MidiNote::try_from(require_int(&mut args, "note")?)?,
            },
            "stopAllMidiNotes" => Command::StopAllMidiNotes,
            "startEngine" => Command::StartEngine,
            "dispose" => Command::Dispose,
            _ => return Ok(None),
        };
        Ok(Some(command))
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "map",
    }
}

fn take_bytes(args: &mut Map<String, Value>, key: &str) -> Result<Vec<u8>, PluginError> {
    match args.remove(key) {
        None | Some(Value::Null) => Err(PluginError::InvalidArgument(format!("{key} is required"))),
        Some(value) => serde_json::from_value(value).map_err(|e| {
            PluginError::InvalidArgument(format!("{key} must be a byte array: {e}"))
        }),
    }
}

fn take_int(args: &mut Map<String, Value>, key: &str) -> Result<Option<i64>, PluginError> {
    match args.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n.as_i64().map(Some).ok_or_else(|| {
            PluginError::InvalidArgument(format!("{key} must be an integer, got {n}"))
        }),
        Some(other) => Err(PluginError::InvalidArgument(format!(
            "{key} must be an integer, got {}",
            type_name(&other)
        ))),
    }
}

fn require_int(args: &mut Map<String, Value>, key: &str) -> Result<i64, PluginError> {
    take_int(args, key)?.ok_or_else(|| PluginError::InvalidArgument(format!("{key} is required")))
}

impl MidiPlugin {
    pub fn execute(&self, command: Command) -> Result<Value, PluginError> {
        match command {
            Command::LoadSoundfont { data, program } => {
                self.load_soundfont(&data, program).map(Value::from)
            }
            Command::LoadInstrument { program } => self.load_instrument(program).map(Value::from),
            Command::PlayMidiNote { note, velocity } => {
                self.note_on(note, velocity).map(|()| Value::Null)
            }
            Command::StopMidiNote { note } => self.note_off(note).map(|()| Value::Null),
            Command::StopAllMidiNotes => self.all_notes_off().map(|()| Value::Null),
            Command::StartEngine => self.start().map(|()| Value::Null),
            Command::Dispose => {
                self.dispose();
                Ok(Value::Null)
            }
        }
    }

    /// Method-channel entry point.
    pub fn handle(&self, call: MethodCall) -> MethodResponse {
        let method = call.method.clone();
        let result = Command::parse(call).and_then(|command| match command {
            Some(command) => self.execute(command).map(Some),
            None => Ok(None),
        });

        match result {
            Ok(Some(value)) => MethodResponse::ok(value),
            Ok(None) => {
                tracing::debug!(%method, "method not implemented");
                MethodResponse::NotImplemented
            }
            Err(err) => {
                tracing::debug!(%method, code = err.code(), "method failed: {}", err);
                err.into()
            }
        }
    }
}
