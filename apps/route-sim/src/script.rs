//! Line-oriented command script driving the simulated host.

use thiserror::Error;
use webrtc_audio_route::{AudioDeviceKind, FocusChange};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ScriptError {
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Missing argument for {0}")]
    MissingArgument(&'static str),

    #[error("Invalid argument for {command}: {value}")]
    InvalidArgument { command: &'static str, value: String },
}

/// Commands understood by the simulator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    Speaker(bool),
    /// Attach a wired headset and broadcast the plug
    Plug,
    /// Detach wired headsets and broadcast the unplug
    Unplug,
    Attach { kind: AudioDeviceKind, name: String },
    Detach(u32),
    /// Deliver a raw broadcast action to hardware listeners
    Broadcast(String),
    Focus(FocusChange),
    AdmCreate,
    AdmDeviceChange,
    AdmRecord(bool),
    AdmRelease,
    Status,
    /// Wait for in-flight broadcasts to be delivered
    Wait,
}

fn parse_on_off(command: &'static str, value: Option<&str>) -> Result<bool, ScriptError> {
    match value {
        Some("on") | Some("true") => Ok(true),
        Some("off") | Some("false") => Ok(false),
        Some(other) => Err(ScriptError::InvalidArgument {
            command,
            value: other.to_string(),
        }),
        None => Err(ScriptError::MissingArgument(command)),
    }
}

fn parse_kind(value: &str) -> Option<AudioDeviceKind> {
    if let Ok(raw) = value.parse::<i32>() {
        return Some(AudioDeviceKind::from_raw(raw));
    }
    let kind = match value {
        "earpiece" => AudioDeviceKind::BuiltinEarpiece,
        "speaker" => AudioDeviceKind::BuiltinSpeaker,
        "mic" => AudioDeviceKind::BuiltinMic,
        "wired_headset" | "headset" => AudioDeviceKind::WiredHeadset,
        "wired_headphones" | "headphones" => AudioDeviceKind::WiredHeadphones,
        "bluetooth_sco" | "sco" => AudioDeviceKind::BluetoothSco,
        "bluetooth_a2dp" | "a2dp" => AudioDeviceKind::BluetoothA2dp,
        "usb_device" => AudioDeviceKind::UsbDevice,
        "usb_headset" => AudioDeviceKind::UsbHeadset,
        _ => return None,
    };
    Some(kind)
}

fn parse_focus(value: &str) -> Option<FocusChange> {
    match value {
        "gain" => Some(FocusChange::Gain),
        "loss" => Some(FocusChange::Loss),
        "loss_transient" => Some(FocusChange::LossTransient),
        "loss_transient_can_duck" | "duck" => Some(FocusChange::LossTransientCanDuck),
        _ => None,
    }
}

/// Parse one script line. Blank lines and `#` comments yield `None`.
pub fn parse_line(line: &str) -> Result<Option<Command>, ScriptError> {
    let line = line.split('#').next().unwrap_or("").trim();
    if line.is_empty() {
        return Ok(None);
    }

    let mut words = line.split_whitespace();
    let head = words.next().unwrap_or_default().to_ascii_lowercase();

    let command = match head.as_str() {
        "start" => Command::Start,
        "stop" => Command::Stop,
        "speaker" => Command::Speaker(parse_on_off("speaker", words.next())?),
        "plug" => Command::Plug,
        "unplug" => Command::Unplug,
        "attach" => {
            let value = words.next().ok_or(ScriptError::MissingArgument("attach"))?;
            let kind = parse_kind(value).ok_or_else(|| ScriptError::InvalidArgument {
                command: "attach",
                value: value.to_string(),
            })?;
            let name: Vec<&str> = words.collect();
            let name = if name.is_empty() {
                kind.as_str().to_string()
            } else {
                name.join(" ")
            };
            Command::Attach { kind, name }
        }
        "detach" => {
            let value = words.next().ok_or(ScriptError::MissingArgument("detach"))?;
            let id = value.parse().map_err(|_| ScriptError::InvalidArgument {
                command: "detach",
                value: value.to_string(),
            })?;
            Command::Detach(id)
        }
        "broadcast" => {
            let action = words.next().ok_or(ScriptError::MissingArgument("broadcast"))?;
            Command::Broadcast(action.to_string())
        }
        "focus" => {
            let value = words.next().ok_or(ScriptError::MissingArgument("focus"))?;
            let change = parse_focus(value).ok_or_else(|| ScriptError::InvalidArgument {
                command: "focus",
                value: value.to_string(),
            })?;
            Command::Focus(change)
        }
        "adm" => match words.next() {
            Some("create") => Command::AdmCreate,
            Some("change") => Command::AdmDeviceChange,
            Some("record") => Command::AdmRecord(match words.next() {
                Some("start") => true,
                Some("stop") => false,
                Some(other) => {
                    return Err(ScriptError::InvalidArgument {
                        command: "adm record",
                        value: other.to_string(),
                    })
                }
                None => return Err(ScriptError::MissingArgument("adm record")),
            }),
            Some("release") => Command::AdmRelease,
            Some(other) => {
                return Err(ScriptError::InvalidArgument {
                    command: "adm",
                    value: other.to_string(),
                })
            }
            None => return Err(ScriptError::MissingArgument("adm")),
        },
        "status" => Command::Status,
        "wait" => Command::Wait,
        other => return Err(ScriptError::UnknownCommand(other.to_string())),
    };

    Ok(Some(command))
}
