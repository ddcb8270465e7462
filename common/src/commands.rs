// Command registry: name-to-handler dispatch table for title commands

use crate::config::DeviceTargets;
use crate::errors::ExecutionError;
use crate::models::DeviceCommand;
use std::collections::HashMap;
use std::sync::Arc;

/// Dimmer level applied by `light_on`.
const LIGHT_ON_DIMMER: u8 = 254;
/// Warm-white hex color applied by `light_on`.
const LIGHT_ON_HEX_COLOR: &str = "f2eccf";
/// Color temperature in mireds applied by `light_on`.
const LIGHT_ON_COLOR_TEMP: u16 = 337;
/// Fade duration in seconds when `light_fade` omits the delay argument.
const DEFAULT_FADE_SECS: u32 = 5;

/// Accepted positional-argument count range for a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arity {
    pub min: usize,
    pub max: usize,
}

impl Arity {
    pub const fn exact(n: usize) -> Self {
        Self { min: n, max: n }
    }

    pub const fn range(min: usize, max: usize) -> Self {
        Self { min, max }
    }

    pub fn accepts(&self, n: usize) -> bool {
        n >= self.min && n <= self.max
    }

    /// Human-readable form for error messages, e.g. "1" or "1..=2".
    pub fn describe(&self) -> String {
        if self.min == self.max {
            self.min.to_string()
        } else {
            format!("{}..={}", self.min, self.max)
        }
    }
}

/// A named command that turns raw title arguments into a device-command
/// batch. Handlers are pure builders; the executor owns the gateway I/O.
pub trait CommandHandler: Send + Sync {
    fn name(&self) -> &'static str;

    fn arity(&self) -> Arity;

    /// Build the ordered device-command batch for this invocation.
    ///
    /// Called only after the arity check passed; argument conversion and
    /// range validation happen here.
    fn build(&self, args: &[String]) -> Result<Vec<DeviceCommand>, ExecutionError>;
}

/// Name-to-handler table. Immutable after construction: every handler is
/// registered at process start.
pub struct CommandRegistry {
    handlers: HashMap<&'static str, Arc<dyn CommandHandler>>,
}

impl CommandRegistry {
    /// Build a registry holding the built-in command set, bound to the
    /// configured device targets.
    pub fn with_builtins(targets: &DeviceTargets) -> Self {
        let mut registry = Self {
            handlers: HashMap::new(),
        };
        registry.register(Arc::new(SetBlinds {
            left: targets.blind_left.clone(),
            right: targets.blind_right.clone(),
        }));
        registry.register(Arc::new(LightOn {
            light: targets.light.clone(),
        }));
        registry.register(Arc::new(LightOff {
            light: targets.light.clone(),
        }));
        registry.register(Arc::new(LightFade {
            light: targets.light.clone(),
        }));
        registry
    }

    fn register(&mut self, handler: Arc<dyn CommandHandler>) {
        self.handlers.insert(handler.name(), handler);
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<dyn CommandHandler>> {
        self.handlers.get(name).cloned()
    }

    pub fn command_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.handlers.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

/// Parse one positional argument as an integer within an inclusive range.
fn parse_int_arg(
    command: &str,
    value: &str,
    min: u32,
    max: u32,
) -> Result<u32, ExecutionError> {
    let parsed: u32 = value
        .parse()
        .map_err(|_| ExecutionError::InvalidArgument {
            command: command.to_string(),
            value: value.to_string(),
            reason: "not an integer".to_string(),
        })?;
    if parsed < min || parsed > max {
        return Err(ExecutionError::InvalidArgument {
            command: command.to_string(),
            value: value.to_string(),
            reason: format!("expected a value in {}..={}", min, max),
        });
    }
    Ok(parsed)
}

/// `set_blinds <target>` — drives both configured blind devices to the same
/// position in a single batch.
struct SetBlinds {
    left: String,
    right: String,
}

impl CommandHandler for SetBlinds {
    fn name(&self) -> &'static str {
        "set_blinds"
    }

    fn arity(&self) -> Arity {
        Arity::exact(1)
    }

    fn build(&self, args: &[String]) -> Result<Vec<DeviceCommand>, ExecutionError> {
        let position = parse_int_arg(self.name(), &args[0], 0, 100)? as u8;
        Ok(vec![
            DeviceCommand::SetBlindPosition {
                device: self.left.clone(),
                position,
            },
            DeviceCommand::SetBlindPosition {
                device: self.right.clone(),
                position,
            },
        ])
    }
}

/// `light_on` — power on with fixed brightness and color defaults.
struct LightOn {
    light: String,
}

impl CommandHandler for LightOn {
    fn name(&self) -> &'static str {
        "light_on"
    }

    fn arity(&self) -> Arity {
        Arity::exact(0)
    }

    fn build(&self, _args: &[String]) -> Result<Vec<DeviceCommand>, ExecutionError> {
        Ok(vec![
            DeviceCommand::SetLightPower {
                device: self.light.clone(),
                on: true,
            },
            DeviceCommand::SetBrightness {
                device: self.light.clone(),
                level: LIGHT_ON_DIMMER,
                transition_secs: None,
            },
            DeviceCommand::SetHexColor {
                device: self.light.clone(),
                hex: LIGHT_ON_HEX_COLOR.to_string(),
            },
            DeviceCommand::SetColorTemperature {
                device: self.light.clone(),
                mireds: LIGHT_ON_COLOR_TEMP,
            },
        ])
    }
}

/// `light_off` — power off.
struct LightOff {
    light: String,
}

impl CommandHandler for LightOff {
    fn name(&self) -> &'static str {
        "light_off"
    }

    fn arity(&self) -> Arity {
        Arity::exact(0)
    }

    fn build(&self, _args: &[String]) -> Result<Vec<DeviceCommand>, ExecutionError> {
        Ok(vec![DeviceCommand::SetLightPower {
            device: self.light.clone(),
            on: false,
        }])
    }
}

/// `light_fade <target> [delay]` — one device-native brightness transition
/// over `delay` seconds (default 5).
struct LightFade {
    light: String,
}

impl CommandHandler for LightFade {
    fn name(&self) -> &'static str {
        "light_fade"
    }

    fn arity(&self) -> Arity {
        Arity::range(1, 2)
    }

    fn build(&self, args: &[String]) -> Result<Vec<DeviceCommand>, ExecutionError> {
        let level = parse_int_arg(self.name(), &args[0], 0, 254)? as u8;
        let delay = match args.get(1) {
            Some(raw) => parse_int_arg(self.name(), raw, 1, 3600)?,
            None => DEFAULT_FADE_SECS,
        };
        Ok(vec![DeviceCommand::SetBrightness {
            device: self.light.clone(),
            level,
            transition_secs: Some(delay),
        }])
    }
}
