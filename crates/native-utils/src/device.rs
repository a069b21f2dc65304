use anyhow::Context;
use cpal::Device;
use cpal::traits::{DeviceTrait, HostTrait};

fn get_host() -> cpal::Host {
    cpal::default_host()
}

/// Finds the input device called `device_name`, or the host's default input
/// device when no name is given.
pub fn get_or_default_input(device_name: Option<&str>) -> anyhow::Result<Device> {
    let host = get_host();
    tracing::debug!("Host: {:?}", host.id());

    let Some(target) = device_name else {
        return host
            .default_input_device()
            .context("No default input device");
    };

    host.input_devices()
        .context("Failed to enumerate input devices")?
        .find(|device| device.name().is_ok_and(|name| name == target))
        .with_context(|| format!("No input device named '{target}'"))
}

/// One line per input device: name, channel count, sample rate, and a
/// `[default]` marker on the host's default device.
pub fn list_inputs() -> anyhow::Result<Vec<String>> {
    for host in cpal::available_hosts() {
        tracing::debug!("Available host: {:?}", host);
    }

    let host = get_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());

    let mut lines = Vec::new();
    for device in host
        .input_devices()
        .context("Failed to enumerate input devices")?
    {
        let Ok(name) = device.name() else {
            continue;
        };
        let mut line = match device.default_input_config() {
            Ok(cfg) => format!(" * {}({}ch, {}hz)", name, cfg.channels(), cfg.sample_rate().0),
            Err(e) => {
                tracing::debug!("No default config for {}: {}", name, e);
                format!(" * {name}")
            }
        };
        if default_name.as_deref() == Some(name.as_str()) {
            line.push_str(" [default]");
        }
        lines.push(line);
    }
    Ok(lines)
}
