//! RGB LED on three sysfs PWM channels.

use crate::config::LedConfig;
use crate::devices::LedCapability;
use crate::error::{BuddyError, Result};
use std::fs;
use std::path::{Path, PathBuf};

const SYSFS_PWM: &str = "/sys/class/pwm";

#[derive(Debug)]
struct Channel {
    dir: PathBuf,
    brightness: f32,
}

impl Channel {
    fn write(&self, attribute: &str, value: impl ToString) -> Result<()> {
        let path = self.dir.join(attribute);
        fs::write(&path, value.to_string()).map_err(|e| BuddyError::Device {
            device: "led".to_string(),
            message: format!("{}: {}", path.display(), e),
        })
    }
}

/// Three PWM channels driven through sysfs. Channels are switched off and
/// disabled on drop.
#[derive(Debug)]
pub struct PwmLed {
    channels: [Channel; 3],
    period_ns: u64,
}

impl PwmLed {
    pub fn open(config: &LedConfig) -> Result<Self> {
        Self::open_at(Path::new(SYSFS_PWM), config)
    }

    /// Open against a sysfs PWM class directory rooted at `root`.
    pub fn open_at(root: &Path, config: &LedConfig) -> Result<Self> {
        let chip = root.join(format!("pwmchip{}", config.pwm_chip));
        let brightness = &config.brightness;
        let channels = [
            (config.red_channel, brightness.red),
            (config.green_channel, brightness.green),
            (config.blue_channel, brightness.blue),
        ]
        .map(|(index, brightness)| Channel {
            dir: chip.join(format!("pwm{}", index)),
            brightness,
        });

        for (channel, index) in channels.iter().zip([
            config.red_channel,
            config.green_channel,
            config.blue_channel,
        ]) {
            export(&chip, &channel.dir, index)?;
            channel.write("period", config.period_ns)?;
            channel.write("duty_cycle", 0)?;
            channel.write("enable", 1)?;
        }

        tracing::info!(chip = %chip.display(), period_ns = config.period_ns, "LED ready");
        Ok(Self {
            channels,
            period_ns: config.period_ns,
        })
    }

    fn duty(&self, value: u8, brightness: f32) -> u64 {
        let scale = f64::from(value) / 255.0 * f64::from(brightness.clamp(0.0, 1.0));
        (self.period_ns as f64 * scale).round() as u64
    }
}

fn export(chip: &Path, dir: &Path, index: u32) -> Result<()> {
    if dir.exists() {
        return Ok(());
    }
    fs::write(chip.join("export"), index.to_string()).map_err(|e| BuddyError::Device {
        device: "led".to_string(),
        message: format!("cannot export pwm{} on {}: {}", index, chip.display(), e),
    })?;
    if !dir.exists() {
        return Err(BuddyError::Device {
            device: "led".to_string(),
            message: format!("{} did not appear after export", dir.display()),
        });
    }
    Ok(())
}

impl LedCapability for PwmLed {
    fn set(&mut self, r: u8, g: u8, b: u8) -> Result<()> {
        for (channel, value) in self.channels.iter().zip([r, g, b]) {
            channel.write("duty_cycle", self.duty(value, channel.brightness))?;
        }
        tracing::debug!(r, g, b, "LED set");
        Ok(())
    }
}

impl Drop for PwmLed {
    fn drop(&mut self) {
        for channel in &self.channels {
            if let Err(e) = channel
                .write("duty_cycle", 0)
                .and_then(|()| channel.write("enable", 0))
            {
                tracing::warn!(error = %e, "failed to switch LED channel off");
            }
        }
    }
}
