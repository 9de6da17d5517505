//! Offline generation of the files the OS image is compiled with.
//!
//! Two artifacts are written side by side:
//! - [`HEADER_FILE`]: one `reg_id_t` constant per device (its base composite
//!   id), then every device's register constants, then every device's
//!   completion constants.
//! - [`CONFIG_FILE`]: the `interrupts` block mapping device names to
//!   callback indices.
//!
//! Constants come from the same codec the reader decodes with. Nothing is
//! rolled back on failure; rerun the generation.

use crate::error::EcuError;
use crate::registry::DeviceRegistry;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

pub const HEADER_FILE: &str = "vp_ipc_devices.h";
pub const CONFIG_FILE: &str = "target.cfg";

pub struct ArtifactGenerator {
    dir: PathBuf,
}

impl ArtifactGenerator {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn header_path(&self) -> PathBuf {
        self.dir.join(HEADER_FILE)
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE)
    }

    /// # Errors
    /// [`EcuError::ArtifactWrite`] naming both paths if either file cannot be
    /// created or written.
    pub fn generate(&self, registry: &DeviceRegistry) -> Result<(), EcuError> {
        let header_path = self.header_path();
        let config_path = self.config_path();
        let fail = |source| EcuError::ArtifactWrite {
            header: header_path.clone(),
            config: config_path.clone(),
            source,
        };

        // Both creations are attempted before reporting.
        let (header, config) = match (File::create(&header_path), File::create(&config_path)) {
            (Ok(h), Ok(c)) => (h, c),
            (Err(e), _) | (_, Err(e)) => return Err(fail(e)),
        };
        let mut header = BufWriter::new(header);
        let mut config = BufWriter::new(config);

        write_artifacts(registry, &mut header, &mut config)
            .and_then(|()| header.flush())
            .and_then(|()| config.flush())
            .map_err(fail)?;

        tracing::info!(
            header = %header_path.display(),
            config = %config_path.display(),
            devices = registry.len(),
            "artifacts generated"
        );
        Ok(())
    }
}

/// Writes both artifacts for `registry` into the given sinks.
pub fn write_artifacts(
    registry: &DeviceRegistry,
    header: &mut dyn Write,
    config: &mut dyn Write,
) -> io::Result<()> {
    writeln!(header, "#ifndef __VP_DEVICES_H__\n#define __VP_DEVICES_H__")?;
    writeln!(header, "\n#include \"ipc/com.h\" /* reg_id_t, dev_id_t */")?;
    writeln!(config, "interrupts {{")?;

    writeln!(header, "\n/* Devices */")?;
    for device in registry.all() {
        writeln!(header, "const reg_id_t {} = {};", device.name(), device.id().base())?;
        writeln!(config, "  {} = {};", device.name(), device.callback_index())?;
    }

    writeln!(header, "\n/* Registers */")?;
    for device in registry.all() {
        device.generate_registers(&mut *header)?;
    }

    writeln!(header, "\n/* Completes registers */")?;
    for device in registry.all() {
        device.generate(&mut *header)?;
    }

    writeln!(header, "\n#endif /* __VP_DEVICES_H__ */")?;
    writeln!(config, "}};")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{Device, RegisterDevice};
    use std::sync::Arc;
    use viper_events::DeviceId;

    fn registry(devices: Vec<RegisterDevice>) -> DeviceRegistry {
        let mut reg = DeviceRegistry::new();
        reg.add(devices.into_iter().map(|d| Arc::new(d) as Arc<dyn Device>));
        reg
    }

    fn render(reg: &DeviceRegistry) -> (String, String) {
        let (mut h, mut c) = (Vec::new(), Vec::new());
        write_artifacts(reg, &mut h, &mut c).expect("write");
        (
            String::from_utf8(h).expect("utf8"),
            String::from_utf8(c).expect("utf8"),
        )
    }

    #[test]
    fn three_devices_produce_base_ids_and_interrupts() {
        let reg = registry(vec![
            RegisterDevice::new(DeviceId(3), "C", 30),
            RegisterDevice::new(DeviceId(1), "A", 10),
            RegisterDevice::new(DeviceId(2), "B", 20),
        ]);
        let (header, config) = render(&reg);

        assert!(header.contains("const reg_id_t A = 0x100000000;\n"));
        assert!(header.contains("const reg_id_t B = 0x200000000;\n"));
        assert!(header.contains("const reg_id_t C = 0x300000000;\n"));
        assert_eq!(config, "interrupts {\n  A = 10;\n  B = 20;\n  C = 30;\n};\n");
    }

    #[test]
    fn header_sections_come_in_three_passes() {
        let reg = registry(vec![
            RegisterDevice::new(DeviceId(1), "LED", 1).with_register("ON", 0),
            RegisterDevice::new(DeviceId(2), "KEY", 2).with_register("DOWN", 2),
        ]);
        let (header, _) = render(&reg);

        let expected = "\
#ifndef __VP_DEVICES_H__
#define __VP_DEVICES_H__

#include \"ipc/com.h\" /* reg_id_t, dev_id_t */

/* Devices */
const reg_id_t LED = 0x100000000;
const reg_id_t KEY = 0x200000000;

/* Registers */
const reg_id_t LED_ON = 0x100000001;
const reg_id_t KEY_DOWN = 0x200000004;

/* Completes registers */
const reg_id_t LED_ALL = 0x100000001;
const reg_id_t KEY_ALL = 0x200000004;

#endif /* __VP_DEVICES_H__ */
";
        assert_eq!(header, expected);
    }

    #[test]
    fn empty_registry_still_yields_valid_files() {
        let (header, config) = render(&DeviceRegistry::new());
        assert!(header.starts_with("#ifndef __VP_DEVICES_H__"));
        assert!(header.ends_with("#endif /* __VP_DEVICES_H__ */\n"));
        assert_eq!(config, "interrupts {\n};\n");
    }

    #[test]
    fn missing_directory_names_both_files() {
        let dir = std::env::temp_dir().join(format!("viper_no_such_dir_{}", std::process::id()));
        let generator = ArtifactGenerator::new(&dir);
        let err = generator.generate(&DeviceRegistry::new()).unwrap_err();
        match err {
            EcuError::ArtifactWrite { header, config, .. } => {
                assert_eq!(header, dir.join(HEADER_FILE));
                assert_eq!(config, dir.join(CONFIG_FILE));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn writes_both_files_to_disk() {
        let dir = std::env::temp_dir().join(format!("viper_gen_{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("mkdir");
        let reg = registry(vec![RegisterDevice::new(DeviceId(1), "A", 10)]);

        ArtifactGenerator::new(&dir).generate(&reg).expect("generate");

        let header = std::fs::read_to_string(dir.join(HEADER_FILE)).expect("header");
        let config = std::fs::read_to_string(dir.join(CONFIG_FILE)).expect("config");
        assert!(header.contains("const reg_id_t A = 0x100000000;"));
        assert_eq!(config, "interrupts {\n  A = 10;\n};\n");

        let _ = std::fs::remove_dir_all(&dir);
    }
}
