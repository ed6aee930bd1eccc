//! Module for loading the daemon configuration from a yaml file.
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::log_writer::LogWriterParameters;
use crate::server::ServerParameters;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read the configuration file '{}': {}", .path.display(), .source)]
    Read { path: PathBuf, source: io::Error },
    #[error("cannot deserialize the configuration: {0}")]
    Parse(#[from] serde_yaml::Error),
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Configuration {
    #[serde(default)]
    pub server_parameters: ServerParameters,
    #[serde(default)]
    pub log_writer_parameters: LogWriterParameters,
}

impl Configuration {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Configuration, ConfigError> {
        let path = path.as_ref();
        let read_error = |source| ConfigError::Read { path: path.to_path_buf(), source };

        let mut configuration_string = String::new();
        File::open(path)
            .and_then(|mut file| file.read_to_string(&mut configuration_string))
            .map_err(read_error)?;

        Configuration::from_yaml(&configuration_string)
    }

    pub fn from_yaml(yaml: &str) -> Result<Configuration, ConfigError> {
        Ok(serde_yaml::from_str::<Configuration>(yaml)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    use crate::log_writer::DEFAULT_HEADER;

    #[test]
    fn reads_full_configuration() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "server_parameters:\n  address: 192.168.11.5\n  port: 5001\n\
             log_writer_parameters:\n  directory: /var/lib/sensorlogd\n  basename: co2.csv\n\
             \x20 header: a,b,c\n  sync_on_append: false\n"
        )
        .unwrap();

        let configuration = Configuration::from_file(file.path()).unwrap();

        assert_eq!(
            configuration.server_parameters,
            ServerParameters { address: String::from("192.168.11.5"), port: 5001 }
        );
        assert_eq!(
            configuration.log_writer_parameters.directory,
            PathBuf::from("/var/lib/sensorlogd")
        );
        assert_eq!(configuration.log_writer_parameters.basename, "co2.csv");
        assert_eq!(configuration.log_writer_parameters.header, "a,b,c");
        assert!(!configuration.log_writer_parameters.sync_on_append);
    }

    #[test]
    fn missing_fields_use_defaults() {
        let configuration = Configuration::from_yaml("server_parameters:\n  port: 8080\n").unwrap();

        assert_eq!(configuration.server_parameters.address, "0.0.0.0");
        assert_eq!(configuration.server_parameters.port, 8080);
        assert_eq!(
            configuration.log_writer_parameters.directory,
            PathBuf::from("methane_data_arduino")
        );
        assert_eq!(configuration.log_writer_parameters.basename, "methane_data_log.csv");
        assert_eq!(configuration.log_writer_parameters.header, DEFAULT_HEADER);
        assert!(configuration.log_writer_parameters.sync_on_append);
    }

    #[test]
    fn reports_unreadable_and_invalid_files() {
        let missing = Configuration::from_file("/nonexistent/sensorlogd.yml");
        assert!(matches!(missing, Err(ConfigError::Read { .. })));

        let invalid = Configuration::from_yaml("server_parameters:\n  port: not-a-port\n");
        assert!(matches!(invalid, Err(ConfigError::Parse(_))));
    }
}
