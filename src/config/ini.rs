//! INI loading for [`HecConfigBuilder`].
//!
//! Keys carry the same names as the builder settings, e.g.
//!
//! ```ini
//! [splunkhec]
//! host = splunk.example.com
//! protocol = https
//! token = BAB747F3-744E-41BA
//! send_batched_events = true
//! ```

use std::{fs, path::Path};

use encoding_rs::UTF_8;
use ini::{Ini, ParseOption};

use super::{ConfigError, HecConfigBuilder};

impl HecConfigBuilder {
    /// Load settings from `section` of the INI file at `path`.
    pub fn from_ini_file(path: impl AsRef<Path>, section: &str) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let (text, _, had_errors) = UTF_8.decode(&bytes);
        if had_errors {
            return Err(ConfigError::InvalidConfig(format!(
                "{} is not valid UTF-8",
                path.display()
            )));
        }
        Self::from_ini_str(&text, section)
    }

    /// Load settings from `section` of INI-formatted `text`.
    pub fn from_ini_str(text: &str, section: &str) -> Result<Self, ConfigError> {
        // Quotes and backslashes are literal so that `${record['key']}`
        // patterns reach the template parser untouched.
        let opt = ParseOption {
            enabled_quote: false,
            enabled_escape: false,
            ..ParseOption::default()
        };
        let ini = Ini::load_from_str_opt(text, opt)
            .map_err(|err| ConfigError::InvalidConfig(format!("invalid INI: {err}")))?;
        let props = ini.section(Some(section)).ok_or_else(|| {
            ConfigError::InvalidConfig(format!("missing [{section}] section"))
        })?;
        props
            .iter()
            .try_fold(Self::new(), |builder, (key, value)| builder.apply(key, value))
    }

    fn apply(self, key: &str, value: &str) -> Result<Self, ConfigError> {
        let flag = || parse_bool(key, value);
        let millis = || {
            value.trim().parse::<u64>().map_err(|_| {
                ConfigError::InvalidConfig(format!("{key} must be a number of milliseconds"))
            })
        };
        Ok(match key {
            "host" => self.with_host(value),
            "protocol" => self.with_protocol(value),
            "port" => self.with_port(value),
            "token" => self.with_token(value),
            "index" => self.with_index(value),
            "event_host" => self.with_event_host(value),
            "source" => self.with_source(value),
            "sourcetype" => self.with_sourcetype(value),
            "send_event_as_json" => self.with_send_event_as_json(flag()?),
            "usejson" => self.with_usejson(flag()?),
            "send_batched_events" => self.with_send_batched_events(flag()?),
            "dynamic_index" => self.with_dynamic_index(flag()?),
            "dynamic_index_pattern" => self.with_dynamic_index_pattern(value),
            "connect_timeout_ms" => self.with_connect_timeout_ms(millis()?),
            "write_timeout_ms" => self.with_write_timeout_ms(millis()?),
            "insecure_skip_verify" => self.with_insecure_skip_verify(flag()?),
            _ => {
                return Err(ConfigError::InvalidConfig(format!(
                    "unknown setting '{key}'"
                )));
            }
        })
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(ConfigError::InvalidConfig(format!(
            "{key} expects a boolean, got '{value}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EventFormat, IndexSelector, Protocol, SourcetypeSelector};
    use rstest::rstest;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = "\
[splunkhec]
host = splunk.example.com
protocol = https
port = 8443
token = BAB747F3-744E-41BA
source = fluentd
index = main
event_host = some_host
sourcetype = log
usejson = yes
send_event_as_json = true
send_batched_events = on
";

    #[rstest]
    fn maps_every_key_onto_the_builder() {
        let config = HecConfigBuilder::from_ini_str(SAMPLE, "splunkhec")
            .expect("load")
            .build()
            .expect("build");
        assert_eq!(config.host, "splunk.example.com");
        assert_eq!(config.protocol, Protocol::Https);
        assert_eq!(config.port, 8443);
        assert_eq!(config.token, "BAB747F3-744E-41BA");
        assert_eq!(config.index, IndexSelector::Static("main".into()));
        assert_eq!(config.event_host, "some_host");
        assert_eq!(config.sourcetype, SourcetypeSelector::Static("log".into()));
        assert_eq!(config.format, EventFormat::JsonObject);
        assert!(config.send_batched_events);
    }

    #[rstest]
    fn dynamic_pattern_survives_ini_quoting() {
        let text = "[splunkhec]\ntoken = t\ndynamic_index = true\n\
                    dynamic_index_pattern = prefix_${source}_${record['kubernetes']['pod_name']}\n";
        let config = HecConfigBuilder::from_ini_str(text, "splunkhec")
            .expect("load")
            .build()
            .expect("build");
        let IndexSelector::Dynamic(template) = config.index else {
            panic!("expected dynamic index");
        };
        assert_eq!(
            template.to_string(),
            "prefix_${source}_${record['kubernetes']['pod_name']}"
        );
    }

    #[rstest]
    #[case("[splunkhec]\ntoken = t\ncolour = blue\n", "unknown setting 'colour'")]
    #[case("[splunkhec]\ntoken = t\nusejson = maybe\n", "usejson expects a boolean")]
    #[case("[other]\ntoken = t\n", "missing [splunkhec] section")]
    fn rejects_invalid_files(#[case] text: &str, #[case] expected: &str) {
        let err = HecConfigBuilder::from_ini_str(text, "splunkhec").expect_err("must fail");
        assert!(err.to_string().contains(expected), "{err}");
    }

    #[rstest]
    fn reads_from_disk() {
        let mut file = NamedTempFile::new().expect("create temp ini file");
        file.write_all(b"\xEF\xBB\xBF[splunkhec]\ntoken = from_disk\n")
            .expect("write ini contents");
        let config = HecConfigBuilder::from_ini_file(file.path(), "splunkhec")
            .expect("load")
            .build()
            .expect("build");
        assert_eq!(config.token, "from_disk");
    }

    #[rstest]
    fn rejects_invalid_utf8_files() {
        let mut file = NamedTempFile::new().expect("create temp ini file");
        file.write_all(b"[splunkhec]\ntoken = \xFF\n")
            .expect("write ini contents");
        assert!(matches!(
            HecConfigBuilder::from_ini_file(file.path(), "splunkhec"),
            Err(ConfigError::InvalidConfig(_))
        ));
    }
}
