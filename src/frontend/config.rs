use crate::errors::{DeclarationError, ExceptionKind};
use crate::infrastructure::logging::{LogConfig, LogFormat, LogOutput};
use crate::runtime::guard::GuardOptions;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::Level;

/// Environment variable consulted when severity is left to the environment
pub const SEVERITY_ENV: &str = "TYPTHON_SEVERITY";

/// File name looked up by `GuardConfig::discover`
pub const CONFIG_FILE: &str = ".typthon-guard.toml";

/// What happens when arguments fail their annotations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// No checking at all
    Disabled = 0,
    /// Raise the configured exception
    Enabled = 1,
    /// Emit a runtime warning and call through
    Warning = 2,
}

impl Severity {
    pub fn from_level(level: i64) -> Option<Self> {
        match level {
            0 => Some(Severity::Disabled),
            1 => Some(Severity::Enabled),
            2 => Some(Severity::Warning),
            _ => None,
        }
    }

    /// Accepts `disable`, `enable`, `warning`, or the numeric level
    pub fn parse(text: &str) -> Result<Self, DeclarationError> {
        let trimmed = text.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "disable" | "disabled" => return Ok(Severity::Disabled),
            "enable" | "enabled" => return Ok(Severity::Enabled),
            "warning" | "warn" => return Ok(Severity::Warning),
            _ => {}
        }
        trimmed
            .parse::<i64>()
            .ok()
            .and_then(Severity::from_level)
            .ok_or_else(|| DeclarationError::InvalidSeverity(text.to_string()))
    }

    pub fn level(self) -> u8 {
        self as u8
    }
}

/// Where a decorated callable gets its severity from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SeverityOption {
    /// Read `TYPTHON_SEVERITY` once, at decoration time
    #[default]
    Env,
    Level(Severity),
}

impl SeverityOption {
    pub fn resolve(self) -> Result<Severity, DeclarationError> {
        self.resolve_with(|key| std::env::var(key).ok())
    }

    /// Resolve using `lookup` in place of the process environment
    pub fn resolve_with<F>(self, lookup: F) -> Result<Severity, DeclarationError>
    where
        F: FnOnce(&str) -> Option<String>,
    {
        match self {
            SeverityOption::Level(level) => Ok(level),
            SeverityOption::Env => match lookup(SEVERITY_ENV) {
                Some(text) if !text.trim().is_empty() => Severity::parse(&text),
                _ => Ok(Severity::Enabled),
            },
        }
    }
}

impl From<Severity> for SeverityOption {
    fn from(level: Severity) -> Self {
        SeverityOption::Level(level)
    }
}

/// Set the process-wide severity read by callables decorated afterwards
pub fn set_severity_level(level: Severity) {
    std::env::set_var(SEVERITY_ENV, level.level().to_string());
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuardConfig {
    #[serde(default)]
    pub guard: GuardSection,

    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardSection {
    /// `disable`, `enable`, `warning` or a level; unset defers to the environment
    #[serde(default)]
    pub severity: Option<String>,

    /// Exception raised on mismatch; `"none"` downgrades failures to warnings
    #[serde(default = "default_exception")]
    pub exception: String,

    /// Cache budget in megabytes, 0 disables the call cache
    #[serde(default = "default_cache_size")]
    pub cache_size: usize,

    #[serde(default)]
    pub allow_duck_typing: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,

    /// Write rotated log files here instead of stderr
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

impl Default for GuardSection {
    fn default() -> Self {
        Self {
            severity: None,
            exception: default_exception(),
            cache_size: default_cache_size(),
            allow_duck_typing: false,
        }
    }
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
            directory: None,
        }
    }
}

fn default_exception() -> String { "TypeMismatch".to_string() }
fn default_cache_size() -> usize { 1 }
fn default_level() -> String { "warn".to_string() }

impl GuardConfig {
    pub fn load(path: &Path) -> Result<Self, DeclarationError> {
        let content = fs::read_to_string(path)
            .map_err(|e| DeclarationError::Config(format!("Failed to read {}: {}", path.display(), e)))?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, DeclarationError> {
        toml::from_str(content)
            .map_err(|e| DeclarationError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Nearest config file from the current directory upwards, or defaults
    pub fn discover() -> Self {
        std::env::current_dir()
            .ok()
            .and_then(|dir| Self::discover_from(&dir))
            .unwrap_or_default()
    }

    pub fn discover_from(start: &Path) -> Option<Self> {
        start
            .ancestors()
            .map(|dir| dir.join(CONFIG_FILE))
            .filter(|path| path.exists())
            .find_map(|path| Self::load(&path).ok())
    }

    pub fn severity(&self) -> Result<SeverityOption, DeclarationError> {
        match &self.guard.severity {
            Some(text) => Ok(SeverityOption::Level(Severity::parse(text)?)),
            None => Ok(SeverityOption::Env),
        }
    }

    /// Decoration options described by the `[guard]` section
    pub fn to_options(&self) -> Result<GuardOptions, DeclarationError> {
        let exception = match self.guard.exception.as_str() {
            "" | "none" => None,
            name => Some(ExceptionKind::parse(name)),
        };
        Ok(GuardOptions::default()
            .severity(self.severity()?)
            .exception(exception)
            .cache_size(self.guard.cache_size)
            .allow_duck_typing(self.guard.allow_duck_typing))
    }

    /// Logging setup described by the `[logging]` section
    pub fn log_config(&self) -> Result<LogConfig, DeclarationError> {
        let level = self
            .logging
            .level
            .parse::<Level>()
            .map_err(|e| DeclarationError::Config(format!("Invalid log level {:?}: {}", self.logging.level, e)))?;
        let mut config = LogConfig::new().with_level(level).with_format(self.logging.format);
        if let Some(directory) = &self.logging.directory {
            config = config.with_output(LogOutput::File {
                directory: directory.to_string_lossy().to_string(),
                prefix: "typthon-guard".to_string(),
            });
        }
        Ok(config)
    }

    pub fn generate_default() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate config"))
    }

    pub fn save(&self, path: &Path) -> Result<(), DeclarationError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| DeclarationError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, content)
            .map_err(|e| DeclarationError::Config(format!("Failed to write config: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_parse() {
        assert_eq!(Severity::parse("warning").unwrap(), Severity::Warning);
        assert_eq!(Severity::parse("Disable").unwrap(), Severity::Disabled);
        assert_eq!(Severity::parse(" 1 ").unwrap(), Severity::Enabled);
        assert!(matches!(
            Severity::parse("loud"),
            Err(DeclarationError::InvalidSeverity(_))
        ));
        assert!(Severity::parse("7").is_err());
    }

    #[test]
    fn test_env_resolution_defaults_to_enabled() {
        let unset = SeverityOption::Env.resolve_with(|_| None).unwrap();
        assert_eq!(unset, Severity::Enabled);

        let warn = SeverityOption::Env.resolve_with(|_| Some("2".to_string())).unwrap();
        assert_eq!(warn, Severity::Warning);

        let explicit = SeverityOption::Level(Severity::Disabled)
            .resolve_with(|_| Some("warning".to_string()))
            .unwrap();
        assert_eq!(explicit, Severity::Disabled);
    }

    #[test]
    fn test_default_config() {
        let config = GuardConfig::default();
        assert_eq!(config.guard.cache_size, 1);
        assert_eq!(config.guard.exception, "TypeMismatch");
        assert!(config.guard.severity.is_none());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[guard]
severity = "warning"
exception = "none"
cache_size = 0
allow_duck_typing = true

[logging]
level = "debug"
format = "json"
"#;
        let config = GuardConfig::parse(toml).unwrap();
        assert_eq!(config.severity().unwrap(), SeverityOption::Level(Severity::Warning));
        assert!(config.guard.allow_duck_typing);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.log_config().unwrap().level, Level::DEBUG);

        let options = config.to_options().unwrap();
        assert!(options.exception_kind().is_none());
        assert_eq!(options.cache_budget(), 0);
    }

    #[test]
    fn test_invalid_severity_in_config() {
        let config = GuardConfig::parse("[guard]\nseverity = \"sometimes\"\n").unwrap();
        assert!(config.to_options().is_err());
    }

    #[test]
    fn test_roundtrip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        let mut config = GuardConfig::default();
        config.guard.cache_size = 8;
        config.save(&path).unwrap();

        let nested = dir.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();
        let found = GuardConfig::discover_from(&nested).unwrap();
        assert_eq!(found.guard.cache_size, 8);
    }
}
