use std::fs;
use tempfile::TempDir;
use typthon_guard::frontend::config::CONFIG_FILE;
use typthon_guard::{ExceptionKind, GuardConfig, Severity, SeverityOption};

#[test]
fn test_discover_searches_parent_directories() {
    let root = TempDir::new().unwrap();
    fs::write(
        root.path().join(CONFIG_FILE),
        "[guard]\nseverity = \"warning\"\ncache_size = 4\nallow_duck_typing = true\n",
    )
    .unwrap();
    let nested = root.path().join("pkg").join("module");
    fs::create_dir_all(&nested).unwrap();

    let config = GuardConfig::discover_from(&nested).unwrap();
    let options = config.to_options().unwrap();
    assert_eq!(options.severity_option(), SeverityOption::Level(Severity::Warning));
    assert_eq!(options.cache_budget(), 4);
    assert!(options.allows_duck_typing());
    assert_eq!(options.exception_kind(), Some(&ExceptionKind::TypeMismatch));
}

#[test]
fn test_discover_without_file() {
    let root = TempDir::new().unwrap();
    assert!(GuardConfig::discover_from(root.path()).is_none());
}

#[test]
fn test_exception_none_and_custom_names() {
    let config = GuardConfig::parse("[guard]\nexception = \"none\"\n").unwrap();
    let options = config.to_options().unwrap();
    assert_eq!(options.exception_kind(), None);
    assert_eq!(options.severity_option(), SeverityOption::Env);

    let config = GuardConfig::parse("[guard]\nexception = \"InvalidOrder\"\n").unwrap();
    assert_eq!(
        config.to_options().unwrap().exception_kind(),
        Some(&ExceptionKind::Custom("InvalidOrder".to_string()))
    );
}

#[test]
fn test_log_directory_from_config() {
    let root = TempDir::new().unwrap();
    let text = format!(
        "[logging]\nlevel = \"debug\"\nformat = \"json\"\ndirectory = {:?}\n",
        root.path().display().to_string()
    );
    let config = GuardConfig::parse(&text).unwrap();
    assert!(config.log_config().is_ok());
    assert!(GuardConfig::parse("[logging]\nlevel = \"chatty\"\n").unwrap().log_config().is_err());
}
