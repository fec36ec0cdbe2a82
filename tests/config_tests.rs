use approval_chain::config::ApprovalChainConfig;
use approval_chain::domain::{Money, RoleId, RoleRef};
use std::fs;
use tempfile::TempDir;

#[test]
fn partial_file_is_layered_over_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("approval-chain.toml");
    fs::write(
        &path,
        "[workflow]\nhigh_authority_threshold = 2500\nhigh_authority_role = 4\n",
    )
    .unwrap();

    let config = ApprovalChainConfig::load_from(&path).unwrap();

    assert_eq!(config.workflow.high_authority_threshold, Money(2500));
    assert_eq!(config.workflow.high_authority_role, RoleRef::Id(RoleId(4)));
    assert!(config.observability.json);
    assert!(config.database.is_none());
}

#[test]
fn saved_configuration_loads_back_unchanged() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("saved.toml");

    let mut config = ApprovalChainConfig::default();
    config.workflow.high_authority_threshold = Money(75_000);
    config.workflow.high_authority_role = RoleRef::Name("Treasurer".to_string());
    config.save_to_file(&path).unwrap();

    let loaded = ApprovalChainConfig::load_from(&path).unwrap();
    assert_eq!(loaded.workflow, config.workflow);
    assert_eq!(loaded.database, None);
}

#[test]
fn database_section_is_optional_but_complete_when_present() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("db.toml");
    fs::write(
        &path,
        "[database]\nurl = \"sqlite:approvals.db\"\nmax_connections = 4\nauto_migrate = true\n",
    )
    .unwrap();

    let config = ApprovalChainConfig::load_from(&path).unwrap();
    let database = config.database.expect("database section loaded");
    assert_eq!(database.url, "sqlite:approvals.db");
    assert_eq!(database.max_connections, 4);
    assert!(database.auto_migrate);
}

#[test]
fn missing_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let err = ApprovalChainConfig::load_from(dir.path().join("absent.toml")).unwrap_err();
    assert!(err.to_string().contains("does not exist"));
}

#[test]
fn environment_overrides_the_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("env.toml");
    fs::write(&path, "[observability]\nlog_level = \"warn\"\n").unwrap();

    std::env::set_var("APPROVAL_CHAIN__OBSERVABILITY__LOG_LEVEL", "debug");
    let config = ApprovalChainConfig::load_from(&path);
    std::env::remove_var("APPROVAL_CHAIN__OBSERVABILITY__LOG_LEVEL");

    assert_eq!(config.unwrap().observability.log_level, "debug");
}
