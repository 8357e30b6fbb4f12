use super::*;
use serial_test::serial;
use std::env;

fn cleanup_test_env() {
    env::remove_var("API_KEY");
    env::remove_var("API_HOST");
    env::remove_var("API_PORT");
    env::remove_var("ALLOWED_ORIGINS");
    env::remove_var("MAX_TOTAL_COST_PER_HOUR");
    env::remove_var("EMERGENCY_SHUTDOWN_THRESHOLD");
    env::remove_var("MAX_TASKS_PER_USER_PER_HOUR");
    env::remove_var("KV_URL");
    env::remove_var("TOOL_SERVERS");
}

#[test]
#[serial]
fn blank_api_key_is_rejected() {
    cleanup_test_env();
    env::set_var("API_KEY", "");
    let result = Config::load();
    assert!(result.is_err());
    cleanup_test_env();
}

#[test]
#[serial]
fn short_api_key_is_rejected() {
    cleanup_test_env();
    env::set_var("API_KEY", "too-short");
    let result = Config::load();
    assert!(result.is_err());
    cleanup_test_env();
}

#[test]
#[serial]
fn missing_api_key_disables_auth_but_does_not_fail() {
    cleanup_test_env();
    let config = Config::load().expect("config loads without API_KEY");
    assert!(!config.api.enable_auth);
    assert_eq!(config.api.api_key, None);
    cleanup_test_env();
}

#[test]
#[serial]
fn secure_api_key_enables_auth() {
    cleanup_test_env();
    env::set_var(
        "API_KEY",
        "secure-api-key-1234567890123456789012345678901234567890",
    );
    let config = Config::load().expect("config loads with a valid key");
    assert!(config.api.enable_auth);
    cleanup_test_env();
}

#[test]
#[serial]
fn defaults_match_constants() {
    cleanup_test_env();
    let config = Config::load().unwrap();
    assert_eq!(
        config.mesh.max_total_cost_per_hour,
        DEFAULT_MAX_TOTAL_COST_PER_HOUR
    );
    assert_eq!(
        config.mesh.max_tasks_per_user_per_hour,
        DEFAULT_MAX_TASKS_PER_USER_PER_HOUR
    );
    assert_eq!(config.mesh.kv_url, None);
    assert!(config.mesh.tool_servers.is_empty());
    assert_eq!(config.api.host, "127.0.0.1");
    assert_eq!(config.api.port, 3000);
    cleanup_test_env();
}

#[test]
#[serial]
fn allowed_origins_parses_comma_list() {
    cleanup_test_env();
    env::set_var(
        "ALLOWED_ORIGINS",
        "https://example.com,https://app.example.com",
    );
    let config = Config::load().unwrap();
    assert_eq!(config.api.allowed_origins.len(), 2);
    cleanup_test_env();
}

#[test]
#[serial]
fn budget_overrides_are_honored() {
    cleanup_test_env();
    env::set_var("MAX_TOTAL_COST_PER_HOUR", "200.5");
    env::set_var("EMERGENCY_SHUTDOWN_THRESHOLD", "500");
    let config = Config::load().unwrap();
    assert_eq!(config.mesh.max_total_cost_per_hour, 200.5);
    assert_eq!(config.mesh.emergency_shutdown_threshold, 500.0);
    cleanup_test_env();
}

#[test]
#[serial]
fn tool_servers_parses_name_url_pairs() {
    cleanup_test_env();
    env::set_var(
        "TOOL_SERVERS",
        "jorge_crm=http://localhost:8100,mcp_search=http://localhost:8200",
    );
    let config = Config::load().unwrap();
    assert_eq!(
        config.mesh.tool_servers.get("jorge_crm").map(String::as_str),
        Some("http://localhost:8100")
    );
    assert_eq!(
        config.mesh.tool_servers.get("mcp_search").map(String::as_str),
        Some("http://localhost:8200")
    );
    cleanup_test_env();
}

#[test]
#[serial]
fn malformed_tool_servers_entry_is_skipped() {
    cleanup_test_env();
    env::set_var("TOOL_SERVERS", "jorge_crm=http://localhost:8100,garbage-no-equals");
    let config = Config::load().unwrap();
    assert_eq!(config.mesh.tool_servers.len(), 1);
    assert!(config.mesh.tool_servers.contains_key("jorge_crm"));
    cleanup_test_env();
}
