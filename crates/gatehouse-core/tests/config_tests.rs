use gatehouse_core::TestApp;

#[test]
fn test_environment_helpers() {
    let mut config = TestApp::test_config();

    config.environment = "development".to_string();
    assert!(config.is_dev());
    assert!(!config.is_production());

    config.environment = "production".to_string();
    assert!(!config.is_dev());
    assert!(config.is_production());

    config.environment = "test".to_string();
    assert!(!config.is_dev());
    assert!(!config.is_production());
}

#[test]
fn test_server_addr() {
    let mut config = TestApp::test_config();
    config.server_host = "0.0.0.0".to_string();
    config.server_port = 8080;
    assert_eq!(config.server_addr(), "0.0.0.0:8080");
}
