use super::*;

fn raw() -> RawSettings {
    RawSettings::default()
}

#[test]
fn defaults_resolve() {
    let settings = Settings::from_raw(raw()).expect("defaults should validate");
    assert_eq!(settings.server.addr.port(), DEFAULT_PORT);
    assert_eq!(settings.database.max_connections.get(), 8);
    assert!(settings.database.url.is_none());
    assert!(settings.redis.url.is_none());
    assert!(settings.mail.endpoint.is_none());
    assert_eq!(settings.mail.from, DEFAULT_MAIL_FROM);
    assert!(matches!(settings.logging.format, LogFormat::Compact));
}

#[test]
fn zero_port_is_rejected() {
    let mut raw = raw();
    raw.server.port = Some(0);
    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid { key: "server.port", .. })
    ));
}

#[test]
fn zero_pool_size_is_rejected() {
    let mut raw = raw();
    raw.database.max_connections = Some(0);
    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn blank_urls_are_treated_as_unset() {
    let mut raw = raw();
    raw.database.url = Some("   ".to_string());
    raw.redis.url = Some("".to_string());
    let settings = Settings::from_raw(raw).unwrap();
    assert!(settings.database.url.is_none());
    assert!(settings.redis.url.is_none());
}

#[test]
fn invalid_log_level_is_rejected() {
    let mut raw = raw();
    raw.logging.level = Some("chatty".to_string());
    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn invalid_mail_endpoint_is_rejected() {
    let mut raw = raw();
    raw.mail.endpoint = Some("not a url".to_string());
    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid { key: "mail.endpoint", .. })
    ));
}

#[test]
fn serve_overrides_take_precedence() {
    let mut raw = raw();
    raw.server.port = Some(8000);
    raw.redis.url = Some("redis://file-config:6379".to_string());

    let overrides = ServeOverrides {
        server_port: Some(9000),
        redis_url: Some("redis://cli:6379".to_string()),
        log_json: Some(true),
        ..Default::default()
    };
    raw.apply_serve_overrides(&overrides);

    let settings = Settings::from_raw(raw).unwrap();
    assert_eq!(settings.server.addr.port(), 9000);
    assert_eq!(settings.redis.url.as_deref(), Some("redis://cli:6379"));
    assert!(matches!(settings.logging.format, LogFormat::Json));
}
