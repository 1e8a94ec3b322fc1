use std::sync::Mutex;

use tether::config::Config;
use tether::http::parser::ParserLimits;

// Tests in this file touch process-wide environment variables.
static ENV_LOCK: Mutex<()> = Mutex::new(());

#[test]
fn test_config_default_address() {
    let _guard = ENV_LOCK.lock().unwrap();
    unsafe {
        std::env::remove_var("LISTEN");
        std::env::remove_var("TETHER_CONFIG");
    }
    let cfg = Config::load();
    assert_eq!(cfg.listen_addr, "127.0.0.1:8080");
    assert_eq!(cfg.read_buffer_size, 8192);
    assert_eq!(cfg.parser_limits(), ParserLimits::default());
}

#[test]
fn test_config_custom_address_from_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    unsafe {
        std::env::remove_var("TETHER_CONFIG");
        std::env::set_var("LISTEN", "0.0.0.0:3000");
    }
    let cfg = Config::load();
    assert_eq!(cfg.listen_addr, "0.0.0.0:3000");
    unsafe {
        std::env::remove_var("LISTEN");
    }
}

#[test]
fn test_config_file_then_env_override() {
    let _guard = ENV_LOCK.lock().unwrap();
    let path = std::env::temp_dir().join(format!("tether-config-{}.yaml", std::process::id()));
    std::fs::write(&path, "listen_addr: \"10.1.1.1:9000\"\nmax_headers: 12\n").unwrap();

    unsafe {
        std::env::set_var("TETHER_CONFIG", &path);
        std::env::remove_var("LISTEN");
    }
    let cfg = Config::load();
    assert_eq!(cfg.listen_addr, "10.1.1.1:9000");
    assert_eq!(cfg.max_headers, 12);

    unsafe {
        std::env::set_var("LISTEN", "127.0.0.1:8000");
    }
    let cfg = Config::load();
    assert_eq!(cfg.listen_addr, "127.0.0.1:8000");
    assert_eq!(cfg.max_headers, 12);

    unsafe {
        std::env::remove_var("LISTEN");
        std::env::remove_var("TETHER_CONFIG");
    }
    let _ = std::fs::remove_file(&path);
}

#[test]
fn test_config_missing_file_falls_back() {
    let _guard = ENV_LOCK.lock().unwrap();
    unsafe {
        std::env::remove_var("LISTEN");
        std::env::set_var("TETHER_CONFIG", "/nonexistent/tether.yaml");
    }
    let cfg = Config::load();
    assert_eq!(cfg.listen_addr, "127.0.0.1:8080");
    unsafe {
        std::env::remove_var("TETHER_CONFIG");
    }
}

#[test]
fn test_config_from_yaml_partial() {
    let cfg = Config::from_yaml("max_head_size: 1024\nread_buffer_size: 512\n").unwrap();

    assert_eq!(cfg.listen_addr, "127.0.0.1:8080");
    assert_eq!(cfg.read_buffer_size, 512);
    assert_eq!(
        cfg.parser_limits(),
        ParserLimits {
            max_head_size: 1024,
            max_headers: 64,
        }
    );
}

#[test]
fn test_config_from_yaml_rejects_bad_types() {
    assert!(Config::from_yaml("max_headers: lots\n").is_err());
}

#[test]
fn test_config_clone() {
    let cfg1 = Config::default();
    let cfg2 = cfg1.clone();
    assert_eq!(cfg1.listen_addr, cfg2.listen_addr);
}
