#![allow(dead_code)]
//! # 测试公共工具

use etl::ETLConfig;
use std::sync::Once;
use wiremock::MockServer;

static INIT: Once = Once::new();

/// 每个测试二进制只初始化一次日志
pub fn setup_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// 指向 mock 服务器的配置，关闭限速
pub fn config_for(server: &MockServer) -> ETLConfig {
    ETLConfig {
        api_key: Some("test-key".to_string()),
        base_url: server.uri(),
        throttle_ms: 0,
        ..ETLConfig::default()
    }
}
