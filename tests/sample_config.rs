//! The shipped sample configuration must load and validate.

use std::path::Path;

use solakon_modbus::{HubConfig, BUILTIN_REGISTERS};

#[test]
fn test_sample_config_builds_schema() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/solakon.yaml");
    let config = HubConfig::load(Some(&path)).unwrap();

    assert_eq!(config.timeout_ms, Some(3000));
    let schema = config.schema().unwrap();
    assert_eq!(schema.registers().len(), BUILTIN_REGISTERS.len() + 3);
    assert_eq!(schema.numbers().len(), 2);
    assert_eq!(schema.switch("remote_enable").map(|s| s.bit), Some(0));

    let power = schema.number("remote_active_power").unwrap();
    assert_eq!((power.min, power.max, power.count), (Some(-2400.0), Some(2400.0), 2));
}
