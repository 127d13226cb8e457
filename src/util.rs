use std::env::VarError;

const MQTT_USERNAME: &str = "MQTT_USERNAME";

pub fn get_username() -> Option<String> {
    non_empty(std::env::var(MQTT_USERNAME))
}

const MQTT_PASSWORD: &str = "MQTT_PASSWORD";

pub fn get_password() -> Option<String> {
    non_empty(std::env::var(MQTT_PASSWORD))
}

/// An unset or empty variable leaves the configured value alone
fn non_empty(value_from_env: Result<String, VarError>) -> Option<String> {
    value_from_env.ok().filter(|value| !value.is_empty())
}
