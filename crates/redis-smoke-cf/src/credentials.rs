//! Service binding and service key decoding

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use redis_smoke_core::config::SecurityGroupRule;

use crate::fail_reason;

/// Redis connection details from a service key
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub host: String,

    #[serde(default, deserialize_with = "port_from_number_or_string")]
    pub port: u16,

    #[serde(default)]
    pub password: String,

    #[serde(default, deserialize_with = "optional_port_from_number_or_string")]
    pub tls_port: Option<u16>,
}

impl Credentials {
    /// Host and plain-text port
    pub fn endpoint(&self) -> BindingEndpoint {
        BindingEndpoint {
            host: self.host.clone(),
            port: self.port,
        }
    }

    /// Security group rule opening every advertised port on the host
    pub fn security_group_rule(&self) -> SecurityGroupRule {
        let mut rule = SecurityGroupRule::tcp(&self.host, self.port);
        if let Some(tls_port) = self.tls_port.filter(|p| *p != self.port) {
            rule.ports = Some(format!("{},{}", self.port, tls_port));
        }
        rule
    }
}

/// Host and port of a bound Redis instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingEndpoint {
    pub host: String,
    pub port: u16,
}

impl BindingEndpoint {
    pub fn security_group_rule(&self) -> SecurityGroupRule {
        SecurityGroupRule::tcp(&self.host, self.port)
    }
}

fn port_from_number_or_string<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(optional_port_from_number_or_string(deserializer)?.unwrap_or(0))
}

fn optional_port_from_number_or_string<'de, D>(deserializer: D) -> Result<Option<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_u64()
            .and_then(|n| u16::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("invalid port {}", n))),
        Value::String(s) if s.is_empty() => Ok(None),
        Value::String(s) => s
            .parse()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("invalid port '{}'", s))),
        other => Err(D::Error::custom(format!("invalid port {}", other))),
    }
}

/// Decode `cf service-key` output
///
/// The CLI prints a banner before the JSON document; newer versions nest
/// the fields under `credentials`.
pub fn parse_service_key(output: &str) -> Result<Credentials> {
    let start = output
        .find('{')
        .ok_or_else(|| anyhow!(fail_reason("Service key output contained no JSON")))?;

    let document: Value = serde_json::from_str(&output[start..])
        .with_context(|| fail_reason("Failed to decode service key"))?;
    let fields = match document.get("credentials") {
        Some(nested @ Value::Object(_)) => nested.clone(),
        _ => document,
    };

    let credentials: Credentials = serde_json::from_value(fields)
        .with_context(|| fail_reason("Failed to decode service key"))?;
    if credentials.host.is_empty() {
        return Err(anyhow!(fail_reason("Invalid service key, missing host")));
    }
    Ok(credentials)
}

#[derive(Debug, Deserialize)]
struct BindingsResponse {
    #[serde(default)]
    resources: Vec<BindingResource>,
}

#[derive(Debug, Deserialize)]
struct BindingResource {
    entity: BindingEntity,
}

#[derive(Debug, Deserialize)]
struct BindingEntity {
    #[serde(default)]
    credentials: Credentials,
}

/// Decode `cf curl /v2/apps/<guid>/service_bindings` output
///
/// Exactly one binding with a host and a non-zero port is expected.
pub fn parse_binding_credentials(body: &str) -> Result<BindingEndpoint> {
    let response: BindingsResponse = serde_json::from_str(body)
        .with_context(|| fail_reason("Failed to decode service binding response"))?;

    let [binding] = response.resources.as_slice() else {
        return Err(anyhow!(fail_reason(
            "Invalid binding response, expected exactly one binding"
        )));
    };

    let credentials = &binding.entity.credentials;
    if credentials.host.is_empty() {
        return Err(anyhow!(fail_reason("Invalid binding, missing host")));
    }
    if credentials.port == 0 {
        return Err(anyhow!(fail_reason("Invalid binding, missing port")));
    }

    Ok(credentials.endpoint())
}
